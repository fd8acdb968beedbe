//! JSON ⇄ Avro value conversion
//!
//! A single conversion dispatches on the target schema over a closed set of
//! input shapes: null, boolean, number, string, sequence and mapping. Temporal
//! logical types accept ISO-8601 text (`2024-01-31`, RFC 3339 timestamps) as
//! well as their raw numeric form. Unions accept either the bare value or the
//! `{"<branch>": value}` wrapped form.

use crate::avro::AvroSchema;
use crate::error::{Error, Result};
use apache_avro::types::Value as AvroValue;
use apache_avro::Schema as AvroSchemaInner;
use base64::Engine;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Days from 0001-01-01 to 1970-01-01 in the proleptic Gregorian calendar
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Convert a JSON value into an Avro value shaped by `schema`
pub fn json_to_avro(json: &JsonValue, schema: &AvroSchema) -> Result<AvroValue> {
    let names = schema.named_types();
    Converter { names: &names }.convert(json, schema.inner())
}

struct Converter<'a, 's> {
    names: &'a HashMap<String, &'s AvroSchemaInner>,
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::Codec(msg.into())
}

impl Converter<'_, '_> {
    fn resolve<'x>(&'x self, schema: &'x AvroSchemaInner) -> Result<&'x AvroSchemaInner> {
        match schema {
            AvroSchemaInner::Ref { name } => {
                let fullname = name.fullname(None);
                self.names
                    .get(&fullname)
                    .copied()
                    .ok_or_else(|| invalid(format!("unknown named type: {fullname}")))
            }
            other => Ok(other),
        }
    }

    fn convert(&self, json: &JsonValue, schema: &AvroSchemaInner) -> Result<AvroValue> {
        let schema = self.resolve(schema)?;
        match (schema, json) {
            (AvroSchemaInner::Null, JsonValue::Null) => Ok(AvroValue::Null),

            (AvroSchemaInner::Boolean, JsonValue::Bool(b)) => Ok(AvroValue::Boolean(*b)),

            (AvroSchemaInner::Int, JsonValue::Number(n)) => Ok(AvroValue::Int(as_i32(n)?)),

            (AvroSchemaInner::Long, JsonValue::Number(n)) => Ok(AvroValue::Long(as_i64(n)?)),

            (AvroSchemaInner::Float, JsonValue::Number(n)) => Ok(AvroValue::Float(as_f64(n)? as f32)),

            (AvroSchemaInner::Double, JsonValue::Number(n)) => Ok(AvroValue::Double(as_f64(n)?)),

            (AvroSchemaInner::String, JsonValue::String(s)) => Ok(AvroValue::String(s.clone())),

            (AvroSchemaInner::Bytes, JsonValue::String(s)) => Ok(AvroValue::Bytes(decode_base64(s)?)),

            (AvroSchemaInner::Date, JsonValue::String(s)) => Ok(AvroValue::Date(parse_date(s)?)),
            (AvroSchemaInner::Date, JsonValue::Number(n)) => Ok(AvroValue::Date(as_i32(n)?)),

            (AvroSchemaInner::TimeMillis, JsonValue::Number(n)) => Ok(AvroValue::TimeMillis(as_i32(n)?)),
            (AvroSchemaInner::TimeMicros, JsonValue::Number(n)) => Ok(AvroValue::TimeMicros(as_i64(n)?)),

            (AvroSchemaInner::TimestampMillis, JsonValue::String(s)) => {
                Ok(AvroValue::TimestampMillis(parse_timestamp(s)?.timestamp_millis()))
            }
            (AvroSchemaInner::TimestampMillis, JsonValue::Number(n)) => {
                Ok(AvroValue::TimestampMillis(as_i64(n)?))
            }

            (AvroSchemaInner::TimestampMicros, JsonValue::String(s)) => {
                Ok(AvroValue::TimestampMicros(parse_timestamp(s)?.timestamp_micros()))
            }
            (AvroSchemaInner::TimestampMicros, JsonValue::Number(n)) => {
                Ok(AvroValue::TimestampMicros(as_i64(n)?))
            }

            (AvroSchemaInner::Uuid, JsonValue::String(s)) => uuid::Uuid::parse_str(s)
                .map(AvroValue::Uuid)
                .map_err(|e| invalid(format!("invalid uuid `{s}`: {e}"))),

            (AvroSchemaInner::Array(array), JsonValue::Array(items)) => Ok(AvroValue::Array(
                items
                    .iter()
                    .map(|item| self.convert(item, &array.items))
                    .collect::<Result<_>>()?,
            )),

            (AvroSchemaInner::Map(map), JsonValue::Object(obj)) => {
                let mut out = HashMap::with_capacity(obj.len());
                for (k, v) in obj {
                    out.insert(k.clone(), self.convert(v, &map.types)?);
                }
                Ok(AvroValue::Map(out))
            }

            (AvroSchemaInner::Union(union), json) => {
                let variants = union.variants();

                if let JsonValue::Object(obj) = json {
                    if obj.len() == 1 {
                        if let Some((key, inner)) = obj.iter().next() {
                            for (idx, variant) in variants.iter().enumerate() {
                                if self.branch_matches(variant, key) {
                                    if let Ok(v) = self.convert(inner, variant) {
                                        return Ok(AvroValue::Union(idx as u32, Box::new(v)));
                                    }
                                }
                            }
                        }
                    }
                }

                for (idx, variant) in variants.iter().enumerate() {
                    if let Ok(v) = self.convert(json, variant) {
                        return Ok(AvroValue::Union(idx as u32, Box::new(v)));
                    }
                }
                Err(invalid(format!("no matching union branch for {json}")))
            }

            (AvroSchemaInner::Record(record), JsonValue::Object(obj)) => {
                let mut fields = Vec::with_capacity(record.fields.len());
                for field in &record.fields {
                    let value = if let Some(v) = obj.get(&field.name) {
                        self.convert(v, &field.schema)?
                    } else if let Some(default) = &field.default {
                        self.convert(default, &field.schema)?
                    } else {
                        // An absent field is written as null when its type allows it.
                        self.convert(&JsonValue::Null, &field.schema)
                            .map_err(|_| invalid(format!("missing required field: {}", field.name)))?
                    };
                    fields.push((field.name.clone(), value));
                }
                Ok(AvroValue::Record(fields))
            }

            (AvroSchemaInner::Enum(enum_schema), JsonValue::String(s)) => enum_schema
                .symbols
                .iter()
                .position(|sym| sym == s)
                .map(|pos| AvroValue::Enum(pos as u32, s.clone()))
                .ok_or_else(|| invalid(format!("invalid enum symbol: {s}"))),

            (AvroSchemaInner::Fixed(fixed), JsonValue::String(s)) => {
                let bytes = decode_base64(s)?;
                if bytes.len() != fixed.size {
                    return Err(invalid(format!(
                        "fixed size mismatch: expected {}, got {}",
                        fixed.size,
                        bytes.len()
                    )));
                }
                Ok(AvroValue::Fixed(fixed.size, bytes))
            }

            (schema, json) => Err(invalid(format!(
                "cannot convert {json} to {}",
                type_name(schema)
            ))),
        }
    }

    fn branch_matches(&self, variant: &AvroSchemaInner, key: &str) -> bool {
        let named = match variant {
            AvroSchemaInner::Ref { name } => Some(name),
            AvroSchemaInner::Record(r) => Some(&r.name),
            AvroSchemaInner::Enum(e) => Some(&e.name),
            AvroSchemaInner::Fixed(f) => Some(&f.name),
            _ => None,
        };
        match named {
            Some(name) => key == name.name || key == name.fullname(None),
            None => key == type_name(variant),
        }
    }
}

/// Avro type name used for union branch keys and error messages
pub(crate) fn type_name(schema: &AvroSchemaInner) -> String {
    match schema {
        AvroSchemaInner::Null => "null".into(),
        AvroSchemaInner::Boolean => "boolean".into(),
        AvroSchemaInner::Int | AvroSchemaInner::Date | AvroSchemaInner::TimeMillis => "int".into(),
        AvroSchemaInner::Long
        | AvroSchemaInner::TimeMicros
        | AvroSchemaInner::TimestampMillis
        | AvroSchemaInner::TimestampMicros => "long".into(),
        AvroSchemaInner::Float => "float".into(),
        AvroSchemaInner::Double => "double".into(),
        AvroSchemaInner::Bytes => "bytes".into(),
        AvroSchemaInner::String | AvroSchemaInner::Uuid => "string".into(),
        AvroSchemaInner::Array(_) => "array".into(),
        AvroSchemaInner::Map(_) => "map".into(),
        AvroSchemaInner::Union(_) => "union".into(),
        AvroSchemaInner::Record(r) => r.name.fullname(None),
        AvroSchemaInner::Enum(e) => e.name.fullname(None),
        AvroSchemaInner::Fixed(f) => f.name.fullname(None),
        AvroSchemaInner::Ref { name } => name.fullname(None),
        other => format!("{other:?}"),
    }
}

fn as_i64(n: &serde_json::Number) -> Result<i64> {
    n.as_i64()
        .ok_or_else(|| invalid(format!("expected an integer, got {n}")))
}

fn as_i32(n: &serde_json::Number) -> Result<i32> {
    let i = as_i64(n)?;
    i32::try_from(i).map_err(|_| invalid(format!("value {i} out of int range")))
}

fn as_f64(n: &serde_json::Number) -> Result<f64> {
    n.as_f64()
        .ok_or_else(|| invalid(format!("expected a number, got {n}")))
}

pub(crate) fn decode_base64(s: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::STANDARD
        .decode(s)
        .map_err(|e| invalid(format!("invalid base64: {e}")))
}

fn parse_date(s: &str) -> Result<i32> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| invalid(format!("invalid date `{s}`: {e}")))?;
    Ok(date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE)
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| invalid(format!("invalid timestamp `{s}`: {e}")))
}

fn format_date(days: i32) -> Result<JsonValue> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
        .map(|d| JsonValue::String(d.format("%Y-%m-%d").to_string()))
        .ok_or_else(|| invalid(format!("date out of range: {days}")))
}

fn format_timestamp(ts: Option<DateTime<Utc>>, raw: i64, precision: SecondsFormat) -> Result<JsonValue> {
    ts.map(|t| JsonValue::String(t.to_rfc3339_opts(precision, true)))
        .ok_or_else(|| invalid(format!("timestamp out of range: {raw}")))
}

/// Convert an Avro value back into JSON
///
/// Temporal values come back as ISO-8601 text, bytes and fixed as base64,
/// and union values unwrapped.
pub fn avro_to_json(avro: &AvroValue) -> Result<JsonValue> {
    match avro {
        AvroValue::Null => Ok(JsonValue::Null),
        AvroValue::Boolean(b) => Ok(JsonValue::Bool(*b)),
        AvroValue::Int(i) => Ok(JsonValue::Number((*i).into())),
        AvroValue::Long(l) => Ok(JsonValue::Number((*l).into())),
        AvroValue::Float(f) => Ok(serde_json::json!(*f)),
        AvroValue::Double(d) => Ok(serde_json::json!(*d)),
        AvroValue::String(s) => Ok(JsonValue::String(s.clone())),
        AvroValue::Bytes(b) | AvroValue::Fixed(_, b) => Ok(JsonValue::String(
            base64::engine::general_purpose::STANDARD.encode(b),
        )),
        AvroValue::Date(days) => format_date(*days),
        AvroValue::TimeMillis(ms) => Ok(JsonValue::Number((*ms).into())),
        AvroValue::TimeMicros(us) => Ok(JsonValue::Number((*us).into())),
        AvroValue::TimestampMillis(ms) => {
            format_timestamp(DateTime::from_timestamp_millis(*ms), *ms, SecondsFormat::Millis)
        }
        AvroValue::TimestampMicros(us) => {
            format_timestamp(DateTime::from_timestamp_micros(*us), *us, SecondsFormat::Micros)
        }
        AvroValue::Uuid(u) => Ok(JsonValue::String(u.to_string())),
        AvroValue::Array(items) => Ok(JsonValue::Array(
            items.iter().map(avro_to_json).collect::<Result<_>>()?,
        )),
        AvroValue::Map(map) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in map {
                obj.insert(k.clone(), avro_to_json(v)?);
            }
            Ok(JsonValue::Object(obj))
        }
        AvroValue::Union(_, inner) => avro_to_json(inner),
        AvroValue::Record(fields) => {
            let mut obj = serde_json::Map::new();
            for (name, value) in fields {
                obj.insert(name.clone(), avro_to_json(value)?);
            }
            Ok(JsonValue::Object(obj))
        }
        AvroValue::Enum(_, symbol) => Ok(JsonValue::String(symbol.clone())),
        other => Err(invalid(format!("unsupported Avro value: {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(text: &str) -> AvroSchema {
        AvroSchema::parse(text).unwrap()
    }

    #[test]
    fn test_record_with_defaults() {
        let s = schema(
            r#"{"type":"record","name":"person","fields":[
                {"name":"full_name","type":"string"},
                {"name":"age","type":"int","default":42}
            ]}"#,
        );
        let value = json_to_avro(&json!({"full_name": "Jane"}), &s).unwrap();
        assert_eq!(
            value,
            AvroValue::Record(vec![
                ("full_name".into(), AvroValue::String("Jane".into())),
                ("age".into(), AvroValue::Int(42)),
            ])
        );
    }

    #[test]
    fn test_missing_field_without_default() {
        let s = schema(r#"{"type":"record","name":"p","fields":[{"name":"a","type":"long"}]}"#);
        let err = json_to_avro(&json!({}), &s).unwrap_err();
        assert!(err.to_string().contains("missing required field: a"));
    }

    #[test]
    fn test_absent_nullable_field_is_null() {
        let s = schema(
            r#"{"type":"record","name":"p","fields":[
                {"name":"a","type":"long"},
                {"name":"nick","type":["null","string"]}
            ]}"#,
        );
        let value = json_to_avro(&json!({"a": 1}), &s).unwrap();
        assert_eq!(
            value,
            AvroValue::Record(vec![
                ("a".into(), AvroValue::Long(1)),
                ("nick".into(), AvroValue::Union(0, Box::new(AvroValue::Null))),
            ])
        );
    }

    #[test]
    fn test_union_bare_and_wrapped() {
        let s = schema(r#"["null","string"]"#);
        assert_eq!(json_to_avro(&json!(null), &s).unwrap(), AvroValue::Union(0, Box::new(AvroValue::Null)));
        assert_eq!(
            json_to_avro(&json!("x"), &s).unwrap(),
            AvroValue::Union(1, Box::new(AvroValue::String("x".into())))
        );
        assert_eq!(
            json_to_avro(&json!({"string": "y"}), &s).unwrap(),
            AvroValue::Union(1, Box::new(AvroValue::String("y".into())))
        );
    }

    #[test]
    fn test_int_out_of_range() {
        let s = schema(r#""int""#);
        assert!(json_to_avro(&json!(1_i64 << 40), &s).is_err());
        assert_eq!(json_to_avro(&json!(7), &s).unwrap(), AvroValue::Int(7));
    }

    #[test]
    fn test_temporal_values() {
        let date = schema(r#"{"type":"int","logicalType":"date"}"#);
        assert_eq!(json_to_avro(&json!("1970-01-02"), &date).unwrap(), AvroValue::Date(1));
        assert_eq!(avro_to_json(&AvroValue::Date(1)).unwrap(), json!("1970-01-02"));

        let ts = schema(r#"{"type":"long","logicalType":"timestamp-millis"}"#);
        assert_eq!(
            json_to_avro(&json!("1970-01-01T00:00:01Z"), &ts).unwrap(),
            AvroValue::TimestampMillis(1000)
        );
        assert_eq!(
            avro_to_json(&AvroValue::TimestampMillis(1500)).unwrap(),
            json!("1970-01-01T00:00:01.500Z")
        );
    }

    #[test]
    fn test_recursive_record_through_reference() {
        let s = schema(
            r#"{"type":"record","name":"node","fields":[
                {"name":"value","type":"long"},
                {"name":"next","type":["null","node"],"default":null}
            ]}"#,
        );
        let value = json_to_avro(&json!({"value": 1, "next": {"value": 2}}), &s).unwrap();
        let AvroValue::Record(fields) = value else {
            panic!("expected record");
        };
        assert!(matches!(fields[1].1, AvroValue::Union(1, _)));
    }

    #[test]
    fn test_bytes_and_enum() {
        let bytes = schema(r#""bytes""#);
        assert_eq!(json_to_avro(&json!("AQI="), &bytes).unwrap(), AvroValue::Bytes(vec![1, 2]));
        assert_eq!(avro_to_json(&AvroValue::Bytes(vec![1, 2])).unwrap(), json!("AQI="));

        let color = schema(r#"{"type":"enum","name":"color","symbols":["RED","GREEN"]}"#);
        assert_eq!(json_to_avro(&json!("GREEN"), &color).unwrap(), AvroValue::Enum(1, "GREEN".into()));
        assert!(json_to_avro(&json!("BLUE"), &color).is_err());
    }
}
