//! Message validation against a schema
//!
//! Collects every offending location instead of stopping at the first one, so
//! a caller sees all problems at once. Paths are rooted at `.`, record fields
//! append `.name`, array items `[i]` and map values `[key]`.

use crate::avro::AvroSchema;
use crate::error::{Error, Result};
use crate::value::{decode_base64, parse_timestamp, type_name};
use apache_avro::Schema as AvroSchemaInner;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Validation switches
#[derive(Debug, Clone, Copy)]
pub struct ValidationOptions {
    /// Reject record fields the schema does not declare
    pub fail_on_extra_fields: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self {
            fail_on_extra_fields: true,
        }
    }
}

/// Validate `message` against `schema`, returning [`Error::Validation`] on mismatch
pub fn validate(schema: &AvroSchema, message: &JsonValue, options: ValidationOptions) -> Result<()> {
    let errors = collect_errors(schema, message, options);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(Error::Validation { errors })
    }
}

/// Every validation failure for `message`, empty when it conforms
pub fn collect_errors(schema: &AvroSchema, message: &JsonValue, options: ValidationOptions) -> Vec<String> {
    let names = schema.named_types();
    let validator = Validator {
        names: &names,
        options,
    };
    let mut errors = Vec::new();
    validator.check(schema.inner(), message, ".", &mut errors);
    errors
}

struct Validator<'a, 's> {
    names: &'a HashMap<String, &'s AvroSchemaInner>,
    options: ValidationOptions,
}

fn describe(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "null".to_string(),
        JsonValue::Bool(b) => format!("boolean with value {b}"),
        JsonValue::Number(n) => {
            let kind = match n.as_i64() {
                Some(i) if i32::try_from(i).is_ok() => "int",
                Some(_) => "long",
                None => "double",
            };
            format!("{kind} with value {n}")
        }
        JsonValue::String(s) => format!("string with value {s:?}"),
        JsonValue::Array(_) => format!("array with value {value}"),
        JsonValue::Object(_) => format!("map with value {value}"),
    }
}

fn child_path(path: &str, field: &str) -> String {
    if path == "." {
        format!(".{field}")
    } else {
        format!("{path}.{field}")
    }
}

impl Validator<'_, '_> {
    fn resolve<'x>(&'x self, schema: &'x AvroSchemaInner) -> Option<&'x AvroSchemaInner> {
        match schema {
            AvroSchemaInner::Ref { name } => self.names.get(&name.fullname(None)).copied(),
            other => Some(other),
        }
    }

    fn mismatch(&self, schema: &AvroSchemaInner, value: &JsonValue, path: &str, errors: &mut Vec<String>) {
        errors.push(format!(
            "at {path} expected type {}, got {}",
            type_name(schema),
            describe(value)
        ));
    }

    fn check(&self, schema: &AvroSchemaInner, value: &JsonValue, path: &str, errors: &mut Vec<String>) {
        let Some(schema) = self.resolve(schema) else {
            errors.push(format!("at {path} unknown type {}", type_name(schema)));
            return;
        };

        let ok = match (schema, value) {
            (AvroSchemaInner::Null, JsonValue::Null) => true,
            (AvroSchemaInner::Boolean, JsonValue::Bool(_)) => true,
            (AvroSchemaInner::Int | AvroSchemaInner::TimeMillis, JsonValue::Number(n)) => {
                n.as_i64().is_some_and(|i| i32::try_from(i).is_ok())
            }
            (AvroSchemaInner::Long | AvroSchemaInner::TimeMicros, JsonValue::Number(n)) => n.is_i64(),
            (AvroSchemaInner::Float | AvroSchemaInner::Double, JsonValue::Number(_)) => true,
            (AvroSchemaInner::String | AvroSchemaInner::Bytes, JsonValue::String(_)) => true,
            (AvroSchemaInner::Uuid, JsonValue::String(s)) => uuid::Uuid::parse_str(s).is_ok(),
            (AvroSchemaInner::Date, JsonValue::String(s)) => {
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
            }
            (AvroSchemaInner::Date, JsonValue::Number(n)) => {
                n.as_i64().is_some_and(|i| i32::try_from(i).is_ok())
            }
            (AvroSchemaInner::TimestampMillis | AvroSchemaInner::TimestampMicros, JsonValue::String(s)) => {
                parse_timestamp(s).is_ok()
            }
            (AvroSchemaInner::TimestampMillis | AvroSchemaInner::TimestampMicros, JsonValue::Number(n)) => {
                n.is_i64()
            }

            (AvroSchemaInner::Fixed(fixed), JsonValue::String(s)) => {
                if !decode_base64(s).is_ok_and(|bytes| bytes.len() == fixed.size) {
                    errors.push(format!(
                        "at {path} expected fixed of {} base64-encoded bytes, got {}",
                        fixed.size,
                        describe(value)
                    ));
                }
                return;
            }

            (AvroSchemaInner::Enum(e), JsonValue::String(s)) => {
                if !e.symbols.contains(s) {
                    errors.push(format!(
                        "at {path} expected enum with values {:?}, got {}",
                        e.symbols,
                        describe(value)
                    ));
                }
                return;
            }

            (AvroSchemaInner::Array(array), JsonValue::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    self.check(&array.items, item, &format!("{path}[{i}]"), errors);
                }
                return;
            }

            (AvroSchemaInner::Map(map), JsonValue::Object(obj)) => {
                for (k, v) in obj {
                    self.check(&map.types, v, &format!("{path}[{k}]"), errors);
                }
                return;
            }

            (AvroSchemaInner::Record(record), JsonValue::Object(obj)) => {
                for field in &record.fields {
                    let field_path = child_path(path, &field.name);
                    match obj.get(&field.name) {
                        Some(v) => self.check(&field.schema, v, &field_path, errors),
                        None if field.default.is_some() => {}
                        None => self.check(&field.schema, &JsonValue::Null, &field_path, errors),
                    }
                }
                if self.options.fail_on_extra_fields {
                    for key in obj.keys() {
                        if !record.lookup.contains_key(key) {
                            errors.push(format!("at {path} extra field '{key}' - not in schema"));
                        }
                    }
                }
                return;
            }

            (AvroSchemaInner::Union(union), _) => {
                let variants = union.variants();
                if variants.iter().any(|v| self.passes(v, value)) {
                    return;
                }
                if let JsonValue::Object(obj) = value {
                    if let (1, Some((key, inner))) = (obj.len(), obj.iter().next()) {
                        let wrapped = variants.iter().any(|v| {
                            self.resolve(v).is_some_and(|r| {
                                (type_name(r) == *key || type_name(r).rsplit('.').next() == Some(key.as_str()))
                                    && self.passes(r, inner)
                            })
                        });
                        if wrapped {
                            return;
                        }
                    }
                }
                let branches: Vec<String> = variants.iter().map(type_name).collect();
                errors.push(format!(
                    "at {path} expected union of [{}], got {}",
                    branches.join(", "),
                    describe(value)
                ));
                return;
            }

            _ => false,
        };

        if !ok {
            self.mismatch(schema, value, path, errors);
        }
    }

    fn passes(&self, schema: &AvroSchemaInner, value: &JsonValue) -> bool {
        let mut scratch = Vec::new();
        self.check(schema, value, ".", &mut scratch);
        scratch.is_empty()
    }
}
