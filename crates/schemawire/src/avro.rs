//! Apache Avro codec binding
//!
//! Wraps `apache-avro` so the rest of the crate can treat a parsed schema as
//! an immutable, shareable value with its own self-contained JSON text.
//!
//! Named-type references are resolved at the JSON level: before a definition
//! is handed to the parser, every reference to a type present in a [`Names`]
//! scratch map is replaced by that type's definition (the first time it is
//! seen) so the parsed schema never depends on anything outside itself. A
//! reference that cannot be satisfied surfaces as the typed
//! [`ParseError::UnresolvedReference`] carrying the missing fullname.
//!
//! # Example
//!
//! ```rust,ignore
//! use schemawire::avro::{AvroCodec, AvroSchema};
//!
//! let schema = AvroSchema::parse(r#"
//!     {"type": "record", "name": "person", "fields": [
//!         {"name": "full_name", "type": "string"}
//!     ]}
//! "#)?;
//!
//! let codec = AvroCodec::new(schema);
//! let bytes = codec.encode(&serde_json::json!({"full_name": "John Doe"}))?;
//! let decoded = codec.decode(&bytes)?;
//! ```

use crate::error::{Error, Result};
use crate::value::{avro_to_json, json_to_avro};
use apache_avro::{from_avro_datum, to_avro_datum, Schema as AvroSchemaInner};
use bytes::BufMut;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use thiserror::Error;

const PRIMITIVES: &[&str] = &[
    "null", "boolean", "int", "long", "float", "double", "bytes", "string",
];

/// Failure to turn a JSON definition into a schema
#[derive(Debug, Error)]
pub enum ParseError {
    /// The definition refers to a named type that is not known yet
    #[error("\"{0}\" is not a schema we know about")]
    UnresolvedReference(String),

    #[error("{0}")]
    Invalid(String),
}

type ParseResult<T> = std::result::Result<T, ParseError>;

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        match e {
            ParseError::UnresolvedReference(name) => {
                Error::SchemaNotFound(format!("could not resolve type `{name}`"))
            }
            ParseError::Invalid(msg) => Error::Parse(msg),
        }
    }
}

/// Call-scoped map of named-type definitions, keyed by fullname
///
/// Holds raw JSON so a later parse can inline a type it references. Entries
/// may be top-level or nested definitions; the map is discarded once the
/// resolution that owns it finishes.
#[derive(Debug, Clone, Default)]
pub struct Names {
    definitions: HashMap<String, JsonValue>,
}

impl Names {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, fullname: &str) -> bool {
        self.definitions.contains_key(fullname)
    }

    pub fn get(&self, fullname: &str) -> Option<&JsonValue> {
        self.definitions.get(fullname)
    }

    /// Record a definition under `fullname`, replacing any previous entry
    pub fn declare(&mut self, fullname: impl Into<String>, definition: JsonValue) {
        self.definitions.insert(fullname.into(), definition);
    }

    pub fn remove(&mut self, fullname: &str) -> Option<JsonValue> {
        self.definitions.remove(fullname)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Add every named type defined anywhere in `definition` that is not yet known
    pub fn absorb(&mut self, definition: &JsonValue) {
        let mut found = Vec::new();
        collect_definitions(definition, None, &mut found);
        for (fullname, def) in found {
            self.definitions.entry(fullname).or_insert(def);
        }
    }
}

/// Join a name and an optional namespace into a fullname
///
/// A name that already contains a dot is treated as fully qualified.
pub fn make_fullname(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() && !name.contains('.') => format!("{ns}.{name}"),
        _ => name.to_string(),
    }
}

fn split_fullname(fullname: &str) -> (Option<&str>, &str) {
    match fullname.rsplit_once('.') {
        Some((ns, name)) => (Some(ns), name),
        None => (None, fullname),
    }
}

fn is_named_kind(kind: &str) -> bool {
    matches!(kind, "record" | "error" | "enum" | "fixed")
}

/// Fullname and effective namespace of a named definition
fn definition_name(obj: &Map<String, JsonValue>, enclosing: Option<&str>) -> Option<(String, Option<String>)> {
    let name = obj.get("name")?.as_str()?;
    if name.contains('.') {
        let (ns, _) = split_fullname(name);
        return Some((name.to_string(), ns.map(str::to_string)));
    }
    let namespace = match obj.get("namespace").and_then(JsonValue::as_str) {
        Some(ns) => Some(ns),
        None => enclosing,
    }
    .filter(|ns| !ns.is_empty());
    Some((make_fullname(name, namespace), namespace.map(str::to_string)))
}

fn collect_definitions(value: &JsonValue, enclosing: Option<&str>, out: &mut Vec<(String, JsonValue)>) {
    match value {
        JsonValue::Array(branches) => {
            for branch in branches {
                collect_definitions(branch, enclosing, out);
            }
        }
        JsonValue::Object(obj) => {
            let kind = obj.get("type").and_then(JsonValue::as_str).unwrap_or_default();
            if is_named_kind(kind) {
                if let Some((fullname, namespace)) = definition_name(obj, enclosing) {
                    out.push((fullname, value.clone()));
                    if let Some(fields) = obj.get("fields").and_then(JsonValue::as_array) {
                        for field in fields {
                            if let Some(ty) = field.get("type") {
                                collect_definitions(ty, namespace.as_deref(), out);
                            }
                        }
                    }
                }
                return;
            }
            for key in ["type", "items", "values"] {
                if let Some(inner) = obj.get(key) {
                    collect_definitions(inner, enclosing, out);
                }
            }
        }
        _ => {}
    }
}

/// Comparable form of a type expression
///
/// References are fully qualified and nested named definitions collapse to
/// their fullname.
fn shape(value: &JsonValue, enclosing: Option<&str>) -> JsonValue {
    match value {
        JsonValue::String(reference) if PRIMITIVES.contains(&reference.as_str()) => value.clone(),
        JsonValue::String(reference) => JsonValue::String(make_fullname(reference, enclosing)),
        JsonValue::Array(branches) => {
            JsonValue::Array(branches.iter().map(|b| shape(b, enclosing)).collect())
        }
        JsonValue::Object(obj) => {
            let kind = obj.get("type").and_then(JsonValue::as_str).unwrap_or_default();
            if is_named_kind(kind) {
                return match definition_name(obj, enclosing) {
                    Some((fullname, _)) => JsonValue::String(fullname),
                    None => value.clone(),
                };
            }
            let key = match kind {
                "array" => "items",
                "map" => "values",
                _ => "type",
            };
            let mut out = obj.clone();
            if let Some(inner) = obj.get(key).map(|inner| shape(inner, enclosing)) {
                out.insert(key.to_string(), inner);
            }
            JsonValue::Object(out)
        }
        other => other.clone(),
    }
}

/// Comparable form of a named definition
///
/// An inlined copy of a type has the same shape as the definition it was
/// copied from, whatever namespace spelling either one uses.
fn definition_shape(obj: &Map<String, JsonValue>, fullname: &str, namespace: Option<&str>) -> JsonValue {
    let mut out = obj.clone();
    out.remove("namespace");
    out.insert("name".to_string(), JsonValue::String(fullname.to_string()));
    if let Some(JsonValue::Array(fields)) = obj.get("fields") {
        let fields = fields
            .iter()
            .map(|field| match field {
                JsonValue::Object(f) => {
                    let mut f = f.clone();
                    if let Some(ty) = f.get("type").map(|ty| shape(ty, namespace)) {
                        f.insert("type".to_string(), ty);
                    }
                    JsonValue::Object(f)
                }
                other => other.clone(),
            })
            .collect();
        out.insert("fields".to_string(), JsonValue::Array(fields));
    }
    JsonValue::Object(out)
}

fn name_in_use(fullname: &str) -> ParseError {
    ParseError::Invalid(format!("name `{fullname}` is already in use"))
}

/// Rewrites a definition so every reference to a type in `names` is inlined
struct Inliner<'a> {
    names: &'a Names,
    /// Shape of every named type emitted so far
    defined: HashMap<String, JsonValue>,
}

impl Inliner<'_> {
    fn walk(&mut self, value: &JsonValue, enclosing: Option<&str>) -> ParseResult<JsonValue> {
        match value {
            JsonValue::String(reference) => self.reference(reference, enclosing),
            JsonValue::Array(branches) => branches
                .iter()
                .map(|b| self.walk(b, enclosing))
                .collect::<ParseResult<Vec<_>>>()
                .map(JsonValue::Array),
            JsonValue::Object(obj) => self.object(obj, enclosing),
            other => Ok(other.clone()),
        }
    }

    fn reference(&mut self, reference: &str, enclosing: Option<&str>) -> ParseResult<JsonValue> {
        if PRIMITIVES.contains(&reference) {
            return Ok(JsonValue::String(reference.to_string()));
        }
        let fullname = make_fullname(reference, enclosing);
        if self.defined.contains_key(&fullname) {
            return Ok(JsonValue::String(fullname));
        }
        match self.names.get(&fullname) {
            Some(definition) => {
                // Inlined definitions keep their own namespace explicitly so
                // they parse the same inside any enclosing namespace.
                let (namespace, _) = split_fullname(&fullname);
                self.walk(definition, namespace)
            }
            None => Ok(JsonValue::String(fullname)),
        }
    }

    fn object(&mut self, obj: &Map<String, JsonValue>, enclosing: Option<&str>) -> ParseResult<JsonValue> {
        let kind = obj
            .get("type")
            .and_then(JsonValue::as_str)
            .unwrap_or_default()
            .to_string();
        let mut out = obj.clone();

        if is_named_kind(&kind) {
            let Some((fullname, namespace)) = definition_name(obj, enclosing) else {
                return Ok(JsonValue::Object(out));
            };
            // A type inlined from `names` may carry its own copy of a type
            // defined earlier in this walk. Identical copies collapse to a
            // reference.
            if self.defined.contains_key(&fullname) {
                self.check_copy(obj, &fullname, namespace.as_deref())?;
                return Ok(JsonValue::String(fullname));
            }
            self.defined.insert(
                fullname.clone(),
                definition_shape(obj, &fullname, namespace.as_deref()),
            );

            let (_, short) = split_fullname(&fullname);
            out.insert("name".to_string(), JsonValue::String(short.to_string()));
            if let Some(ns) = &namespace {
                out.insert("namespace".to_string(), JsonValue::String(ns.clone()));
            }
            if let Some(JsonValue::Array(fields)) = obj.get("fields") {
                let mut rewritten = Vec::with_capacity(fields.len());
                for field in fields {
                    rewritten.push(match field {
                        JsonValue::Object(f) => {
                            let mut f = f.clone();
                            if let Some(ty) = f.get("type").cloned() {
                                f.insert("type".to_string(), self.walk(&ty, namespace.as_deref())?);
                            }
                            JsonValue::Object(f)
                        }
                        other => other.clone(),
                    });
                }
                out.insert("fields".to_string(), JsonValue::Array(rewritten));
            }
            return Ok(JsonValue::Object(out));
        }

        match kind.as_str() {
            "array" => {
                if let Some(items) = obj.get("items") {
                    out.insert("items".to_string(), self.walk(items, enclosing)?);
                }
            }
            "map" => {
                if let Some(values) = obj.get("values") {
                    out.insert("values".to_string(), self.walk(values, enclosing)?);
                }
            }
            _ => {
                if let Some(ty) = obj.get("type") {
                    if !ty.is_string() || !PRIMITIVES.contains(&kind.as_str()) {
                        out.insert("type".to_string(), self.walk(ty, enclosing)?);
                    }
                }
            }
        }
        Ok(JsonValue::Object(out))
    }

    /// Fail unless a repeated definition, and every named type nested in
    /// it, matches what was emitted under the same fullname
    fn check_copy(
        &self,
        obj: &Map<String, JsonValue>,
        fullname: &str,
        namespace: Option<&str>,
    ) -> ParseResult<()> {
        if let Some(first) = self.defined.get(fullname) {
            if *first != definition_shape(obj, fullname, namespace) {
                return Err(name_in_use(fullname));
            }
        }
        let mut nested = Vec::new();
        if let Some(fields) = obj.get("fields").and_then(JsonValue::as_array) {
            for ty in fields.iter().filter_map(|field| field.get("type")) {
                collect_scoped(ty, namespace, &mut nested);
            }
        }
        for (inner, inner_namespace, inner_fullname) in nested {
            self.check_copy(inner, &inner_fullname, inner_namespace.as_deref())?;
        }
        Ok(())
    }
}

/// Named definitions directly reachable from a type expression, with their
/// effective namespace and fullname
fn collect_scoped<'v>(
    value: &'v JsonValue,
    enclosing: Option<&str>,
    out: &mut Vec<(&'v Map<String, JsonValue>, Option<String>, String)>,
) {
    match value {
        JsonValue::Array(branches) => {
            for branch in branches {
                collect_scoped(branch, enclosing, out);
            }
        }
        JsonValue::Object(obj) => {
            let kind = obj.get("type").and_then(JsonValue::as_str).unwrap_or_default();
            if is_named_kind(kind) {
                if let Some((fullname, namespace)) = definition_name(obj, enclosing) {
                    out.push((obj, namespace, fullname));
                }
                return;
            }
            for key in ["type", "items", "values"] {
                if let Some(inner) = obj.get(key) {
                    collect_scoped(inner, enclosing, out);
                }
            }
        }
        _ => {}
    }
}

/// Parsed, self-contained Avro schema
#[derive(Clone)]
pub struct AvroSchema {
    inner: Arc<AvroSchemaInner>,
    definition: Arc<JsonValue>,
    raw: Arc<str>,
}

impl std::fmt::Debug for AvroSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvroSchema").field("raw", &self.raw).finish()
    }
}

impl std::fmt::Display for AvroSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for AvroSchema {
    fn eq(&self, other: &Self) -> bool {
        self.definition == other.definition
    }
}

impl AvroSchema {
    /// Parse a standalone schema from JSON text
    pub fn parse(schema_str: &str) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(schema_str)
            .map_err(|e| Error::Parse(format!("invalid schema JSON: {e}")))?;
        Ok(Self::parse_with_names(&value, &Names::new())?)
    }

    /// Parse a definition, inlining any named types it references from `names`
    pub fn parse_with_names(definition: &JsonValue, names: &Names) -> ParseResult<Self> {
        let mut inliner = Inliner {
            names,
            defined: HashMap::new(),
        };
        let inlined = inliner.walk(definition, None)?;

        let inner = AvroSchemaInner::parse(&inlined).map_err(|e| match e {
            apache_avro::Error::ParsePrimitive(name) => ParseError::UnresolvedReference(name),
            other => ParseError::Invalid(other.to_string()),
        })?;
        let raw = serde_json::to_string(&inlined).map_err(|e| ParseError::Invalid(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(inner),
            definition: Arc::new(inlined),
            raw: raw.into(),
        })
    }

    /// The underlying `apache-avro` schema
    pub fn inner(&self) -> &AvroSchemaInner {
        &self.inner
    }

    /// Self-contained JSON text, suitable for registering
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Self-contained JSON definition
    pub fn definition(&self) -> &JsonValue {
        &self.definition
    }

    /// Parsing Canonical Form
    pub fn canonical_form(&self) -> String {
        self.inner.canonical_form()
    }

    /// Get the schema name (for named types)
    pub fn name(&self) -> Option<&str> {
        match self.inner.as_ref() {
            AvroSchemaInner::Record(r) => Some(r.name.name.as_str()),
            AvroSchemaInner::Enum(e) => Some(e.name.name.as_str()),
            AvroSchemaInner::Fixed(f) => Some(f.name.name.as_str()),
            _ => None,
        }
    }

    /// Get the schema namespace (for named types)
    pub fn namespace(&self) -> Option<&str> {
        match self.inner.as_ref() {
            AvroSchemaInner::Record(r) => r.name.namespace.as_deref(),
            AvroSchemaInner::Enum(e) => e.name.namespace.as_deref(),
            AvroSchemaInner::Fixed(f) => f.name.namespace.as_deref(),
            _ => None,
        }
    }

    /// Fully qualified name, if the schema is a named type
    pub fn fullname(&self) -> Option<String> {
        self.name()
            .map(|name| make_fullname(name, self.namespace()))
    }

    /// Kind of the top-level type
    pub fn kind(&self) -> &'static str {
        match self.inner.as_ref() {
            AvroSchemaInner::Null => "null",
            AvroSchemaInner::Boolean => "boolean",
            AvroSchemaInner::Int | AvroSchemaInner::Date | AvroSchemaInner::TimeMillis => "int",
            AvroSchemaInner::Long
            | AvroSchemaInner::TimeMicros
            | AvroSchemaInner::TimestampMillis
            | AvroSchemaInner::TimestampMicros => "long",
            AvroSchemaInner::Float => "float",
            AvroSchemaInner::Double => "double",
            AvroSchemaInner::Bytes => "bytes",
            AvroSchemaInner::String | AvroSchemaInner::Uuid => "string",
            AvroSchemaInner::Array(_) => "array",
            AvroSchemaInner::Map(_) => "map",
            AvroSchemaInner::Union(_) => "union",
            AvroSchemaInner::Record(_) => "record",
            AvroSchemaInner::Enum(_) => "enum",
            AvroSchemaInner::Fixed(_) => "fixed",
            _ => "unknown",
        }
    }

    pub fn is_record(&self) -> bool {
        matches!(self.inner.as_ref(), AvroSchemaInner::Record(_))
    }

    /// Get fields for a record schema
    pub fn fields(&self) -> Option<Vec<AvroField>> {
        match self.inner.as_ref() {
            AvroSchemaInner::Record(r) => Some(
                r.fields
                    .iter()
                    .map(|f| AvroField {
                        name: f.name.clone(),
                        doc: f.doc.clone(),
                        has_default: f.default.is_some(),
                        position: f.position,
                    })
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Every named type reachable from this schema, keyed by fullname
    pub fn named_types(&self) -> HashMap<String, &AvroSchemaInner> {
        let mut out = HashMap::new();
        collect_named(&self.inner, &mut out);
        out
    }
}

fn collect_named<'s>(schema: &'s AvroSchemaInner, out: &mut HashMap<String, &'s AvroSchemaInner>) {
    match schema {
        AvroSchemaInner::Record(r) => {
            if out.insert(r.name.fullname(None), schema).is_none() {
                for field in &r.fields {
                    collect_named(&field.schema, out);
                }
            }
        }
        AvroSchemaInner::Enum(e) => {
            out.insert(e.name.fullname(None), schema);
        }
        AvroSchemaInner::Fixed(f) => {
            out.insert(f.name.fullname(None), schema);
        }
        AvroSchemaInner::Array(a) => collect_named(&a.items, out),
        AvroSchemaInner::Map(m) => collect_named(&m.types, out),
        AvroSchemaInner::Union(u) => {
            for variant in u.variants() {
                collect_named(variant, out);
            }
        }
        _ => {}
    }
}

/// Information about a field in a record schema
#[derive(Debug, Clone)]
pub struct AvroField {
    pub name: String,
    pub doc: Option<String>,
    pub has_default: bool,
    pub position: usize,
}

/// Avro datum codec
///
/// Reads and writes bare Avro binary (no framing). With a reader schema set,
/// decoding applies Avro's writer/reader resolution rules.
#[derive(Debug, Clone)]
pub struct AvroCodec {
    writer_schema: AvroSchema,
    reader_schema: Option<AvroSchema>,
}

impl AvroCodec {
    pub fn new(schema: AvroSchema) -> Self {
        Self {
            writer_schema: schema,
            reader_schema: None,
        }
    }

    /// Create a codec with separate reader and writer schemas (for schema evolution)
    pub fn with_reader_schema(writer_schema: AvroSchema, reader_schema: AvroSchema) -> Self {
        Self {
            writer_schema,
            reader_schema: Some(reader_schema),
        }
    }

    pub fn writer_schema(&self) -> &AvroSchema {
        &self.writer_schema
    }

    pub fn reader_schema(&self) -> Option<&AvroSchema> {
        self.reader_schema.as_ref()
    }

    /// Encode a JSON value to Avro binary
    pub fn encode(&self, value: &JsonValue) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.encode_into(value, &mut buf)?;
        Ok(buf)
    }

    /// Encode a JSON value, appending the Avro binary to `buf`
    pub fn encode_into<B: BufMut>(&self, value: &JsonValue, buf: &mut B) -> Result<()> {
        let avro_value = json_to_avro(value, &self.writer_schema)?;
        let bytes = to_avro_datum(self.writer_schema.inner(), avro_value)?;
        buf.put_slice(&bytes);
        Ok(())
    }

    /// Decode Avro binary into a JSON value
    pub fn decode(&self, data: &[u8]) -> Result<JsonValue> {
        let mut cursor = Cursor::new(data);
        let reader = self.reader_schema.as_ref().map(AvroSchema::inner);
        let avro_value = from_avro_datum(self.writer_schema.inner(), &mut cursor, reader)?;
        avro_to_json(&avro_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_record() {
        let schema = AvroSchema::parse(
            r#"{"type":"record","name":"person","namespace":"test","fields":[
                {"name":"full_name","type":"string"},
                {"name":"age","type":["null","int"],"default":null}
            ]}"#,
        )
        .unwrap();

        assert_eq!(schema.name(), Some("person"));
        assert_eq!(schema.namespace(), Some("test"));
        assert_eq!(schema.fullname().as_deref(), Some("test.person"));
        assert_eq!(schema.kind(), "record");
        let fields = schema.fields().unwrap();
        assert_eq!(fields.len(), 2);
        assert!(!fields[0].has_default);
        assert!(fields[1].has_default);
    }

    #[test]
    fn test_primitive_has_no_fullname() {
        let schema = AvroSchema::parse(r#""string""#).unwrap();
        assert_eq!(schema.fullname(), None);
        assert_eq!(schema.kind(), "string");
    }

    #[test]
    fn test_unknown_type_is_unresolved_reference() {
        let value = json!({
            "type": "record", "name": "person", "namespace": "test",
            "fields": [{"name": "address", "type": "address"}]
        });
        let err = AvroSchema::parse_with_names(&value, &Names::new()).unwrap_err();
        match err {
            ParseError::UnresolvedReference(name) => assert_eq!(name, "test.address"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_references_are_inlined_from_names() {
        let mut names = Names::new();
        names.declare(
            "test.address",
            json!({"type": "record", "name": "address", "namespace": "test",
                   "fields": [{"name": "street", "type": "string"}]}),
        );
        let value = json!({
            "type": "record", "name": "person", "namespace": "test",
            "fields": [
                {"name": "home", "type": "address"},
                {"name": "work", "type": "address"}
            ]
        });

        let schema = AvroSchema::parse_with_names(&value, &names).unwrap();
        let standalone = AvroSchema::parse(schema.raw()).unwrap();
        assert_eq!(standalone.fullname().as_deref(), Some("test.person"));
        assert!(standalone.named_types().contains_key("test.address"));
    }

    #[test]
    fn test_self_reference_is_left_as_reference() {
        let schema = AvroSchema::parse(
            r#"{"type":"record","name":"node","fields":[
                {"name":"value","type":"long"},
                {"name":"next","type":["null","node"]}
            ]}"#,
        )
        .unwrap();
        assert_eq!(schema.fullname().as_deref(), Some("node"));
    }

    #[test]
    fn test_conflicting_duplicate_name_is_rejected() {
        let err = AvroSchema::parse(
            r#"{"type":"record","name":"outer","fields":[
                {"name":"a","type":{"type":"record","name":"x","fields":[{"name":"p","type":"int"}]}},
                {"name":"b","type":{"type":"record","name":"x","fields":[{"name":"q","type":"string"}]}}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(&err, Error::Parse(msg) if msg == "name `x` is already in use"), "{err:?}");
    }

    #[test]
    fn test_inlined_copy_must_match_local_definition() {
        let mut names = Names::new();
        names.absorb(&json!({
            "type": "record", "name": "invoice", "namespace": "billing",
            "fields": [{"name": "total", "type":
                {"type": "record", "name": "money", "fields": [{"name": "cents", "type": "long"}]}}]
        }));
        let same = json!({
            "type": "record", "name": "receipt", "namespace": "billing",
            "fields": [
                {"name": "amount", "type":
                    {"type": "record", "name": "money", "fields": [{"name": "cents", "type": "long"}]}},
                {"name": "invoice", "type": "invoice"}
            ]
        });
        let schema = AvroSchema::parse_with_names(&same, &names).unwrap();
        assert!(schema.named_types().contains_key("billing.money"));

        let different = json!({
            "type": "record", "name": "refund", "namespace": "billing",
            "fields": [
                {"name": "invoice", "type": "invoice"},
                {"name": "amount", "type":
                    {"type": "record", "name": "money", "fields": [{"name": "value", "type": "string"}]}}
            ]
        });
        match AvroSchema::parse_with_names(&different, &names).unwrap_err() {
            ParseError::Invalid(msg) => assert_eq!(msg, "name `billing.money` is already in use"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_absorb_collects_nested_definitions() {
        let mut names = Names::new();
        names.absorb(&json!({
            "type": "record", "name": "outer", "namespace": "a",
            "fields": [
                {"name": "inner", "type": {"type": "enum", "name": "color", "symbols": ["RED"]}},
                {"name": "list", "type": {"type": "array", "items":
                    {"type": "fixed", "name": "b.hash", "size": 4}}}
            ]
        }));
        assert!(names.contains("a.outer"));
        assert!(names.contains("a.color"));
        assert!(names.contains("b.hash"));
        assert_eq!(names.len(), 3);
    }

    #[test]
    fn test_make_fullname() {
        assert_eq!(make_fullname("person", Some("test")), "test.person");
        assert_eq!(make_fullname("other.person", Some("test")), "other.person");
        assert_eq!(make_fullname("person", None), "person");
        assert_eq!(make_fullname("person", Some("")), "person");
    }

    #[test]
    fn test_codec_roundtrip_with_reader_schema() {
        let writer = AvroSchema::parse(
            r#"{"type":"record","name":"person","fields":[
                {"name":"full_name","type":"string"}
            ]}"#,
        )
        .unwrap();
        let reader = AvroSchema::parse(
            r#"{"type":"record","name":"person","fields":[
                {"name":"full_name","type":"string"},
                {"name":"age","type":"int","default":0}
            ]}"#,
        )
        .unwrap();

        let bytes = AvroCodec::new(writer.clone())
            .encode(&json!({"full_name": "John Doe"}))
            .unwrap();
        assert_eq!(bytes[0], 16); // zigzag length of "John Doe"

        let decoded = AvroCodec::with_reader_schema(writer, reader)
            .decode(&bytes)
            .unwrap();
        assert_eq!(decoded, json!({"full_name": "John Doe", "age": 0}));
    }
}
