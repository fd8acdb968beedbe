//! Local mode: Avro object container files
//!
//! No registry is involved. The container header embeds the writer schema,
//! so data encoded here can be read back without knowing its schema; a named
//! reader schema is only needed to project the data onto a different shape.

use crate::avro::AvroSchema;
use crate::error::Result;
use crate::store::SchemaLookup;
use crate::validation::{self, ValidationOptions};
use crate::value::{avro_to_json, json_to_avro};
use apache_avro::{Codec, Reader, Writer};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Compression codec for container blocks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    /// Deflate compression (zlib)
    Deflate,
}

impl Compression {
    fn to_avro_codec(self) -> Codec {
        match self {
            Compression::None => Codec::Null,
            Compression::Deflate => Codec::Deflate,
        }
    }
}

/// Encodes and decodes object container files using schemas from a store
pub struct AvroFile {
    schema_store: Arc<dyn SchemaLookup>,
    namespace: Option<String>,
    compression: Compression,
}

impl std::fmt::Debug for AvroFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AvroFile")
            .field("namespace", &self.namespace)
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}

impl AvroFile {
    pub fn new(schema_store: Arc<dyn SchemaLookup>) -> Self {
        Self {
            schema_store,
            namespace: None,
            compression: Compression::None,
        }
    }

    /// Namespace for schema names that are not fully qualified
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    fn find(&self, schema_name: &str) -> Result<AvroSchema> {
        self.schema_store.find(schema_name, self.namespace.as_deref())
    }

    /// Write `data` as the single record of a new container
    pub fn encode(&self, data: &JsonValue, schema_name: &str) -> Result<Vec<u8>> {
        self.encode_all(std::slice::from_ref(data), schema_name, false)
    }

    /// Like [`encode`](Self::encode), validating `data` first
    pub fn encode_validated(&self, data: &JsonValue, schema_name: &str) -> Result<Vec<u8>> {
        self.encode_all(std::slice::from_ref(data), schema_name, true)
    }

    /// Write every record in `records` into one container
    pub fn encode_all(&self, records: &[JsonValue], schema_name: &str, validate: bool) -> Result<Vec<u8>> {
        let schema = self.find(schema_name)?;
        let mut writer = Writer::with_codec(schema.inner(), Vec::new(), self.compression.to_avro_codec());

        for record in records {
            if validate {
                validation::validate(&schema, record, ValidationOptions::default())?;
            }
            writer.append(json_to_avro(record, &schema)?)?;
        }
        Ok(writer.into_inner()?)
    }

    /// First record in the container, `None` if it holds none
    pub fn decode_first(&self, data: &[u8], schema_name: Option<&str>) -> Result<Option<JsonValue>> {
        Ok(self.decode_all(data, schema_name)?.into_iter().next())
    }

    /// Every record in the container
    pub fn decode_all(&self, data: &[u8], schema_name: Option<&str>) -> Result<Vec<JsonValue>> {
        let reader_schema = schema_name.map(|name| self.find(name)).transpose()?;
        let reader = match &reader_schema {
            Some(schema) => Reader::with_schema(schema.inner(), data)?,
            None => Reader::new(data)?,
        };

        reader
            .map(|value| avro_to_json(&value?))
            .collect()
    }

    /// Whether `data` conforms to the schema `schema_name`
    pub fn is_valid(&self, data: &JsonValue, schema_name: &str) -> Result<bool> {
        let schema = self.find(schema_name)?;
        Ok(validation::collect_errors(&schema, data, ValidationOptions::default()).is_empty())
    }

    /// Load every schema in the store up front
    pub fn load_schemas(&self) -> Result<()> {
        self.schema_store.load_schemas()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::store::MutableSchemaStore;
    use serde_json::json;

    fn avro_file(dir: &tempfile::TempDir) -> AvroFile {
        let store = MutableSchemaStore::new(dir.path());
        store
            .add_schema_str(
                r#"{"type":"record","name":"message","namespace":"test","fields":[
                    {"name":"text","type":"string"},
                    {"name":"count","type":"int","default":0}]}"#,
            )
            .unwrap();
        AvroFile::new(Arc::new(store)).with_namespace("test")
    }

    #[test]
    fn test_encode_decode_first() {
        let dir = tempfile::tempdir().unwrap();
        let file = avro_file(&dir);
        let message = json!({"text": "hello", "count": 2});

        let data = file.encode(&message, "message").unwrap();
        assert_eq!(&data[..4], b"Obj\x01");
        assert_eq!(file.decode_first(&data, None).unwrap(), Some(message));
    }

    #[test]
    fn test_deflate_and_decode_all() {
        let dir = tempfile::tempdir().unwrap();
        let file = avro_file(&dir).with_compression(Compression::Deflate);
        let records = vec![json!({"text": "a", "count": 1}), json!({"text": "b", "count": 2})];

        let data = file.encode_all(&records, "message", true).unwrap();
        assert_eq!(file.decode_all(&data, None).unwrap(), records);
    }

    #[test]
    fn test_reader_schema_projects_fields() {
        let dir = tempfile::tempdir().unwrap();
        let data = avro_file(&dir)
            .encode(&json!({"text": "hi", "count": 5}), "message")
            .unwrap();

        let reader_store = MutableSchemaStore::new(dir.path());
        reader_store
            .add_schema_str(
                r#"{"type":"record","name":"message","namespace":"test","fields":[
                    {"name":"text","type":"string"}]}"#,
            )
            .unwrap();
        let reader = AvroFile::new(Arc::new(reader_store)).with_namespace("test");

        let projected = reader.decode_first(&data, Some("message")).unwrap();
        assert_eq!(projected, Some(json!({"text": "hi"})));
    }

    #[test]
    fn test_validity() {
        let dir = tempfile::tempdir().unwrap();
        let file = avro_file(&dir);

        assert!(file.is_valid(&json!({"text": "x", "count": 1}), "message").unwrap());
        assert!(!file.is_valid(&json!({"text": 1, "count": 1}), "message").unwrap());
        assert!(matches!(
            file.encode_validated(&json!({"text": 1, "count": 1}), "message"),
            Err(Error::Validation { .. })
        ));
    }
}
