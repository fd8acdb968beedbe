//! Registry-framed messaging
//!
//! Encoded messages carry the registry id of their writer schema instead of
//! the schema itself:
//!
//! ```text
//! [0x00][schema id: u32 BE][Avro binary]
//! ```
//!
//! Encoding picks a schema through one of four selectors (see
//! [`EncodeOptions`]). Decoding reads the id, fetches the writer schema from
//! the registry once per id and optionally resolves the data into a reader
//! schema found in the local schema store.
//!
//! # Example
//!
//! ```rust,ignore
//! use schemawire::messaging::{EncodeOptions, Messaging, MessagingConfig};
//!
//! let messaging = Messaging::new(MessagingConfig::default().with_schemas_path("./schemas"))?;
//! let bytes = messaging.encode(
//!     &serde_json::json!({"full_name": "John Doe"}),
//!     &EncodeOptions::new().schema_name("person"),
//! )?;
//! let message = messaging.decode(&bytes, &Default::default())?;
//! ```

use crate::avro::{make_fullname, AvroCodec, AvroSchema};
use crate::cache::CacheConfig;
use crate::error::{Error, Result};
use crate::registry::{CachedRegistry, ConfluentRegistry, RegistryClientConfig, SchemaRegistry};
use crate::store::{RegistrySchemaStore, SchemaLookup, SchemaStore, DEFAULT_EXTENSION};
use crate::types::{SchemaId, SchemaType, SchemaVersion};
use crate::validation::{self, ValidationOptions};
use crate::wire;
use bytes::Bytes;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

fn default_schema_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

/// Settings for [`Messaging::new`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagingConfig {
    #[serde(default)]
    pub registry: RegistryClientConfig,

    /// Root of local schema files; without it schemas are looked up as registry subjects
    #[serde(default)]
    pub schemas_path: Option<PathBuf>,

    #[serde(default = "default_schema_extension")]
    pub schema_extension: String,

    /// Namespace for schema names that are not fully qualified
    #[serde(default)]
    pub namespace: Option<String>,

    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            registry: RegistryClientConfig::default(),
            schemas_path: None,
            schema_extension: default_schema_extension(),
            namespace: None,
            cache: CacheConfig::default(),
        }
    }
}

impl MessagingConfig {
    pub fn new(registry: RegistryClientConfig) -> Self {
        Self {
            registry,
            ..Default::default()
        }
    }

    pub fn with_schemas_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.schemas_path = Some(path.into());
        self
    }

    pub fn with_schema_extension(mut self, extension: impl Into<String>) -> Self {
        self.schema_extension = extension.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }
}

/// How [`Messaging::encode`] picks the writer schema
///
/// Selectors are tried in this order:
///
/// 1. `schema_id`: the registered schema with that id
/// 2. `subject` and `version`: that registered version
/// 3. `schema_name` with `register_schemas(false)`: the local schema, which
///    must already be registered under `subject` (or its fullname)
/// 4. `schema_name`: the local schema, registered under `subject` (or its
///    fullname) if needed
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub schema_name: Option<String>,
    pub namespace: Option<String>,
    pub subject: Option<String>,
    pub version: Option<SchemaVersion>,
    pub schema_id: Option<SchemaId>,
    pub register_schemas: bool,
    pub validate: bool,
    pub fail_on_extra_fields: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            schema_name: None,
            namespace: None,
            subject: None,
            version: None,
            schema_id: None,
            register_schemas: true,
            validate: false,
            fail_on_extra_fields: true,
        }
    }
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_name(mut self, name: impl Into<String>) -> Self {
        self.schema_name = Some(name.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn version(mut self, version: impl Into<SchemaVersion>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn schema_id(mut self, id: impl Into<SchemaId>) -> Self {
        self.schema_id = Some(id.into());
        self
    }

    pub fn register_schemas(mut self, register: bool) -> Self {
        self.register_schemas = register;
        self
    }

    /// Check the message against the schema before encoding
    pub fn validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn fail_on_extra_fields(mut self, fail: bool) -> Self {
        self.fail_on_extra_fields = fail;
        self
    }
}

/// Reader schema for [`Messaging::decode`]; without a name the writer schema is used
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    pub schema_name: Option<String>,
    pub namespace: Option<String>,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_name(mut self, name: impl Into<String>) -> Self {
        self.schema_name = Some(name.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

/// A decoded message together with the schemas used to read it
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub message: JsonValue,
    pub schema_id: SchemaId,
    pub writer_schema: AvroSchema,
    pub reader_schema: Option<AvroSchema>,
}

/// Encoder and decoder for registry-framed Avro messages
pub struct Messaging {
    registry: CachedRegistry,
    schema_store: Arc<dyn SchemaLookup>,
    namespace: Option<String>,
    schemas_by_id: RwLock<HashMap<SchemaId, AvroSchema>>,
}

impl std::fmt::Debug for Messaging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messaging")
            .field("registry", &self.registry)
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl Messaging {
    /// Connect to the configured registry and schema source
    pub fn new(config: MessagingConfig) -> Result<Self> {
        let upstream = ConfluentRegistry::new(&config.registry)?;
        let registry = CachedRegistry::with_cache(Arc::new(upstream), config.cache.build()?);

        let schema_store: Arc<dyn SchemaLookup> = match config.schemas_path {
            Some(path) => Arc::new(SchemaStore::with_extension(path, &config.schema_extension)),
            None => Arc::new(RegistrySchemaStore::new(registry.clone())),
        };
        Ok(Self::with_components(registry, schema_store, config.namespace))
    }

    /// Build from an existing registry and schema store
    pub fn with_components(
        registry: CachedRegistry,
        schema_store: Arc<dyn SchemaLookup>,
        namespace: Option<String>,
    ) -> Self {
        Self {
            registry,
            schema_store,
            namespace,
            schemas_by_id: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &CachedRegistry {
        &self.registry
    }

    pub fn schema_store(&self) -> &Arc<dyn SchemaLookup> {
        &self.schema_store
    }

    fn namespace_or_default<'a>(&'a self, namespace: Option<&'a str>) -> Option<&'a str> {
        namespace.or(self.namespace.as_deref())
    }

    /// Encode `message` and frame it with its schema id
    pub fn encode(&self, message: &JsonValue, options: &EncodeOptions) -> Result<Bytes> {
        let namespace = self.namespace_or_default(options.namespace.as_deref());
        let subject = options.subject.as_deref();

        let (schema, schema_id) = if let Some(id) = options.schema_id {
            self.fetch_schema_by_id(id)?
        } else if let (Some(subject), Some(version)) = (subject, options.version) {
            self.fetch_schema(subject, version)?
        } else if let Some(name) = options.schema_name.as_deref() {
            if options.register_schemas {
                self.register_schema(name, namespace, subject)?
            } else {
                self.fetch_schema_by_body(name, namespace, subject)?
            }
        } else {
            return Err(Error::InvalidArgument(
                "neither schema_name nor schema_id nor subject + version provided to determine the schema"
                    .to_string(),
            ));
        };

        if options.validate {
            validation::validate(
                &schema,
                message,
                ValidationOptions {
                    fail_on_extra_fields: options.fail_on_extra_fields,
                },
            )?;
        }

        let mut buf = wire::begin_frame(schema_id, 0);
        AvroCodec::new(schema).encode_into(message, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode a framed message
    pub fn decode(&self, data: &[u8], options: &DecodeOptions) -> Result<JsonValue> {
        Ok(self.decode_message(data, options)?.message)
    }

    /// Decode a framed message, keeping the schema id and schemas
    pub fn decode_message(&self, data: &[u8], options: &DecodeOptions) -> Result<DecodedMessage> {
        let (schema_id, payload) = wire::unframe(data)?;

        let reader_schema = match options.schema_name.as_deref() {
            Some(name) => {
                let namespace = self.namespace_or_default(options.namespace.as_deref());
                Some(self.schema_store.find(name, namespace)?)
            }
            None => None,
        };
        let (writer_schema, _) = self.fetch_schema_by_id(schema_id)?;

        let codec = match &reader_schema {
            Some(reader) => AvroCodec::with_reader_schema(writer_schema.clone(), reader.clone()),
            None => AvroCodec::new(writer_schema.clone()),
        };
        let message = codec.decode(payload)?;

        Ok(DecodedMessage {
            message,
            schema_id,
            writer_schema,
            reader_schema,
        })
    }

    /// Schema registered as `version` of `subject`
    pub fn fetch_schema(&self, subject: &str, version: SchemaVersion) -> Result<(AvroSchema, SchemaId)> {
        let record = match self.registry.subject_version(subject, version) {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                return Err(Error::SchemaNotFound(format!(
                    "could not find version {version} of subject `{subject}' in the Registry"
                )));
            }
            Err(e) => return Err(e),
        };
        let schema_type = record.schema_type();
        if schema_type != SchemaType::Avro {
            return Err(Error::IncompatibleSchemaType {
                subject: subject.to_string(),
                schema_type: schema_type.to_string(),
            });
        }
        Ok((AvroSchema::parse(&record.schema)?, record.id))
    }

    /// Schema registered under `id`, parsed once per id
    pub fn fetch_schema_by_id(&self, id: SchemaId) -> Result<(AvroSchema, SchemaId)> {
        if let Some(schema) = self.schemas_by_id.read().get(&id) {
            return Ok((schema.clone(), id));
        }
        debug!(schema_id = %id, "parsing writer schema");
        let definition = match self.registry.fetch(id) {
            Ok(definition) => definition,
            Err(e) if e.is_not_found() => {
                return Err(Error::SchemaNotFound(format!(
                    "could not find schema with id {id} in the Registry"
                )));
            }
            Err(e) => return Err(e),
        };
        let schema = AvroSchema::parse(&definition)?;
        let schema = self
            .schemas_by_id
            .write()
            .entry(id)
            .or_insert(schema)
            .clone();
        Ok((schema, id))
    }

    /// Local schema `name`, which must already be registered
    pub fn fetch_schema_by_body(
        &self,
        name: &str,
        namespace: Option<&str>,
        subject: Option<&str>,
    ) -> Result<(AvroSchema, SchemaId)> {
        let schema = self.schema_store.find(name, namespace)?;
        let subject = subject_for(&schema, name, namespace, subject);
        match self.registry.check(&subject, schema.raw())? {
            Some(record) => Ok((schema, record.id)),
            None => Err(Error::SchemaNotFound(format!(
                "Schema with structure: {schema} not found on registry"
            ))),
        }
    }

    /// Local schema `name`, registered under `subject` (or its fullname)
    pub fn register_schema(
        &self,
        name: &str,
        namespace: Option<&str>,
        subject: Option<&str>,
    ) -> Result<(AvroSchema, SchemaId)> {
        let schema = self.schema_store.find(name, namespace)?;
        let subject = subject_for(&schema, name, namespace, subject);
        let id = self.registry.register(&subject, schema.raw())?;
        Ok((schema, id))
    }
}

fn subject_for(schema: &AvroSchema, name: &str, namespace: Option<&str>, subject: Option<&str>) -> String {
    match subject {
        Some(subject) => subject.to_string(),
        None => schema.fullname().unwrap_or_else(|| make_fullname(name, namespace)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::FakeRegistryServer;
    use crate::store::MutableSchemaStore;
    use serde_json::json;

    const PERSON: &str = r#"{"type":"record","name":"person","fields":[{"name":"full_name","type":"string"}]}"#;

    fn setup() -> (Arc<FakeRegistryServer>, Arc<MutableSchemaStore>, Messaging, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let server = Arc::new(FakeRegistryServer::new());
        let client = ConfluentRegistry::with_transport(server.clone(), &RegistryClientConfig::default());
        let store = Arc::new(MutableSchemaStore::new(dir.path()));
        store.add_schema_str(PERSON).unwrap();
        let messaging = Messaging::with_components(CachedRegistry::new(Arc::new(client)), store.clone(), None);
        (server, store, messaging, dir)
    }

    #[test]
    fn test_missing_selector_is_invalid_argument() {
        let (_, _, messaging, _dir) = setup();
        let err = messaging.encode(&json!({}), &EncodeOptions::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn test_register_then_decode_uses_memo() {
        let (server, _, messaging, _dir) = setup();
        let message = json!({"full_name": "John Doe"});

        let bytes = messaging
            .encode(&message, &EncodeOptions::new().schema_name("person"))
            .unwrap();
        assert_eq!(&bytes[..5], &[0, 0, 0, 0, 0]);

        assert_eq!(messaging.decode(&bytes, &DecodeOptions::new()).unwrap(), message);
        let requests = server.request_count();
        assert_eq!(messaging.decode(&bytes, &DecodeOptions::new()).unwrap(), message);
        assert_eq!(server.request_count(), requests);
    }

    #[test]
    fn test_body_check_requires_registration() {
        let (_, _, messaging, _dir) = setup();
        let options = EncodeOptions::new().schema_name("person").register_schemas(false);

        let err = messaging.encode(&json!({"full_name": "x"}), &options).unwrap_err();
        assert!(matches!(err, Error::SchemaNotFound(ref m) if m.starts_with("Schema with structure:")));

        messaging.register_schema("person", None, None).unwrap();
        assert!(messaging.encode(&json!({"full_name": "x"}), &options).is_ok());
    }

    #[test]
    fn test_schema_id_wins_over_other_selectors() {
        let (_, _, messaging, _dir) = setup();
        let id = messaging
            .registry()
            .register("numbers", r#""long""#)
            .unwrap();

        let options = EncodeOptions::new().schema_id(id).schema_name("person");
        let bytes = messaging.encode(&json!(42), &options).unwrap();
        assert_eq!(messaging.decode(&bytes, &DecodeOptions::new()).unwrap(), json!(42));
    }

    #[test]
    fn test_validation_errors_are_reported() {
        let (_, _, messaging, _dir) = setup();
        let options = EncodeOptions::new().schema_name("person").validate(true);

        let err = messaging.encode(&json!({"full_name": 123}), &options).unwrap_err();
        match err {
            Error::Validation { errors } => {
                assert_eq!(errors, vec!["at .full_name expected type string, got int with value 123".to_string()])
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_bad_magic_byte() {
        let (_, _, messaging, _dir) = setup();
        let err = messaging.decode(&[1, 0, 0, 0, 0, 2], &DecodeOptions::new()).unwrap_err();
        assert!(matches!(err, Error::MalformedEnvelope(_)));
    }
}
