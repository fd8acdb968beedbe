//! # schemawire
//!
//! Avro schemas by name, a cached Confluent-compatible registry client and
//! the registry wire format.
//!
//! ## Features
//!
//! - **Schema stores**: resolve `namespace.name` to a parsed schema from a
//!   directory tree or from registry subjects, including forward and circular
//!   references between files
//! - **Registry client**: register, fetch, list, check and configure over
//!   HTTP, with schema contexts, path prefixes, basic auth and mutual TLS
//! - **Caching**: cache-aside wrapper over any registry with an in-memory or
//!   file-locked on-disk backend
//! - **Messaging**: encode with a schema id in front, decode by fetching the
//!   writer schema once per id
//! - **Local mode**: Avro object container files without a registry
//!
//! ## Wire Format
//!
//! ```text
//! [0x00][schema_id: 4 bytes big-endian][avro_binary_data]
//! ```
//!
//! This is compatible with Kafka producers/consumers using Confluent serializers.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use schemawire::{EncodeOptions, DecodeOptions, Messaging, MessagingConfig, RegistryClientConfig};
//!
//! let config = MessagingConfig::new(RegistryClientConfig::new("http://localhost:8081"))
//!     .with_schemas_path("./schemas");
//! let messaging = Messaging::new(config)?;
//!
//! // Registers ./schemas/person.avsc under the subject `person` on first use
//! let bytes = messaging.encode(
//!     &serde_json::json!({"full_name": "John Doe"}),
//!     &EncodeOptions::new().schema_name("person"),
//! )?;
//! let message = messaging.decode(&bytes, &DecodeOptions::new())?;
//! ```
//!
//! ## Schema Files
//!
//! A schema named `com.example.person` is read from
//! `<schemas_path>/com/example/person.avsc` and must declare that fullname.
//! Types defined in other files are referenced by name:
//!
//! ```text
//! schemas/
//! └── com/example/
//!     ├── person.avsc    {"type": "record", "name": "person", ... "type": "address" ...}
//!     └── address.avsc   {"type": "record", "name": "address", ...}
//! ```

pub mod avro;
pub mod cache;
pub mod container;
pub mod error;
pub mod messaging;
pub mod registry;
pub mod store;
pub mod types;
pub mod validation;
pub mod value;
pub mod wire;

// Re-exports for convenience
pub use avro::{AvroCodec, AvroSchema};
pub use cache::{CacheConfig, DiskCache, MemoryCache, RegistryCache};
pub use container::{AvroFile, Compression};
pub use error::{error_codes, Error, Result};
pub use messaging::{DecodeOptions, DecodedMessage, EncodeOptions, Messaging, MessagingConfig};
pub use registry::{
    CachedRegistry, ConfluentRegistry, FakeRegistryServer, RegistryClientConfig, SchemaRegistry,
};
pub use store::{MutableSchemaStore, RegistrySchemaStore, SchemaLookup, SchemaStore};
pub use types::{
    CompatibilityConfig, CompatibilityLevel, SchemaId, SchemaReference, SchemaType, SchemaVersion,
    SubjectVersion, SubjectVersionRef,
};
pub use validation::ValidationOptions;
