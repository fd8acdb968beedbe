//! Schema store backed by registry subjects
//!
//! The schema `com.example.person` is the latest version of the subject
//! `com.example.person`.

use super::resolve::{DefinitionSource, Resolver};
use super::{SchemaCache, SchemaLookup};
use crate::avro::{make_fullname, AvroSchema};
use crate::error::{Error, Result};
use crate::registry::{CachedRegistry, SchemaRegistry};
use crate::types::SchemaVersion;
use serde_json::Value as JsonValue;

struct RegistrySubjects<'a> {
    registry: &'a CachedRegistry,
}

impl DefinitionSource for RegistrySubjects<'_> {
    fn definition(&self, fullname: &str) -> Result<(String, JsonValue)> {
        let record = match self.registry.subject_version(fullname, SchemaVersion::latest()) {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                return Err(Error::SchemaNotFound(format!(
                    "could not find Avro schema in the Registry: `{fullname}'"
                )));
            }
            Err(e) => return Err(e),
        };
        let definition = serde_json::from_str(&record.schema).map_err(|e| {
            Error::Parse(format!("invalid schema JSON for subject {fullname}: {e}"))
        })?;
        Ok((format!("subject {fullname}"), definition))
    }
}

/// Schema store resolving names through a registry
#[derive(Debug)]
pub struct RegistrySchemaStore {
    registry: CachedRegistry,
    cache: SchemaCache,
}

impl RegistrySchemaStore {
    pub fn new(registry: CachedRegistry) -> Self {
        Self {
            registry,
            cache: SchemaCache::default(),
        }
    }

    pub fn registry(&self) -> &CachedRegistry {
        &self.registry
    }

    /// Number of cached top-level schemas
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SchemaLookup for RegistrySchemaStore {
    fn find(&self, name: &str, namespace: Option<&str>) -> Result<AvroSchema> {
        let fullname = make_fullname(name, namespace);
        self.cache.get_or_load(&fullname, || {
            let source = RegistrySubjects {
                registry: &self.registry,
            };
            let mut resolver = Resolver::new(&source);
            resolver.resolve(&fullname)?;
            Ok(resolver.into_loaded())
        })
    }

    fn load_schemas(&self) -> Result<()> {
        for subject in self.registry.subjects()? {
            self.find(&subject, None)?;
        }
        Ok(())
    }
}
