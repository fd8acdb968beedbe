//! Schema stores
//!
//! A store turns `(name, namespace)` into a parsed, self-contained
//! [`AvroSchema`]. [`SchemaStore`] reads one file per top-level schema from a
//! directory tree, [`MutableSchemaStore`] additionally accepts definitions
//! handed to it at runtime and [`RegistrySchemaStore`] reads the latest
//! version of a registry subject named after the schema.
//!
//! Only top-level schemas are cached. Named types nested inside a definition
//! live in the call-scoped [`Names`](crate::avro::Names) of the resolution
//! that parsed them and are dropped when it finishes.

mod filesystem;
mod registry;
mod resolve;

pub use filesystem::{MutableSchemaStore, SchemaStore, DEFAULT_EXTENSION};
pub use registry::RegistrySchemaStore;

use crate::avro::AvroSchema;
use crate::error::{Error, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves schema names to parsed schemas
pub trait SchemaLookup: Send + Sync {
    /// Find the schema `name`, qualified by `namespace` unless it already contains a dot
    fn find(&self, name: &str, namespace: Option<&str>) -> Result<AvroSchema>;

    /// Load every schema the store can see
    fn load_schemas(&self) -> Result<()>;
}

impl<T: SchemaLookup + ?Sized> SchemaLookup for Arc<T> {
    fn find(&self, name: &str, namespace: Option<&str>) -> Result<AvroSchema> {
        (**self).find(name, namespace)
    }

    fn load_schemas(&self) -> Result<()> {
        (**self).load_schemas()
    }
}

/// Top-level schema cache shared by the store implementations
///
/// Reads take the map's read lock only. A miss serializes on `load_lock` and
/// checks again before doing any work, so concurrent first lookups of the same
/// name parse it once.
#[derive(Debug, Default)]
pub(crate) struct SchemaCache {
    schemas: RwLock<HashMap<String, AvroSchema>>,
    load_lock: Mutex<()>,
}

impl SchemaCache {
    pub(crate) fn get(&self, fullname: &str) -> Option<AvroSchema> {
        self.schemas.read().get(fullname).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.schemas.read().len()
    }

    /// Definitions of every cached schema, for seeding a resolution
    pub(crate) fn definitions(&self) -> Vec<(String, serde_json::Value)> {
        self.schemas
            .read()
            .iter()
            .map(|(name, schema)| (name.clone(), schema.definition().clone()))
            .collect()
    }

    /// Return the cached schema for `fullname` or run `load`
    ///
    /// `load` yields every top-level schema it parsed; each is cached unless an
    /// entry already exists.
    pub(crate) fn get_or_load(
        &self,
        fullname: &str,
        load: impl FnOnce() -> Result<Vec<(String, AvroSchema)>>,
    ) -> Result<AvroSchema> {
        if let Some(schema) = self.get(fullname) {
            return Ok(schema);
        }

        let _guard = self.load_lock.lock();
        if let Some(schema) = self.get(fullname) {
            return Ok(schema);
        }

        let loaded = load()?;
        let mut schemas = self.schemas.write();
        for (name, schema) in loaded {
            schemas.entry(name).or_insert(schema);
        }
        schemas.get(fullname).cloned().ok_or_else(|| {
            Error::SchemaNotFound(format!("could not resolve type `{fullname}`"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_load_runs_loader_once() {
        let cache = SchemaCache::default();
        let schema = AvroSchema::parse(r#"{"type":"enum","name":"color","symbols":["RED"]}"#).unwrap();

        let loaded = cache
            .get_or_load("color", || Ok(vec![("color".to_string(), schema.clone())]))
            .unwrap();
        assert_eq!(loaded, schema);

        let again = cache
            .get_or_load("color", || panic!("loader must not run on a hit"))
            .unwrap();
        assert_eq!(again, schema);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_or_load_keeps_existing_entries() {
        let cache = SchemaCache::default();
        let first = AvroSchema::parse(r#"{"type":"fixed","name":"id","size":4}"#).unwrap();
        let second = AvroSchema::parse(r#"{"type":"fixed","name":"id","size":8}"#).unwrap();
        let other = AvroSchema::parse(r#"{"type":"fixed","name":"other","size":2}"#).unwrap();

        cache.get_or_load("id", || Ok(vec![("id".into(), first.clone())])).unwrap();
        cache
            .get_or_load("other", || {
                Ok(vec![("id".into(), second.clone()), ("other".into(), other.clone())])
            })
            .unwrap();
        assert_eq!(cache.get("id"), Some(first));
    }
}
