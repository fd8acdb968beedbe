//! Cache-aside wrapper around a registry

use super::SchemaRegistry;
use crate::cache::{MemoryCache, RegistryCache};
use crate::error::Result;
use crate::types::*;
use std::sync::Arc;
use tracing::debug;

/// A registry whose lookups and registrations are memoized
///
/// `fetch`, `register` and `subject_version` for a concrete version go through
/// the cache; `latest`, listings, checks and config always reach upstream.
#[derive(Clone)]
pub struct CachedRegistry {
    upstream: Arc<dyn SchemaRegistry>,
    cache: Arc<dyn RegistryCache>,
}

impl std::fmt::Debug for CachedRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedRegistry").finish_non_exhaustive()
    }
}

impl CachedRegistry {
    /// Wrap `upstream` with an in-memory cache
    pub fn new(upstream: Arc<dyn SchemaRegistry>) -> Self {
        Self::with_cache(upstream, Arc::new(MemoryCache::new()))
    }

    pub fn with_cache(upstream: Arc<dyn SchemaRegistry>, cache: Arc<dyn RegistryCache>) -> Self {
        Self { upstream, cache }
    }

    pub fn upstream(&self) -> &Arc<dyn SchemaRegistry> {
        &self.upstream
    }

    pub fn cache(&self) -> &Arc<dyn RegistryCache> {
        &self.cache
    }
}

impl SchemaRegistry for CachedRegistry {
    fn fetch(&self, id: SchemaId) -> Result<String> {
        if let Some(schema) = self.cache.lookup_by_id(id)? {
            debug!(schema_id = %id, "schema cache hit");
            return Ok(schema);
        }
        let schema = self.upstream.fetch(id)?;
        self.cache.store_by_id(id, schema)
    }

    fn fetch_subject_versions(&self, id: SchemaId) -> Result<Vec<SubjectVersionRef>> {
        self.upstream.fetch_subject_versions(id)
    }

    fn register(&self, subject: &str, schema: &str) -> Result<SchemaId> {
        if let Some(id) = self.cache.lookup_by_schema(subject, schema)? {
            debug!(subject, schema_id = %id, "registration cache hit");
            return Ok(id);
        }
        let id = self.upstream.register(subject, schema)?;
        self.cache.store_by_schema(subject, schema, id)
    }

    fn subjects(&self) -> Result<Vec<String>> {
        self.upstream.subjects()
    }

    fn subject_versions(&self, subject: &str) -> Result<Vec<u32>> {
        self.upstream.subject_versions(subject)
    }

    fn subject_version(&self, subject: &str, version: SchemaVersion) -> Result<SubjectVersion> {
        let SchemaVersion::Number(number) = version else {
            return self.upstream.subject_version(subject, version);
        };
        if let Some(record) = self.cache.lookup_by_version(subject, number)? {
            debug!(subject, version = number, "subject version cache hit");
            return Ok(record);
        }
        let record = self.upstream.subject_version(subject, version)?;
        self.cache.store_by_version(subject, number, record)
    }

    fn check(&self, subject: &str, schema: &str) -> Result<Option<SubjectVersion>> {
        self.upstream.check(subject, schema)
    }

    fn compatible(&self, subject: &str, schema: &str, version: SchemaVersion) -> Result<Option<bool>> {
        self.upstream.compatible(subject, schema, version)
    }

    fn global_config(&self) -> Result<CompatibilityConfig> {
        self.upstream.global_config()
    }

    fn update_global_config(&self, config: CompatibilityConfig) -> Result<CompatibilityConfig> {
        self.upstream.update_global_config(config)
    }

    fn subject_config(&self, subject: &str) -> Result<CompatibilityConfig> {
        self.upstream.subject_config(subject)
    }

    fn update_subject_config(&self, subject: &str, config: CompatibilityConfig) -> Result<CompatibilityConfig> {
        self.upstream.update_subject_config(subject, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ConfluentRegistry, FakeRegistryServer, RegistryClientConfig};

    fn setup() -> (Arc<FakeRegistryServer>, CachedRegistry) {
        let server = Arc::new(FakeRegistryServer::new());
        let client = ConfluentRegistry::with_transport(server.clone(), &RegistryClientConfig::default());
        (server, CachedRegistry::new(Arc::new(client)))
    }

    const SCHEMA: &str = r#"{"type":"record","name":"person","fields":[{"name":"full_name","type":"string"}]}"#;

    #[test]
    fn test_register_is_memoized() {
        let (server, registry) = setup();

        let id = registry.register("person", SCHEMA).unwrap();
        let again = registry.register("person", SCHEMA).unwrap();
        assert_eq!(id, again);
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn test_fetch_is_memoized() {
        let (server, registry) = setup();
        let id = registry.register("person", SCHEMA).unwrap();

        registry.fetch(id).unwrap();
        registry.fetch(id).unwrap();
        assert_eq!(server.request_count(), 2);
    }

    #[test]
    fn test_latest_is_never_cached() {
        let (server, registry) = setup();
        registry.register("person", SCHEMA).unwrap();

        registry.subject_version("person", SchemaVersion::latest()).unwrap();
        registry.subject_version("person", SchemaVersion::latest()).unwrap();
        assert_eq!(server.request_count(), 3);

        registry.subject_version("person", SchemaVersion::new(1)).unwrap();
        registry.subject_version("person", SchemaVersion::new(1)).unwrap();
        assert_eq!(server.request_count(), 4);
    }
}
