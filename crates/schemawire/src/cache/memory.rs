//! In-memory cache backend

use super::{normalize_schema, RegistryCache};
use crate::error::Result;
use crate::types::{SchemaId, SubjectVersion};
use dashmap::DashMap;

/// Process-lifetime cache, no persistence and no eviction
#[derive(Debug, Default)]
pub struct MemoryCache {
    /// Schema text by id
    schemas_by_id: DashMap<SchemaId, String>,
    /// (subject, normalized schema) -> id
    ids_by_schema: DashMap<(String, String), SchemaId>,
    /// (subject, version) -> record
    schemas_by_version: DashMap<(String, u32), SubjectVersion>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached ids
    pub fn len(&self) -> usize {
        self.schemas_by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas_by_id.is_empty()
    }
}

impl RegistryCache for MemoryCache {
    fn lookup_by_id(&self, id: SchemaId) -> Result<Option<String>> {
        Ok(self.schemas_by_id.get(&id).map(|s| s.clone()))
    }

    fn store_by_id(&self, id: SchemaId, schema: String) -> Result<String> {
        self.schemas_by_id.insert(id, schema.clone());
        Ok(schema)
    }

    fn lookup_by_schema(&self, subject: &str, schema: &str) -> Result<Option<SchemaId>> {
        let key = (subject.to_string(), normalize_schema(schema));
        Ok(self.ids_by_schema.get(&key).map(|id| *id))
    }

    fn store_by_schema(&self, subject: &str, schema: &str, id: SchemaId) -> Result<SchemaId> {
        self.ids_by_schema
            .insert((subject.to_string(), normalize_schema(schema)), id);
        Ok(id)
    }

    fn lookup_by_version(&self, subject: &str, version: u32) -> Result<Option<SubjectVersion>> {
        let key = (subject.to_string(), version);
        Ok(self.schemas_by_version.get(&key).map(|r| r.clone()))
    }

    fn store_by_version(&self, subject: &str, version: u32, record: SubjectVersion) -> Result<SubjectVersion> {
        self.schemas_by_version
            .insert((subject.to_string(), version), record.clone());
        Ok(record)
    }
}
