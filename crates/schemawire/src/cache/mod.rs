//! Cache backends for [`CachedRegistry`](crate::registry::CachedRegistry)
//!
//! Three monotonically growing tables: id → schema text,
//! (subject, schema) → id and (subject, version) → record. A cache is only an
//! accelerator; every miss is answered by the upstream registry.

mod disk;
mod memory;

pub use disk::DiskCache;
pub use memory::MemoryCache;

use crate::error::Result;
use crate::types::{SchemaId, SubjectVersion};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use std::sync::Arc;

/// Cache-aside storage used by the cached registry
///
/// `store_*` returns the stored value so a caller can write
/// `cache.store_by_id(id, upstream.fetch(id)?)`.
pub trait RegistryCache: Send + Sync {
    fn lookup_by_id(&self, id: SchemaId) -> Result<Option<String>>;

    fn store_by_id(&self, id: SchemaId, schema: String) -> Result<String>;

    /// Keyed by structural content, so formatting and key order do not matter
    fn lookup_by_schema(&self, subject: &str, schema: &str) -> Result<Option<SchemaId>>;

    fn store_by_schema(&self, subject: &str, schema: &str, id: SchemaId) -> Result<SchemaId>;

    fn lookup_by_version(&self, subject: &str, version: u32) -> Result<Option<SubjectVersion>>;

    fn store_by_version(&self, subject: &str, version: u32, record: SubjectVersion) -> Result<SubjectVersion>;
}

/// Which cache backend a [`Messaging`](crate::messaging::Messaging) builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheConfig {
    #[default]
    Memory,
    Disk { path: PathBuf },
}

impl CacheConfig {
    pub fn build(&self) -> Result<Arc<dyn RegistryCache>> {
        Ok(match self {
            CacheConfig::Memory => Arc::new(MemoryCache::new()),
            CacheConfig::Disk { path } => Arc::new(DiskCache::new(path)?),
        })
    }
}

/// Content key for a schema: JSON re-serialized with sorted object keys
///
/// Text that is not JSON is used as-is.
pub fn normalize_schema(schema: &str) -> String {
    match serde_json::from_str::<JsonValue>(schema) {
        Ok(value) => sorted(value).to_string(),
        Err(_) => schema.to_string(),
    }
}

fn sorted(value: JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(obj) => {
            let mut entries: Vec<_> = obj.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            JsonValue::Object(entries.into_iter().map(|(k, v)| (k, sorted(v))).collect())
        }
        JsonValue::Array(items) => JsonValue::Array(items.into_iter().map(sorted).collect()),
        other => other,
    }
}
