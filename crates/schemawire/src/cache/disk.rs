//! Disk-backed cache backend
//!
//! One pretty-printed JSON file per table under a directory:
//!
//! - `schemas_by_id.json`: `{"<id>": "<schema>"}`
//! - `ids_by_schema.json`: `{"<subject>": {"<normalized schema>": <id>}}`
//! - `schemas_by_subject_version.json`: `{"<subject>": {"<version>": <record>}}`
//!
//! Reads hold a shared file lock and writes an exclusive one, so several
//! processes can share a directory. Every store re-reads the file under the
//! exclusive lock before rewriting it, which keeps entries written by other
//! processes.

use super::{normalize_schema, RegistryCache};
use crate::error::{Error, Result};
use crate::types::{SchemaId, SubjectVersion};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SCHEMAS_BY_ID_FILE: &str = "schemas_by_id.json";
pub const IDS_BY_SCHEMA_FILE: &str = "ids_by_schema.json";
pub const SCHEMAS_BY_SUBJECT_VERSION_FILE: &str = "schemas_by_subject_version.json";

type SchemasById = BTreeMap<String, String>;
type IdsBySchema = BTreeMap<String, BTreeMap<String, SchemaId>>;
type SchemasByVersion = BTreeMap<String, BTreeMap<String, SubjectVersion>>;

/// One JSON file plus its in-memory copy
struct DiskTable<T> {
    path: PathBuf,
    data: RwLock<T>,
}

impl<T> DiskTable<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(T::default()),
        }
    }

    fn lookup<R>(&self, find: impl Fn(&T) -> Option<R>) -> Result<Option<R>> {
        {
            let data = self.data.read();
            if let Some(hit) = find(&*data) {
                return Ok(Some(hit));
            }
        }
        // Another process may have written the entry since we last looked.
        let fresh = self.load()?;
        let hit = find(&fresh);
        *self.data.write() = fresh;
        Ok(hit)
    }

    fn load(&self) -> Result<T> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;
        let data = read_table(&mut file, &self.path);
        file.unlock()?;
        data
    }

    fn store(&self, update: impl FnOnce(&mut T)) -> Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock()?;
        let result = self.rewrite(&mut file, update);
        file.unlock()?;
        result
    }

    fn rewrite(&self, file: &mut File, update: impl FnOnce(&mut T)) -> Result<()> {
        let mut data: T = read_table(file, &self.path)?;
        update(&mut data);

        let json = serde_json::to_string_pretty(&data)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(json.as_bytes())?;
        file.flush()?;

        debug!(path = %self.path.display(), "wrote cache file");
        *self.data.write() = data;
        Ok(())
    }
}

fn read_table<T: Default + DeserializeOwned>(file: &mut File, path: &Path) -> Result<T> {
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    if contents.is_empty() {
        warn!("zero length file at {}", path.display());
        return Ok(T::default());
    }
    serde_json::from_str(&contents).map_err(|source| Error::CacheCorruption {
        path: path.to_path_buf(),
        source,
    })
}

/// Write-through cache persisted as JSON files
pub struct DiskCache {
    dir: PathBuf,
    schemas_by_id: DiskTable<SchemasById>,
    ids_by_schema: DiskTable<IdsBySchema>,
    schemas_by_version: DiskTable<SchemasByVersion>,
}

impl std::fmt::Debug for DiskCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskCache").field("dir", &self.dir).finish()
    }
}

impl DiskCache {
    /// Use `dir` for the cache files, creating it if needed
    ///
    /// Files are read on first lookup, so a corrupted file surfaces as
    /// [`Error::CacheCorruption`] from the first operation that touches it.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            schemas_by_id: DiskTable::new(dir.join(SCHEMAS_BY_ID_FILE)),
            ids_by_schema: DiskTable::new(dir.join(IDS_BY_SCHEMA_FILE)),
            schemas_by_version: DiskTable::new(dir.join(SCHEMAS_BY_SUBJECT_VERSION_FILE)),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RegistryCache for DiskCache {
    fn lookup_by_id(&self, id: SchemaId) -> Result<Option<String>> {
        let key = id.to_string();
        self.schemas_by_id.lookup(|t| t.get(&key).cloned())
    }

    fn store_by_id(&self, id: SchemaId, schema: String) -> Result<String> {
        let key = id.to_string();
        let value = schema.clone();
        self.schemas_by_id.store(|t| {
            t.insert(key, value);
        })?;
        Ok(schema)
    }

    fn lookup_by_schema(&self, subject: &str, schema: &str) -> Result<Option<SchemaId>> {
        let key = normalize_schema(schema);
        self.ids_by_schema
            .lookup(|t| t.get(subject).and_then(|ids| ids.get(&key)).copied())
    }

    fn store_by_schema(&self, subject: &str, schema: &str, id: SchemaId) -> Result<SchemaId> {
        let key = normalize_schema(schema);
        self.ids_by_schema.store(|t| {
            t.entry(subject.to_string()).or_default().insert(key, id);
        })?;
        Ok(id)
    }

    fn lookup_by_version(&self, subject: &str, version: u32) -> Result<Option<SubjectVersion>> {
        let key = version.to_string();
        self.schemas_by_version
            .lookup(|t| t.get(subject).and_then(|versions| versions.get(&key)).cloned())
    }

    fn store_by_version(&self, subject: &str, version: u32, record: SubjectVersion) -> Result<SubjectVersion> {
        let value = record.clone();
        self.schemas_by_version.store(|t| {
            t.entry(subject.to_string())
                .or_default()
                .insert(version.to_string(), value);
        })?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_writes_pretty_json_with_string_ids() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DiskCache::new(dir.path()).unwrap();

        cache.store_by_id(SchemaId(5), r#""int""#.to_string()).unwrap();

        let text = std::fs::read_to_string(dir.path().join(SCHEMAS_BY_ID_FILE)).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, serde_json::json!({"5": "\"int\""}));
        assert!(text.contains('\n'));
    }

    #[test]
    fn test_entries_survive_a_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        {
            let cache = DiskCache::new(dir.path()).unwrap();
            cache.store_by_schema("person", r#"{"type":"string"}"#, SchemaId(2)).unwrap();
        }
        let cache = DiskCache::new(dir.path()).unwrap();
        assert_eq!(
            cache.lookup_by_schema("person", r#"{ "type": "string" }"#).unwrap(),
            Some(SchemaId(2))
        );
        assert_eq!(cache.lookup_by_schema("other", r#"{"type":"string"}"#).unwrap(), None);
    }

    #[test]
    fn test_store_keeps_entries_from_other_writers() {
        let dir = tempfile::tempdir().unwrap();
        let first = DiskCache::new(dir.path()).unwrap();
        let second = DiskCache::new(dir.path()).unwrap();

        first.store_by_id(SchemaId(1), "\"a\"".into()).unwrap();
        second.store_by_id(SchemaId(2), "\"b\"".into()).unwrap();

        let text = std::fs::read_to_string(dir.path().join(SCHEMAS_BY_ID_FILE)).unwrap();
        let parsed: SchemasById = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(first.lookup_by_id(SchemaId(2)).unwrap().as_deref(), Some("\"b\""));
    }

    #[test]
    fn test_zero_length_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SCHEMAS_BY_ID_FILE), "").unwrap();

        let cache = DiskCache::new(dir.path()).unwrap();
        assert_eq!(cache.lookup_by_id(SchemaId(0)).unwrap(), None);
        cache.store_by_id(SchemaId(0), "\"x\"".into()).unwrap();
        assert_eq!(cache.lookup_by_id(SchemaId(0)).unwrap().as_deref(), Some("\"x\""));
    }

    #[test]
    fn test_corrupted_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SCHEMAS_BY_SUBJECT_VERSION_FILE), "{not json").unwrap();

        let cache = DiskCache::new(dir.path()).unwrap();
        assert!(matches!(
            cache.lookup_by_version("person", 1),
            Err(Error::CacheCorruption { .. })
        ));
        assert!(matches!(
            cache.store_by_version(
                "person",
                1,
                SubjectVersion {
                    subject: "person".into(),
                    version: 1,
                    id: SchemaId(0),
                    schema: "\"int\"".into(),
                    schema_type: None,
                    references: Vec::new(),
                }
            ),
            Err(Error::CacheCorruption { .. })
        ));
    }
}
