//! Directory-backed schema stores
//!
//! `com.example.person` lives at `<root>/com/example/person.avsc`. The file
//! must declare the same fullname it was found under.

use super::resolve::{DefinitionSource, Resolver};
use super::{SchemaCache, SchemaLookup};
use crate::avro::{make_fullname, AvroSchema, Names};
use crate::error::{Error, Result};
use serde_json::Value as JsonValue;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File extension used when none is configured
pub const DEFAULT_EXTENSION: &str = "avsc";

/// Maps fullnames to files under a root directory
#[derive(Debug, Clone)]
struct SchemaFiles {
    root: PathBuf,
    extension: String,
}

impl SchemaFiles {
    fn path_for(&self, fullname: &str) -> PathBuf {
        let mut path = self.root.clone();
        let mut segments = fullname.split('.').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{segment}.{}", self.extension));
            }
        }
        path
    }

    /// Fullname implied by a file's location, `None` for other extensions
    fn fullname_for(&self, path: &Path) -> Option<String> {
        if path.extension()?.to_str()? != self.extension {
            return None;
        }
        let relative = path.strip_prefix(&self.root).ok()?.with_extension("");
        let segments: Vec<&str> = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<_>>()?;
        Some(segments.join("."))
    }

    fn all_fullnames(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if entry.file_type().is_file() {
                if let Some(fullname) = self.fullname_for(entry.path()) {
                    names.push(fullname);
                }
            }
        }
        Ok(names)
    }
}

impl DefinitionSource for SchemaFiles {
    fn definition(&self, fullname: &str) -> Result<(String, JsonValue)> {
        let path = self.path_for(fullname);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            // Too long a name cannot exist on disk either.
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::InvalidFilename) => {
                return Err(Error::SchemaNotFound(format!(
                    "could not find Avro schema at `{}'",
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        let definition = serde_json::from_str(&text)
            .map_err(|e| Error::Parse(format!("invalid schema JSON in {}: {e}", path.display())))?;
        debug!(path = %path.display(), "read schema file");
        Ok((path.display().to_string(), definition))
    }
}

/// Schema store reading one file per top-level schema
#[derive(Debug)]
pub struct SchemaStore {
    files: SchemaFiles,
    cache: SchemaCache,
}

impl SchemaStore {
    /// Store rooted at `root`, reading `.avsc` files
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_extension(root, DEFAULT_EXTENSION)
    }

    /// Store rooted at `root`, reading files with `extension` (given without the dot)
    pub fn with_extension(root: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            files: SchemaFiles {
                root: root.into(),
                extension: extension.trim_start_matches('.').to_string(),
            },
            cache: SchemaCache::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.files.root
    }

    pub fn extension(&self) -> &str {
        &self.files.extension
    }

    /// Number of cached top-level schemas
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The file a fullname is expected at
    pub fn path_for(&self, fullname: &str) -> PathBuf {
        self.files.path_for(fullname)
    }
}

impl SchemaLookup for SchemaStore {
    fn find(&self, name: &str, namespace: Option<&str>) -> Result<AvroSchema> {
        let fullname = make_fullname(name, namespace);
        self.cache.get_or_load(&fullname, || {
            let mut resolver = Resolver::new(&self.files);
            resolver.resolve(&fullname)?;
            Ok(resolver.into_loaded())
        })
    }

    fn load_schemas(&self) -> Result<()> {
        for fullname in self.files.all_fullnames()? {
            self.find(&fullname, None)?;
        }
        Ok(())
    }
}

/// [`SchemaStore`] that also accepts definitions at runtime
///
/// An added definition may refer to any schema already cached as well as to
/// files under the root.
#[derive(Debug)]
pub struct MutableSchemaStore {
    store: SchemaStore,
}

impl MutableSchemaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            store: SchemaStore::new(root),
        }
    }

    pub fn with_extension(root: impl Into<PathBuf>, extension: &str) -> Self {
        Self {
            store: SchemaStore::with_extension(root, extension),
        }
    }

    /// Parse and cache a named definition
    ///
    /// If a schema with the same fullname is already cached it is returned
    /// unchanged and `definition` is ignored.
    pub fn add_schema(&self, definition: &JsonValue) -> Result<AvroSchema> {
        let fullname = declared_fullname(definition).ok_or_else(|| {
            Error::InvalidArgument("only named schemas (record, enum, fixed) can be added".into())
        })?;

        self.store.cache.get_or_load(&fullname, || {
            let mut names = Names::new();
            for (name, cached) in self.store.cache.definitions() {
                names.declare(name, cached);
            }
            let mut resolver = Resolver::with_names(&self.store.files, names);
            resolver.resolve_definition(&fullname, "(added definition)", definition)?;
            Ok(resolver.into_loaded())
        })
    }

    /// Parse and cache a definition given as JSON text
    pub fn add_schema_str(&self, definition: &str) -> Result<AvroSchema> {
        let value: JsonValue = serde_json::from_str(definition)
            .map_err(|e| Error::Parse(format!("invalid schema JSON: {e}")))?;
        self.add_schema(&value)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl SchemaLookup for MutableSchemaStore {
    fn find(&self, name: &str, namespace: Option<&str>) -> Result<AvroSchema> {
        self.store.find(name, namespace)
    }

    fn load_schemas(&self) -> Result<()> {
        self.store.load_schemas()
    }
}

/// Fullname a definition declares for itself
fn declared_fullname(definition: &JsonValue) -> Option<String> {
    let obj = definition.as_object()?;
    let name = obj.get("name")?.as_str()?;
    let namespace = obj.get("namespace").and_then(JsonValue::as_str);
    Some(make_fullname(name, namespace))
}
