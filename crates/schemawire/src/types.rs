//! Registry data types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Registry-assigned schema identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaId(pub u32);

impl SchemaId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SchemaId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Version number for a schema within a subject
///
/// `SchemaVersion::Latest` selects whatever version is newest at request
/// time and is never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SchemaVersion {
    #[default]
    Latest,
    Number(u32),
}

impl SchemaVersion {
    pub fn new(version: u32) -> Self {
        Self::Number(version)
    }

    pub fn latest() -> Self {
        Self::Latest
    }

    pub fn is_latest(&self) -> bool {
        matches!(self, Self::Latest)
    }

    /// Concrete version number, `None` for `Latest`
    pub fn number(&self) -> Option<u32> {
        match self {
            Self::Latest => None,
            Self::Number(v) => Some(*v),
        }
    }
}

impl From<u32> for SchemaVersion {
    fn from(version: u32) -> Self {
        Self::Number(version)
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Latest => write!(f, "latest"),
            Self::Number(v) => write!(f, "{v}"),
        }
    }
}

impl std::str::FromStr for SchemaVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s == "latest" {
            return Ok(Self::Latest);
        }
        match s.parse::<u32>() {
            Ok(v) if v > 0 => Ok(Self::Number(v)),
            _ => Err(Error::InvalidArgument(format!("invalid version: {s}"))),
        }
    }
}

/// Schema format as reported by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    #[default]
    #[serde(alias = "avro")]
    Avro,
    #[serde(alias = "json")]
    Json,
    #[serde(alias = "protobuf")]
    Protobuf,
}

impl std::fmt::Display for SchemaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaType::Avro => write!(f, "AVRO"),
            SchemaType::Json => write!(f, "JSON"),
            SchemaType::Protobuf => write!(f, "PROTOBUF"),
        }
    }
}

/// Reference from one registered schema to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReference {
    pub name: String,
    pub subject: String,
    pub version: u32,
}

/// A specific version of a schema registered under a subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectVersion {
    /// Subject name (some registries answer with `name`)
    #[serde(alias = "name")]
    pub subject: String,
    pub version: u32,
    pub id: SchemaId,
    pub schema: String,
    #[serde(rename = "schemaType", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<SchemaReference>,
}

impl SubjectVersion {
    /// Effective schema type; the registry omits it for Avro
    pub fn schema_type(&self) -> SchemaType {
        self.schema_type.unwrap_or_default()
    }
}

/// A `(subject, version)` pair pointing at a schema id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectVersionRef {
    pub subject: String,
    pub version: u32,
}

/// Compatibility level for schema evolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    None,
    #[default]
    Backward,
    BackwardTransitive,
    Forward,
    ForwardTransitive,
    Full,
    FullTransitive,
}

impl std::fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompatibilityLevel::None => write!(f, "NONE"),
            CompatibilityLevel::Backward => write!(f, "BACKWARD"),
            CompatibilityLevel::BackwardTransitive => write!(f, "BACKWARD_TRANSITIVE"),
            CompatibilityLevel::Forward => write!(f, "FORWARD"),
            CompatibilityLevel::ForwardTransitive => write!(f, "FORWARD_TRANSITIVE"),
            CompatibilityLevel::Full => write!(f, "FULL"),
            CompatibilityLevel::FullTransitive => write!(f, "FULL_TRANSITIVE"),
        }
    }
}

/// Global or per-subject registry configuration
///
/// Registries answer reads with `compatibilityLevel` and accept writes as
/// `compatibility`; both spellings deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompatibilityConfig {
    #[serde(alias = "compatibilityLevel")]
    pub compatibility: CompatibilityLevel,
}

impl CompatibilityConfig {
    pub fn new(compatibility: CompatibilityLevel) -> Self {
        Self { compatibility }
    }
}
