//! Error types for schema resolution, registry access and messaging

use std::path::PathBuf;
use thiserror::Error;

/// Confluent-compatible error codes
pub mod error_codes {
    pub const SUBJECT_NOT_FOUND: u32 = 40401;
    pub const VERSION_NOT_FOUND: u32 = 40402;
    pub const SCHEMA_NOT_FOUND: u32 = 40403;

    pub const INVALID_SCHEMA: u32 = 42201;
    pub const INVALID_VERSION: u32 = 42202;
    pub const INVALID_COMPATIBILITY_LEVEL: u32 = 42203;

    pub const INTERNAL_ERROR: u32 = 50001;
}

/// Errors raised by this crate
#[derive(Debug, Error)]
pub enum Error {
    /// No local file, registry subject/version/id, or registered content matches
    #[error("{0}")]
    SchemaNotFound(String),

    /// A schema's declared name disagrees with where it was loaded from
    #[error("{0}")]
    Schema(String),

    /// The message does not conform to the schema
    #[error("message failed validation:\n{}", .errors.join("\n"))]
    Validation { errors: Vec<String> },

    /// The registry answered 404
    #[error("registry returned not found{}: {message}", fmt_code(.error_code))]
    NotFound {
        error_code: Option<u32>,
        message: String,
    },

    /// The registry answered with an unexpected status
    #[error("registry returned HTTP {status}{}: {message}", fmt_code(.error_code))]
    Registry {
        status: u16,
        error_code: Option<u32>,
        message: String,
    },

    /// A non-empty disk cache file could not be parsed
    #[error("corrupted cache file {}: {source}", .path.display())]
    CacheCorruption {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Input is not a registry-framed message
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The registry returned a schema of a format this crate cannot read
    #[error("The {schema_type} schema for {subject} is incompatible.")]
    IncompatibleSchemaType { subject: String, schema_type: String },

    #[error("schema parse error: {0}")]
    Parse(String),

    #[error("codec error: {0}")]
    Codec(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

fn fmt_code(code: &Option<u32>) -> String {
    code.map(|c| format!(" ({c})")).unwrap_or_default()
}

impl Error {
    /// Whether the registry reported a missing subject, version or schema
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// The Confluent error code carried by a registry error, if any
    pub fn error_code(&self) -> Option<u32> {
        match self {
            Error::NotFound { error_code, .. } | Error::Registry { error_code, .. } => *error_code,
            _ => None,
        }
    }
}

impl From<apache_avro::Error> for Error {
    fn from(e: apache_avro::Error) -> Self {
        Error::Codec(e.to_string())
    }
}

/// Result type for this crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display_includes_code() {
        let err = Error::NotFound {
            error_code: Some(error_codes::SUBJECT_NOT_FOUND),
            message: "Subject not found".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.error_code(), Some(40401));
        assert_eq!(
            err.to_string(),
            "registry returned not found (40401): Subject not found"
        );
    }

    #[test]
    fn test_validation_display_lists_every_error() {
        let err = Error::Validation {
            errors: vec![
                ".a expected type string, got int with value 1".to_string(),
                "extra field 'b' - not in schema".to_string(),
            ],
        };
        let text = err.to_string();
        assert!(text.contains(".a expected type string"));
        assert!(text.contains("extra field 'b'"));
        assert!(!err.is_not_found());
    }
}
