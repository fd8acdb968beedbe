//! Schema registry access
//!
//! [`SchemaRegistry`] is the full operation set of a Confluent-compatible
//! registry. [`ConfluentRegistry`] implements it over HTTP, [`CachedRegistry`]
//! implements it on top of another registry plus a
//! [`RegistryCache`](crate::cache::RegistryCache), and [`FakeRegistryServer`]
//! is an in-process server for tests.

mod cached;
mod client;
mod config;
mod fake;
mod transport;

pub use cached::CachedRegistry;
pub use client::ConfluentRegistry;
pub use config::RegistryClientConfig;
pub use fake::FakeRegistryServer;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, CONTENT_TYPE_V1};

use crate::error::Result;
use crate::types::{
    CompatibilityConfig, SchemaId, SchemaVersion, SubjectVersion, SubjectVersionRef,
};
use std::sync::Arc;

/// Operations of a Confluent-compatible schema registry
pub trait SchemaRegistry: Send + Sync {
    /// Schema text registered under `id`
    fn fetch(&self, id: SchemaId) -> Result<String>;

    /// Every `(subject, version)` that points at `id`
    fn fetch_subject_versions(&self, id: SchemaId) -> Result<Vec<SubjectVersionRef>>;

    /// Register `schema` under `subject`; the same content yields the same id
    fn register(&self, subject: &str, schema: &str) -> Result<SchemaId>;

    fn subjects(&self) -> Result<Vec<String>>;

    fn subject_versions(&self, subject: &str) -> Result<Vec<u32>>;

    fn subject_version(&self, subject: &str, version: SchemaVersion) -> Result<SubjectVersion>;

    /// The registered record for `schema` under `subject`, `None` if never registered
    fn check(&self, subject: &str, schema: &str) -> Result<Option<SubjectVersion>>;

    /// Whether `schema` is compatible with `version`, `None` if subject or version is absent
    fn compatible(&self, subject: &str, schema: &str, version: SchemaVersion) -> Result<Option<bool>>;

    fn global_config(&self) -> Result<CompatibilityConfig>;

    fn update_global_config(&self, config: CompatibilityConfig) -> Result<CompatibilityConfig>;

    fn subject_config(&self, subject: &str) -> Result<CompatibilityConfig>;

    fn update_subject_config(&self, subject: &str, config: CompatibilityConfig) -> Result<CompatibilityConfig>;
}

impl<T: SchemaRegistry + ?Sized> SchemaRegistry for Arc<T> {
    fn fetch(&self, id: SchemaId) -> Result<String> {
        (**self).fetch(id)
    }

    fn fetch_subject_versions(&self, id: SchemaId) -> Result<Vec<SubjectVersionRef>> {
        (**self).fetch_subject_versions(id)
    }

    fn register(&self, subject: &str, schema: &str) -> Result<SchemaId> {
        (**self).register(subject, schema)
    }

    fn subjects(&self) -> Result<Vec<String>> {
        (**self).subjects()
    }

    fn subject_versions(&self, subject: &str) -> Result<Vec<u32>> {
        (**self).subject_versions(subject)
    }

    fn subject_version(&self, subject: &str, version: SchemaVersion) -> Result<SubjectVersion> {
        (**self).subject_version(subject, version)
    }

    fn check(&self, subject: &str, schema: &str) -> Result<Option<SubjectVersion>> {
        (**self).check(subject, schema)
    }

    fn compatible(&self, subject: &str, schema: &str, version: SchemaVersion) -> Result<Option<bool>> {
        (**self).compatible(subject, schema, version)
    }

    fn global_config(&self) -> Result<CompatibilityConfig> {
        (**self).global_config()
    }

    fn update_global_config(&self, config: CompatibilityConfig) -> Result<CompatibilityConfig> {
        (**self).update_global_config(config)
    }

    fn subject_config(&self, subject: &str) -> Result<CompatibilityConfig> {
        (**self).subject_config(subject)
    }

    fn update_subject_config(&self, subject: &str, config: CompatibilityConfig) -> Result<CompatibilityConfig> {
        (**self).update_subject_config(subject, config)
    }
}
