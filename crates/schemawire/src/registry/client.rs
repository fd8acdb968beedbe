//! Confluent-compatible schema registry client
//!
//! One HTTP call per operation, no state besides connection settings. Caching
//! lives in [`CachedRegistry`](super::CachedRegistry).

use super::config::RegistryClientConfig;
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use super::SchemaRegistry;
use crate::error::{Error, Result};
use crate::types::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Request body for registering or looking up a schema
#[derive(Debug, Serialize)]
struct SchemaRequest<'a> {
    schema: &'a str,
    #[serde(skip_serializing_if = "no_references")]
    references: &'a [SchemaReference],
}

fn no_references(references: &&[SchemaReference]) -> bool {
    references.is_empty()
}

#[derive(Debug, Deserialize)]
struct RegisterSchemaResponse {
    id: u32,
}

#[derive(Debug, Deserialize)]
struct GetSchemaResponse {
    schema: String,
}

#[derive(Debug, Deserialize)]
struct CompatibilityCheckResponse {
    #[serde(default)]
    is_compatible: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error_code: Option<u32>,
    message: Option<String>,
}

/// Confluent-compatible registry client
pub struct ConfluentRegistry {
    transport: Arc<dyn Transport>,
    path_prefix: String,
    context: Option<String>,
}

impl std::fmt::Debug for ConfluentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfluentRegistry")
            .field("path_prefix", &self.path_prefix)
            .field("context", &self.context)
            .finish()
    }
}

impl ConfluentRegistry {
    /// Connect over HTTP using `config`
    pub fn new(config: &RegistryClientConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config)?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Use an explicit transport; only the path prefix and context of `config` apply
    pub fn with_transport(transport: Arc<dyn Transport>, config: &RegistryClientConfig) -> Self {
        Self {
            transport,
            path_prefix: config.normalized_path_prefix(),
            context: config
                .schema_context
                .as_deref()
                .map(|c| c.trim_start_matches('.').to_string())
                .filter(|c| !c.is_empty()),
        }
    }

    fn context_marker(&self) -> Option<String> {
        self.context.as_ref().map(|ctx| format!(":.{ctx}:"))
    }

    /// Subject as sent on the wire
    fn qualify(&self, subject: &str) -> String {
        match self.context_marker() {
            Some(marker) if !subject.starts_with(":.") => format!("{marker}{subject}"),
            _ => subject.to_string(),
        }
    }

    /// Subject as shown to callers
    fn unqualify(&self, subject: String) -> String {
        match self.context_marker() {
            Some(marker) => match subject.strip_prefix(&marker) {
                Some(rest) => rest.to_string(),
                None => subject,
            },
            None => subject,
        }
    }

    fn path(&self, path: &str) -> String {
        format!("{}{}", self.path_prefix, path)
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.transport.send(&request)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(parse_error(response))
        }
    }

    fn get<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let response = self.send(request)?;
        Ok(serde_json::from_str(&response.body)?)
    }

    fn schema_body(schema: &str) -> Result<String> {
        Ok(serde_json::to_string(&SchemaRequest {
            schema,
            references: &[],
        })?)
    }

    /// Register `schema` with references to other registered schemas
    pub fn register_with_references(
        &self,
        subject: &str,
        schema: &str,
        references: &[SchemaReference],
    ) -> Result<SchemaId> {
        let path = self.path(&format!("/subjects/{}/versions", self.qualify(subject)));
        let body = serde_json::to_string(&SchemaRequest { schema, references })?;
        let result: RegisterSchemaResponse = self.get(HttpRequest::post(path, body))?;
        let id = SchemaId::new(result.id);

        tracing::info!(subject = %subject, schema_id = %id, "Registered schema for subject `{}`; id = {}", subject, id);

        Ok(id)
    }
}

fn parse_error(response: HttpResponse) -> Error {
    let (error_code, message) = match serde_json::from_str::<ErrorResponse>(&response.body) {
        Ok(err) => (
            err.error_code,
            err.message.unwrap_or_else(|| response.body.clone()),
        ),
        Err(_) => (None, response.body.clone()),
    };

    if response.status == 404 {
        Error::NotFound { error_code, message }
    } else {
        Error::Registry {
            status: response.status,
            error_code,
            message,
        }
    }
}

impl SchemaRegistry for ConfluentRegistry {
    fn fetch(&self, id: SchemaId) -> Result<String> {
        tracing::info!(schema_id = %id, "Fetching schema with id {}", id);
        let mut request = HttpRequest::get(self.path(&format!("/schemas/ids/{}", id)));
        if let Some(marker) = self.context_marker() {
            request = request.with_query("subject", marker);
        }
        let result: GetSchemaResponse = self.get(request)?;
        Ok(result.schema)
    }

    fn fetch_subject_versions(&self, id: SchemaId) -> Result<Vec<SubjectVersionRef>> {
        tracing::info!(schema_id = %id, "Fetching subject-version pairs for schema with id {}", id);
        let mut request = HttpRequest::get(self.path(&format!("/schemas/ids/{}/versions", id)));
        if let Some(marker) = self.context_marker() {
            request = request.with_query("subject", marker);
        }
        let pairs: Vec<SubjectVersionRef> = self.get(request)?;
        Ok(pairs
            .into_iter()
            .map(|p| SubjectVersionRef {
                subject: self.unqualify(p.subject),
                version: p.version,
            })
            .collect())
    }

    fn register(&self, subject: &str, schema: &str) -> Result<SchemaId> {
        self.register_with_references(subject, schema, &[])
    }

    fn subjects(&self) -> Result<Vec<String>> {
        let mut request = HttpRequest::get(self.path("/subjects"));
        let marker = self.context_marker();
        if let Some(marker) = &marker {
            request = request.with_query("subjectPrefix", marker.clone());
        }
        let subjects: Vec<String> = self.get(request)?;
        Ok(subjects
            .into_iter()
            .filter(|s| match &marker {
                Some(m) => s.starts_with(m.as_str()),
                None => true,
            })
            .map(|s| self.unqualify(s))
            .collect())
    }

    fn subject_versions(&self, subject: &str) -> Result<Vec<u32>> {
        let path = self.path(&format!("/subjects/{}/versions", self.qualify(subject)));
        self.get(HttpRequest::get(path))
    }

    fn subject_version(&self, subject: &str, version: SchemaVersion) -> Result<SubjectVersion> {
        let path = self.path(&format!(
            "/subjects/{}/versions/{}",
            self.qualify(subject),
            version
        ));
        let mut record: SubjectVersion = self.get(HttpRequest::get(path))?;
        record.subject = self.unqualify(record.subject);
        Ok(record)
    }

    fn check(&self, subject: &str, schema: &str) -> Result<Option<SubjectVersion>> {
        let path = self.path(&format!("/subjects/{}", self.qualify(subject)));
        match self.get::<SubjectVersion>(HttpRequest::post(path, Self::schema_body(schema)?)) {
            Ok(mut record) => {
                record.subject = self.unqualify(record.subject);
                Ok(Some(record))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn compatible(&self, subject: &str, schema: &str, version: SchemaVersion) -> Result<Option<bool>> {
        let path = self.path(&format!(
            "/compatibility/subjects/{}/versions/{}",
            self.qualify(subject),
            version
        ));
        match self.get::<CompatibilityCheckResponse>(HttpRequest::post(path, Self::schema_body(schema)?)) {
            Ok(result) => Ok(Some(result.is_compatible)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn global_config(&self) -> Result<CompatibilityConfig> {
        self.get(HttpRequest::get(self.path("/config")))
    }

    fn update_global_config(&self, config: CompatibilityConfig) -> Result<CompatibilityConfig> {
        let body = serde_json::to_string(&config)?;
        self.get(HttpRequest::put(self.path("/config"), body))
    }

    fn subject_config(&self, subject: &str) -> Result<CompatibilityConfig> {
        let path = self.path(&format!("/config/{}", self.qualify(subject)));
        self.get(HttpRequest::get(path))
    }

    fn update_subject_config(&self, subject: &str, config: CompatibilityConfig) -> Result<CompatibilityConfig> {
        let path = self.path(&format!("/config/{}", self.qualify(subject)));
        let body = serde_json::to_string(&config)?;
        self.get(HttpRequest::put(path, body))
    }
}
