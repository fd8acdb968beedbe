//! In-process fake of a Confluent-compatible registry
//!
//! Implements [`Transport`], so a [`ConfluentRegistry`](super::ConfluentRegistry)
//! can talk to it without a socket. Every instance owns its own state; tests
//! running in parallel never share subjects or ids.
//!
//! Ids are assigned per schema context starting at 0, and identical content
//! (compared structurally) gets the same id across subjects.

use super::transport::{HttpRequest, HttpResponse, Method, Transport};
use crate::avro::{AvroSchema, Names};
use crate::cache::normalize_schema;
use crate::error::{error_codes, Result};
use crate::types::{CompatibilityConfig, CompatibilityLevel, SchemaReference};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};

const DEFAULT_CONTEXT: &str = ".";

#[derive(Debug, Default)]
struct ContextState {
    /// Schema text by id
    schemas: Vec<String>,
    /// Subject -> ids, one per version in registration order
    subjects: BTreeMap<String, Vec<u32>>,
}

impl ContextState {
    fn find_schema(&self, schema: &str) -> Option<u32> {
        let key = normalize_schema(schema);
        self.schemas
            .iter()
            .position(|s| normalize_schema(s) == key)
            .map(|i| i as u32)
    }

    fn schema_at(&self, subject: &str, version: u32) -> Option<&str> {
        let ids = self.subjects.get(subject)?;
        let id = ids.get((version as usize).checked_sub(1)?)?;
        self.schemas.get(*id as usize).map(String::as_str)
    }
}

#[derive(Debug)]
struct State {
    contexts: BTreeMap<String, ContextState>,
    configs: HashMap<String, CompatibilityConfig>,
    global_config: CompatibilityConfig,
}

impl Default for State {
    fn default() -> Self {
        Self {
            contexts: BTreeMap::new(),
            configs: HashMap::new(),
            global_config: CompatibilityConfig::new(CompatibilityLevel::Backward),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SchemaBody {
    schema: String,
    #[serde(default)]
    references: Vec<SchemaReference>,
}

/// In-memory registry server for tests
#[derive(Debug, Default)]
pub struct FakeRegistryServer {
    path_prefix: String,
    state: Mutex<State>,
    requests: Mutex<Vec<HttpRequest>>,
}

fn error(status: u16, error_code: u32, message: &str) -> HttpResponse {
    HttpResponse::new(
        status,
        json!({"error_code": error_code, "message": message}).to_string(),
    )
}

fn subject_not_found() -> HttpResponse {
    error(404, error_codes::SUBJECT_NOT_FOUND, "Subject not found")
}

fn version_not_found() -> HttpResponse {
    error(404, error_codes::VERSION_NOT_FOUND, "Version not found")
}

fn schema_not_found() -> HttpResponse {
    error(404, error_codes::SCHEMA_NOT_FOUND, "Schema not found")
}

fn ok(body: serde_json::Value) -> HttpResponse {
    HttpResponse::new(200, body.to_string())
}

/// Split `:.ctx:subject` into (`.ctx`, `subject`)
fn parse_qualified_subject(qualified: &str) -> (String, String) {
    if let Some(rest) = qualified.strip_prefix(':') {
        if let Some((context, subject)) = rest.split_once(':') {
            if context.starts_with('.') {
                return (context.to_string(), subject.to_string());
            }
        }
    }
    (DEFAULT_CONTEXT.to_string(), qualified.to_string())
}

impl FakeRegistryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve every route under `prefix` instead of the root
    pub fn with_path_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_matches('/');
        Self {
            path_prefix: if prefix.is_empty() {
                String::new()
            } else {
                format!("/{prefix}")
            },
            ..Self::default()
        }
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Copy of every request received so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Forget all subjects, schemas, configs and recorded requests
    pub fn clear(&self) {
        *self.state.lock() = State::default();
        self.requests.lock().clear();
    }

    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let Some(path) = request.path.strip_prefix(&self.path_prefix) else {
            return error(404, 404, "HTTP 404 Not Found");
        };
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
        let body = request.body.as_deref().unwrap_or_default();

        match (request.method, segments.as_slice()) {
            (Method::Post, ["subjects", subject, "versions"]) => self.register(subject, body),
            (Method::Get, ["schemas", "ids", id, "versions"]) => {
                self.schema_versions(id, request.query_param("subject"))
            }
            (Method::Get, ["schemas", "ids", id]) => self.schema(id, request.query_param("subject")),
            (Method::Get, ["subjects"]) => self.subjects(request.query_param("subjectPrefix")),
            (Method::Get, ["subjects", subject, "versions"]) => self.versions(subject),
            (Method::Get, ["subjects", subject, "versions", version]) => self.version(subject, version),
            (Method::Post, ["subjects", subject]) => self.check(subject, body),
            (Method::Post, ["compatibility", "subjects", subject, "versions", version]) => {
                self.compatibility(subject, version)
            }
            (Method::Get, ["config"]) => ok(json!(self.state.lock().global_config)),
            (Method::Put, ["config"]) => self.update_config(None, body),
            (Method::Get, ["config", subject]) => {
                let state = self.state.lock();
                let config = state
                    .configs
                    .get(*subject)
                    .copied()
                    .unwrap_or(state.global_config);
                ok(json!(config))
            }
            (Method::Put, ["config", subject]) => self.update_config(Some(*subject), body),
            _ => error(404, 404, "HTTP 404 Not Found"),
        }
    }

    /// Schema text from a request body, parsed against its references
    fn parse_schema(ctx: Option<&ContextState>, body: &str) -> std::result::Result<String, HttpResponse> {
        let invalid = |e: &dyn std::fmt::Display| {
            error(422, error_codes::INVALID_SCHEMA, &format!("Invalid schema: {e}"))
        };
        let parsed: SchemaBody = serde_json::from_str(body).map_err(|e| invalid(&e))?;
        let definition: JsonValue = serde_json::from_str(&parsed.schema).map_err(|e| invalid(&e))?;

        let mut names = Names::new();
        for reference in &parsed.references {
            let referenced = ctx
                .and_then(|c| c.schema_at(&reference.subject, reference.version))
                .ok_or_else(|| invalid(&format!("unknown reference {}", reference.name)))?;
            let referenced: JsonValue = serde_json::from_str(referenced).map_err(|e| invalid(&e))?;
            names.absorb(&referenced);
        }
        AvroSchema::parse_with_names(&definition, &names).map_err(|e| invalid(&e))?;
        Ok(parsed.schema)
    }

    fn register(&self, qualified: &str, body: &str) -> HttpResponse {
        let (context, subject) = parse_qualified_subject(qualified);
        let mut state = self.state.lock();
        let ctx = state.contexts.entry(context).or_default();
        let schema = match Self::parse_schema(Some(&*ctx), body) {
            Ok(schema) => schema,
            Err(response) => return response,
        };
        let id = match ctx.find_schema(&schema) {
            Some(id) => id,
            None => {
                ctx.schemas.push(schema);
                (ctx.schemas.len() - 1) as u32
            }
        };
        let versions = ctx.subjects.entry(subject).or_default();
        if !versions.contains(&id) {
            versions.push(id);
        }
        ok(json!({ "id": id }))
    }

    fn context<'a>(state: &'a State, qualified: Option<&str>) -> Option<&'a ContextState> {
        let (context, _) = parse_qualified_subject(qualified.unwrap_or_default());
        state.contexts.get(&context)
    }

    fn schema(&self, id: &str, subject: Option<&str>) -> HttpResponse {
        let state = self.state.lock();
        let schema = id
            .parse::<usize>()
            .ok()
            .and_then(|id| Self::context(&state, subject)?.schemas.get(id));
        match schema {
            Some(schema) => ok(json!({ "schema": schema })),
            None => schema_not_found(),
        }
    }

    fn schema_versions(&self, id: &str, subject: Option<&str>) -> HttpResponse {
        let state = self.state.lock();
        let Some(ctx) = Self::context(&state, subject) else {
            return schema_not_found();
        };
        let Some(id) = id.parse::<u32>().ok().filter(|id| (*id as usize) < ctx.schemas.len()) else {
            return schema_not_found();
        };
        let pairs: Vec<_> = ctx
            .subjects
            .iter()
            .filter_map(|(subject, ids)| {
                ids.iter()
                    .position(|i| *i == id)
                    .map(|pos| json!({"subject": subject, "version": pos + 1}))
            })
            .collect();
        ok(json!(pairs))
    }

    fn subjects(&self, prefix: Option<&str>) -> HttpResponse {
        let state = self.state.lock();
        let names: Vec<String> = state
            .contexts
            .iter()
            .flat_map(|(context, ctx)| {
                ctx.subjects.keys().map(move |subject| {
                    if context == DEFAULT_CONTEXT {
                        subject.clone()
                    } else {
                        format!(":{context}:{subject}")
                    }
                })
            })
            .filter(|name| prefix.is_none_or(|p| name.starts_with(p)))
            .collect();
        ok(json!(names))
    }

    fn versions(&self, qualified: &str) -> HttpResponse {
        let (context, subject) = parse_qualified_subject(qualified);
        let state = self.state.lock();
        match state.contexts.get(&context).and_then(|c| c.subjects.get(&subject)) {
            Some(ids) if !ids.is_empty() => ok(json!((1..=ids.len()).collect::<Vec<_>>())),
            _ => subject_not_found(),
        }
    }

    fn version(&self, qualified: &str, version: &str) -> HttpResponse {
        let (context, subject) = parse_qualified_subject(qualified);
        let state = self.state.lock();
        let Some(ctx) = state.contexts.get(&context) else {
            return subject_not_found();
        };
        let Some(ids) = ctx.subjects.get(&subject).filter(|ids| !ids.is_empty()) else {
            return subject_not_found();
        };

        let index = if version == "latest" {
            Some(ids.len() - 1)
        } else {
            version
                .parse::<usize>()
                .ok()
                .filter(|v| *v >= 1 && *v <= ids.len())
                .map(|v| v - 1)
        };
        let Some(index) = index else {
            return version_not_found();
        };

        let id = ids[index];
        ok(json!({
            "name": qualified,
            "version": index + 1,
            "id": id,
            "schema": ctx.schemas[id as usize],
        }))
    }

    fn check(&self, qualified: &str, body: &str) -> HttpResponse {
        let (context, subject) = parse_qualified_subject(qualified);
        let state = self.state.lock();
        let Some(ctx) = state.contexts.get(&context) else {
            return subject_not_found();
        };
        let schema = match Self::parse_schema(Some(ctx), body) {
            Ok(schema) => schema,
            Err(response) => return response,
        };
        let Some(ids) = ctx.subjects.get(&subject) else {
            return subject_not_found();
        };
        let found = ctx
            .find_schema(&schema)
            .and_then(|id| ids.iter().position(|i| *i == id).map(|pos| (id, pos)));
        match found {
            Some((id, pos)) => ok(json!({
                "subject": qualified,
                "id": id,
                "version": pos + 1,
                "schema": ctx.schemas[id as usize],
            })),
            None => schema_not_found(),
        }
    }

    fn compatibility(&self, qualified: &str, version: &str) -> HttpResponse {
        let (context, subject) = parse_qualified_subject(qualified);
        let state = self.state.lock();
        let Some(ids) = state.contexts.get(&context).and_then(|c| c.subjects.get(&subject)) else {
            return subject_not_found();
        };
        let exists = version == "latest"
            || version
                .parse::<usize>()
                .is_ok_and(|v| v >= 1 && v <= ids.len());
        if exists {
            ok(json!({ "is_compatible": true }))
        } else {
            version_not_found()
        }
    }

    fn update_config(&self, subject: Option<&str>, body: &str) -> HttpResponse {
        let config: CompatibilityConfig = match serde_json::from_str(body) {
            Ok(config) => config,
            Err(e) => {
                return error(
                    422,
                    error_codes::INVALID_COMPATIBILITY_LEVEL,
                    &format!("Invalid compatibility level: {e}"),
                )
            }
        };
        let mut state = self.state.lock();
        match subject {
            Some(subject) => {
                state.configs.insert(subject.to_string(), config);
            }
            None => state.global_config = config,
        }
        ok(json!(config))
    }
}

impl Transport for FakeRegistryServer {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().push(request.clone());
        Ok(self.handle(request))
    }
}
