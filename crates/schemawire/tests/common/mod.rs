//! Shared helpers for integration tests

#![allow(dead_code)]

use schemawire::{CachedRegistry, ConfluentRegistry, FakeRegistryServer, RegistryClientConfig};
use std::path::Path;
use parking_lot::Mutex;
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// In-memory sink for formatted `tracing` output
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a thread-local subscriber and return what it logged
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, logs.contents())
}

/// Fake server plus an uncached client talking to it
pub fn fake_registry() -> (Arc<FakeRegistryServer>, ConfluentRegistry) {
    fake_registry_with(FakeRegistryServer::new(), &RegistryClientConfig::default())
}

pub fn fake_registry_with(
    server: FakeRegistryServer,
    config: &RegistryClientConfig,
) -> (Arc<FakeRegistryServer>, ConfluentRegistry) {
    init_tracing();
    let server = Arc::new(server);
    let client = ConfluentRegistry::with_transport(server.clone(), config);
    (server, client)
}

/// Fake server plus a memory-cached client talking to it
pub fn cached_fake_registry() -> (Arc<FakeRegistryServer>, CachedRegistry) {
    let (server, client) = fake_registry();
    (server, CachedRegistry::new(Arc::new(client)))
}

/// Write a schema file below `root`, creating directories as needed
pub fn write_schema(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

pub const PERSON_SCHEMA: &str =
    r#"{"type":"record","name":"person","fields":[{"name":"full_name","type":"string"}]}"#;
