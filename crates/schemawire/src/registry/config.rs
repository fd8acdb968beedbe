//! Registry client configuration

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Connection settings for a Confluent-compatible schema registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryClientConfig {
    /// Registry base URL
    pub url: String,

    /// Prepended to every request path (registries mounted under a sub-path)
    #[serde(default)]
    pub path_prefix: Option<String>,

    /// Schema context; subjects are sent as `:.{context}:{subject}`
    #[serde(default)]
    pub schema_context: Option<String>,

    /// Basic auth username
    #[serde(default)]
    pub username: Option<String>,

    /// Basic auth password
    #[serde(default)]
    pub password: Option<String>,

    /// PEM client certificate for mutual TLS
    #[serde(default)]
    pub client_cert: Option<String>,

    /// PEM private key matching `client_cert`
    #[serde(default)]
    pub client_key: Option<String>,

    /// PEM intermediate certificates sent after `client_cert`
    #[serde(default)]
    pub client_chain: Option<String>,

    /// PEM CA certificate trusted in addition to the system roots
    #[serde(default)]
    pub ca_cert: Option<String>,

    /// HTTP(S) proxy URL
    #[serde(default)]
    pub proxy: Option<String>,

    /// TCP connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Whole-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_timeout() -> u64 {
    30
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8081".to_string(),
            path_prefix: None,
            schema_context: None,
            username: None,
            password: None,
            client_cert: None,
            client_key: None,
            client_chain: None,
            ca_cert: None,
            proxy: None,
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
        }
    }
}

impl RegistryClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    pub fn with_schema_context(mut self, context: impl Into<String>) -> Self {
        self.schema_context = Some(context.into());
        self
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Client certificate and key given as PEM data
    pub fn with_client_cert(mut self, cert: impl Into<String>, key: impl Into<String>) -> Self {
        self.client_cert = Some(cert.into());
        self.client_key = Some(key.into());
        self
    }

    /// Client certificate, key and optional chain read from PEM files
    pub fn with_client_cert_files(
        mut self,
        cert: impl AsRef<Path>,
        key: impl AsRef<Path>,
        chain: Option<&Path>,
    ) -> Result<Self> {
        self.client_cert = Some(read_pem(cert.as_ref())?);
        self.client_key = Some(read_pem(key.as_ref())?);
        self.client_chain = chain.map(read_pem).transpose()?;
        Ok(self)
    }

    pub fn with_client_chain(mut self, chain: impl Into<String>) -> Self {
        self.client_chain = Some(chain.into());
        self
    }

    pub fn with_ca_cert(mut self, ca: impl Into<String>) -> Self {
        self.ca_cert = Some(ca.into());
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs();
        self
    }

    /// Base URL with any trailing slash removed
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Path prefix normalized to `/prefix` (empty when unset)
    pub fn normalized_path_prefix(&self) -> String {
        match self.path_prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(p) if !p.is_empty() => format!("/{p}"),
            _ => String::new(),
        }
    }

    /// Check that credential pairs are complete
    pub fn validate(&self) -> Result<()> {
        if self.username.is_some() != self.password.is_some() {
            return Err(Error::Config(
                "basic auth requires both username and password".to_string(),
            ));
        }
        if self.client_cert.is_some() != self.client_key.is_some() {
            return Err(Error::Config(
                "mutual TLS requires both client_cert and client_key".to_string(),
            ));
        }
        if self.client_chain.is_some() && self.client_cert.is_none() {
            return Err(Error::Config(
                "client_chain given without client_cert".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_pem(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))
}
