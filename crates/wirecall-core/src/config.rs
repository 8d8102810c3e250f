//! Centralized configuration for wirecall.
//!
//! Compile-time defaults live on [`NetworkConfig`]; per-client settings are
//! carried by [`ClientConfig`], which can be loaded from a JSON file.

use crate::error::{Result, WirecallError};
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Network-related defaults.
pub struct NetworkConfig;

impl NetworkConfig {
    /// Path segment placed between the API base and the effective hash.
    pub const DEFAULT_PREFIX: &'static str = "rpc";
    /// Query parameter carrying the serialized params of GET calls.
    pub const PAYLOAD_QUERY_KEY: &'static str = "payload";
    /// Suffix appended to the function name in the request path.
    pub const PATH_SUFFIX: &'static str = ".json";
    pub const USER_AGENT: &'static str = "wirecall/0.1";
    pub const MAX_REDIRECTS: usize = 10;
}

/// Runtime configuration for an [`Invoker`](crate::Invoker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// API base URL. Empty means the path is used as-is.
    pub api: String,
    /// Path prefix between `api` and the effective hash.
    pub prefix: String,
    /// Headers sent verbatim with every request.
    pub headers: BTreeMap<String, String>,
    /// Splice per-function version tags into request paths.
    pub hot_reload: bool,
    /// Opt-in request timeout in milliseconds. Unset means calls never time out.
    pub request_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: String::new(),
            prefix: NetworkConfig::DEFAULT_PREFIX.to_string(),
            headers: BTreeMap::new(),
            hot_reload: false,
            request_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Create a config pointing at the given API base.
    pub fn new(api: impl Into<String>) -> Self {
        Self {
            api: api.into(),
            ..Self::default()
        }
    }

    /// Load a config from a JSON file and validate it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| WirecallError::io_with_path(e, path))?;
        let config: ClientConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the path prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Add a header sent with every request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Enable or disable hot-reload version tags.
    pub fn with_hot_reload(mut self, enable: bool) -> Self {
        self.hot_reload = enable;
        self
    }

    /// Set an explicit request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    /// The configured request timeout, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    /// Check the API base and headers.
    pub fn validate(&self) -> Result<()> {
        if !self.api.is_empty() {
            let parsed = url::Url::parse(&self.api).map_err(|e| WirecallError::Config {
                message: format!("api {:?} is not an absolute URL: {}", self.api, e),
            })?;
            if parsed.query().is_some() || parsed.fragment().is_some() {
                return Err(WirecallError::Config {
                    message: format!("api {:?} must not carry a query or fragment", self.api),
                });
            }
        }

        if self.prefix.contains('?') || self.prefix.contains('#') {
            return Err(WirecallError::Config {
                message: format!("prefix {:?} contains a reserved character", self.prefix),
            });
        }

        for (name, value) in &self.headers {
            validate_header(name, value)?;
        }

        Ok(())
    }
}

/// Validate a single header pair.
pub fn validate_header(name: &str, value: &str) -> Result<()> {
    HeaderName::from_bytes(name.as_bytes()).map_err(|e| WirecallError::InvalidHeader {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    HeaderValue::from_str(value).map_err(|e| WirecallError::InvalidHeader {
        name: name.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}
