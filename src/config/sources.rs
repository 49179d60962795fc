use http::Method;
use serde::Deserialize;
use std::collections::HashMap;
use crate::config::settings::SettingsConfig;

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub source: SourceConfig,
    pub sink: Option<SinkConfig>,
}

/// ================================
/// Source
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub request: RequestConfig,
    #[serde(default)]
    pub response: ResponseConfig,
}

/// HTTP request details
#[derive(Debug, Deserialize, Clone)]
pub struct RequestConfig {
    pub url: String,
    #[serde(with = "http_serde::method", default = "default_method")]
    pub method: Method, // GET, POST
    pub headers: Option<HashMap<String, GenericSourceValue>>,
    pub body: Option<HashMap<String, GenericSourceValue>>,
    /// per-request deadline; the coordinator enforces none of its own
    pub timeout_ms: Option<u64>,
}

/// Header / body value sources
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum GenericSourceValue {
    Literal {
        value: String,
    },
    FromEnv {
        from_env: String,
    },
    FromFile {
        path: String,
    },
}

/// ================================
/// Parsing - token & expiration
/// ================================
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ResponseConfig {
    /// top-level JSON field carrying the bearer value
    #[serde(default = "default_token_field")]
    pub token_field: String,
    #[serde(default = "default_expiration")]
    pub expiration: Expiration,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self { token_field: default_token_field(), expiration: default_expiration() }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expiration {
    /// seconds relative to the moment the response is parsed
    ExpiresIn { field: String },
    /// absolute unix timestamp in seconds
    ExpiresAt { field: String },
}

/// ================================
/// Sink
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SinkConfig {
    /// file the current token value is written to
    pub path: String,
}

fn default_method() -> Method {
    Method::POST
}

fn default_token_field() -> String {
    "access_token".to_string()
}

fn default_expiration() -> Expiration {
    Expiration::ExpiresIn { field: "expires_in".to_string() }
}
