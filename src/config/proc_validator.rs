//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Checks request url/method, response field names, retry delays,
//!   logging level, metrics/server pairing and sink path

use http::Method;
use tracing::error;

use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::config::sources::{Expiration, GenericSourceValue, ServiceConfig, SourceConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_source(&cfg.source, &mut errors);

    if let Some(sink) = &cfg.sink {
        if sink.path.trim().is_empty() {
            errors.push("sink.path must not be empty".to_string());
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        for e in &errors {
            error!("config validation: {}", e);
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &settings.retry {
        validate_retry(retry, errors);
    }

    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }

    if settings.metrics.is_enabled {
        if !settings.metrics.path.starts_with('/') {
            errors.push(format!("settings.metrics.path '{}' must start with '/'", settings.metrics.path));
        }
        if settings.server.is_none() {
            errors.push("settings.metrics.is_enabled requires settings.server".to_string());
        }
    }

    if let Some(server) = &settings.server {
        if server.host.trim().is_empty() {
            errors.push("settings.server.host must not be empty".to_string());
        }
        if server.port.parse::<u16>().is_err() {
            errors.push(format!("settings.server.port '{}' is not a valid port", server.port));
        }
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "settings.retry.max_delay_ms ({}) must be >= base_delay_ms ({})",
                max, base
            ));
        }
    }
}

fn validate_source(source: &SourceConfig, errors: &mut Vec<String>) {
    let request = &source.request;
    if !(request.url.starts_with("http://") || request.url.starts_with("https://")) {
        errors.push(format!("source.request.url '{}' must be an http(s) url", request.url));
    }
    if request.method != Method::GET && request.method != Method::POST {
        errors.push(format!("source.request.method '{}' must be GET or POST", request.method));
    }
    if request.method == Method::GET && request.body.is_some() {
        errors.push("source.request.body is not allowed with GET".to_string());
    }
    if request.timeout_ms == Some(0) {
        errors.push("source.request.timeout_ms must be > 0".to_string());
    }

    let values = request
        .headers
        .iter()
        .chain(request.body.iter())
        .flat_map(|map| map.iter());
    for (key, value) in values {
        let empty = match value {
            GenericSourceValue::Literal { .. } => false,
            GenericSourceValue::FromEnv { from_env } => from_env.trim().is_empty(),
            GenericSourceValue::FromFile { path } => path.trim().is_empty(),
        };
        if empty {
            errors.push(format!("source.request value '{}' has an empty reference", key));
        }
    }

    if source.response.token_field.trim().is_empty() {
        errors.push("source.response.token_field must not be empty".to_string());
    }
    let expiration_field = match &source.response.expiration {
        Expiration::ExpiresIn { field } | Expiration::ExpiresAt { field } => field,
    };
    if expiration_field.trim().is_empty() {
        errors.push("source.response.expiration.field must not be empty".to_string());
    }
}
