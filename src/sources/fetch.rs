//! HTTP token source
//!
//! Issues one request per `refresh()` and parses the response into a `Token`.

use anyhow::{anyhow, Result};
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use std::env;
use tracing::debug;

use crate::cache::token::Token;
use crate::config::sources::{GenericSourceValue, SourceConfig};
use crate::helpers::time::Clock;
use crate::parser::parser;
use crate::sources::TokenSource;

#[derive(Clone)]
pub struct HttpTokenSource {
    client: Client,
    config: Arc<SourceConfig>,
    clock: Arc<dyn Clock>,
}

impl HttpTokenSource {
    pub fn new(client: Client, config: SourceConfig, clock: Arc<dyn Clock>) -> Self {
        Self { client, config: Arc::new(config), clock }
    }
}

impl TokenSource for HttpTokenSource {
    async fn refresh(&self) -> Result<Token> {
        let req_cfg = &self.config.request;

        let mut request = self.client.request(req_cfg.method.clone(), &req_cfg.url);
        if let Some(timeout_ms) = req_cfg.timeout_ms {
            request = request.timeout(Duration::from_millis(timeout_ms));
        }

        // Build headers dynamically
        if let Some(headers) = &req_cfg.headers {
            for (key, v) in headers {
                let value = prepare_generic_source_value(v).await?;
                request = request.header(key, value)
            }
        }
        // Build body dynamically
        if let Some(source_body) = &req_cfg.body {
            let mut body = HashMap::new();
            for (k, v) in source_body {
                let value = prepare_generic_source_value(v).await?;
                body.insert(k.to_owned(), value);
            }
            request = request.json(&body);
        }

        debug!(url = %req_cfg.url, method = %req_cfg.method, "requesting token");
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("HTTP request failed: {}", response.status()));
        }
        let body = response.text().await?;
        parser::parse_token(&body, &self.config.response, self.clock.now())
    }
}

async fn prepare_generic_source_value(value: &GenericSourceValue) -> Result<String> {
    match value {
        GenericSourceValue::Literal { value } => Ok(value.to_owned()),
        GenericSourceValue::FromEnv { from_env } => {
            env::var(from_env).map_err(|err| anyhow!("env '{}': {}", from_env, err))
        }
        GenericSourceValue::FromFile { path } => tokio::fs::read_to_string(path)
            .await
            .map_err(|err| anyhow!("file '{}': {}", path, err))
            .map(|res| res.trim().to_string()),
    }
}
