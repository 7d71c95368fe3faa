//! HTTP transport seam for the ERP REST API.

use std::time::Duration;

use async_trait::async_trait;
use foreman_core::config::ErpConfig;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One outbound ERP call, transport-agnostic.
#[derive(Clone, Debug)]
pub struct ErpRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ErpRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self { method: Method::Get, path: path.into(), query: Vec::new(), body: None }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self { method: Method::Post, path: path.into(), query: Vec::new(), body: Some(body) }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Raw response before envelope decoding: status, parsed body and the
/// retry-after header if the server sent one.
#[derive(Clone, Debug)]
pub struct ErpResponse {
    pub status: u16,
    pub body: Value,
    pub retry_after: Option<String>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("erp request timed out")]
    Timeout,
    #[error("erp network error: {0}")]
    Network(String),
}

#[async_trait]
pub trait ErpTransport: Send + Sync {
    async fn execute(&self, request: &ErpRequest) -> Result<ErpResponse, TransportError>;
}

/// Production transport: reqwest with token auth and a hard per-call timeout.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth_header: SecretString,
}

impl HttpTransport {
    pub fn new(config: &ErpConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| TransportError::Network(error.to_string()))?;

        let auth_header = format!(
            "token {}:{}",
            config.api_key.expose_secret(),
            config.api_secret.expose_secret()
        );

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header: auth_header.into(),
        })
    }
}

#[async_trait]
impl ErpTransport for HttpTransport {
    async fn execute(&self, request: &ErpRequest) -> Result<ErpResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };

        builder = builder
            .header("Authorization", self.auth_header.expose_secret())
            .header("Content-Type", "application/json")
            .query(&request.query);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|error| {
            if error.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(error.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let text = response.text().await.map_err(|error| {
            if error.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(error.to_string())
            }
        })?;

        // Non-JSON bodies (proxy error pages and the like) still need to flow
        // into envelope decoding with their status attached.
        let body = serde_json::from_str(&text)
            .unwrap_or_else(|_| serde_json::json!({ "error": text }));

        Ok(ErpResponse { status, body, retry_after })
    }
}
