//! HTTP client for the REST backend that tools call.

use anyhow::{Context as _, Result};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// A single call against the backend
#[derive(Debug, Clone)]
pub struct BackendRequest {
    pub method: reqwest::Method,
    /// Path relative to the backend base URL, already percent-encoded
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Credential sent as `Authorization: Bearer`
    pub bearer: Option<String>,
}

impl BackendRequest {
    pub fn new(method: reqwest::Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            bearer: None,
        }
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }
}

/// Backend response, decoded as JSON when possible
#[derive(Debug, Clone)]
pub struct BackendResponse {
    pub status: reqwest::StatusCode,
    pub body: BackendBody,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendBody {
    Json(Value),
    Text(String),
    Empty,
}

impl BackendResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Client for the configured REST backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: Url,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url).context("Invalid backend base URL")?;
        // Url::join replaces the last segment unless the base ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("restgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a request path against the base URL
    pub fn url_for(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .with_context(|| format!("Invalid backend path: {}", path))
    }

    pub async fn send(&self, request: BackendRequest) -> Result<BackendResponse> {
        let url = self.url_for(&request.path)?;
        tracing::debug!(method = %request.method, url = %url, "→ backend");

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header("Accept", "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .context("Failed to send request to backend")?;
        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read backend response body")?;

        let body = if text.trim().is_empty() {
            BackendBody::Empty
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(json) => BackendBody::Json(json),
                Err(_) => BackendBody::Text(text),
            }
        };

        tracing::debug!(status = %status, "← backend");
        Ok(BackendResponse { status, body })
    }
}
