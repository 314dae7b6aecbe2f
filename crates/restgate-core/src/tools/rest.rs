//! Tools backed by a single REST call

use anyhow::{bail, Context as _};
use async_trait::async_trait;
use reqwest::Method;
use rmcp::model::{CallToolResult, Content};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{JsonObject, ToolContext, ToolFactory, ToolHandler, ToolManifest};
use crate::backend::{BackendBody, BackendRequest};
use crate::config::GatewayConfig;

/// `request` block of a `rest` manifest
#[derive(Debug, Clone, Deserialize)]
struct RequestTemplate {
    #[serde(default = "default_method")]
    method: String,
    /// Path relative to the backend base URL with `{param}` placeholders
    path: String,
    /// Input properties copied to the query string
    #[serde(default)]
    query: Vec<String>,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Factory for the `rest` tool kind
#[derive(Debug, Clone, Copy, Default)]
pub struct RestToolFactory;

impl ToolFactory for RestToolFactory {
    fn create(
        &self,
        manifest: &ToolManifest,
        _config: &GatewayConfig,
    ) -> anyhow::Result<Arc<dyn ToolHandler>> {
        let raw = manifest
            .settings
            .get("request")
            .cloned()
            .context("rest tool requires a `request` block")?;
        let template: RequestTemplate =
            serde_json::from_value(raw).context("invalid `request` block")?;
        Ok(Arc::new(RestTool::from_template(
            template,
            manifest.output_schema.is_some(),
        )?))
    }
}

/// Maps tool input onto one backend request
#[derive(Debug, Clone)]
pub struct RestTool {
    method: Method,
    path: String,
    query: Vec<String>,
    headers: Vec<(String, String)>,
    structured_output: bool,
}

impl RestTool {
    fn from_template(template: RequestTemplate, structured_output: bool) -> anyhow::Result<Self> {
        let method = Method::from_bytes(template.method.to_ascii_uppercase().as_bytes())
            .with_context(|| format!("invalid HTTP method '{}'", template.method))?;
        placeholders(&template.path)?;
        Ok(Self {
            method,
            path: template.path,
            query: template.query,
            headers: template.headers.into_iter().collect(),
            structured_output,
        })
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Build the backend request, consuming placeholder and query properties
    fn build_request(&self, mut input: JsonObject) -> anyhow::Result<BackendRequest> {
        let mut path = String::with_capacity(self.path.len());
        let mut rest = self.path.as_str();
        while let Some(start) = rest.find('{') {
            path.push_str(&rest[..start]);
            let end = rest[start..]
                .find('}')
                .map(|i| start + i)
                .context("unterminated path placeholder")?;
            let name = &rest[start + 1..end];
            let value = input
                .remove(name)
                .with_context(|| format!("missing path parameter '{}'", name))?;
            let segment = value_to_string(&value);
            // Would address a different backend resource once normalised
            if matches!(segment.as_str(), "" | "." | "..") {
                bail!("path parameter '{}' must not be empty, '.' or '..'", name);
            }
            path.push_str(&urlencoding::encode(&segment));
            rest = &rest[end + 1..];
        }
        path.push_str(rest);

        let mut request = BackendRequest::new(self.method.clone(), path);
        request.headers = self.headers.clone();

        for name in &self.query {
            if let Some(value) = input.remove(name) {
                if !value.is_null() {
                    request.query.push((name.clone(), value_to_string(&value)));
                }
            }
        }

        if !input.is_empty() {
            if sends_body(&self.method) {
                request.body = Some(Value::Object(input));
            } else {
                for (name, value) in input {
                    if !value.is_null() {
                        request.query.push((name, value_to_string(&value)));
                    }
                }
            }
        }

        Ok(request)
    }
}

#[async_trait]
impl ToolHandler for RestTool {
    async fn call(&self, input: JsonObject, ctx: &ToolContext) -> anyhow::Result<CallToolResult> {
        let request = self
            .build_request(input)?
            .with_bearer(ctx.downstream_token().map(String::from));
        let response = ctx.backend.send(request).await?;

        if !response.is_success() {
            let detail = match &response.body {
                BackendBody::Json(v) => v.to_string(),
                BackendBody::Text(t) => t.clone(),
                BackendBody::Empty => String::new(),
            };
            let message = if detail.is_empty() {
                format!("Backend returned {}", response.status)
            } else {
                format!("Backend returned {}: {}", response.status, detail)
            };
            return Ok(CallToolResult::error(vec![Content::text(message)]));
        }

        let result = match response.body {
            BackendBody::Json(value) => {
                let text = serde_json::to_string_pretty(&value)?;
                let mut result = CallToolResult::success(vec![Content::text(text)]);
                if self.structured_output && value.is_object() {
                    result.structured_content = Some(value);
                }
                result
            }
            BackendBody::Text(text) => CallToolResult::success(vec![Content::text(text)]),
            BackendBody::Empty => CallToolResult::success(vec![Content::text(
                response.status.to_string(),
            )]),
        };
        Ok(result)
    }
}

fn sends_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn placeholders(path: &str) -> anyhow::Result<Vec<&str>> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            bail!("unterminated placeholder in path '{}'", path);
        };
        names.push(&rest[start + 1..start + len]);
        rest = &rest[start + len + 1..];
    }
    Ok(names)
}
