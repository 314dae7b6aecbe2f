//! HTTP request/response logging with trace ids
//!
//! One entry and one exit line per request. For `/mcp` POSTs the JSON-RPC
//! method is pulled from the body and JSON responses are summarised at DEBUG.
//! SSE responses are passed through untouched.

use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use tracing::{debug, warn, Instrument};

use super::MAX_REQUEST_BODY;
use crate::logging::{RequestSpan, TraceContext};
use crate::session::SESSION_ID_HEADER;

/// Headers worth printing at DEBUG; everything else is left out
const LOGGED_HEADERS: &[&str] = &[
    "content-type",
    "accept",
    "user-agent",
    "mcp-session-id",
    "mcp-protocol-version",
];

fn headers_compact(headers: &HeaderMap) -> String {
    headers
        .iter()
        .filter(|(name, _)| LOGGED_HEADERS.contains(&name.as_str()))
        .map(|(name, value)| format!("{}={:?}", name, value))
        .collect::<Vec<_>>()
        .join(" ")
}

/// JSON-RPC method of a single-message body
pub fn extract_mcp_method(bytes: &[u8]) -> Option<String> {
    let json: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    match json {
        serde_json::Value::Array(items) => Some(format!("batch[{}]", items.len())),
        other => other.get("method").and_then(|m| m.as_str()).map(String::from),
    }
}

/// One-line summary of a JSON-RPC response body
fn format_mcp_response(bytes: &[u8]) -> Option<String> {
    let json: serde_json::Value = serde_json::from_slice(bytes).ok()?;

    if let Some(error) = json.get("error") {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown");
        return Some(format!("error: {} ({})", message, code));
    }

    let result = json.get("result")?;
    if let Some(tools) = result.get("tools").and_then(|t| t.as_array()) {
        return Some(format!("tools: {}", tools.len()));
    }
    if let Some(content) = result.get("content").and_then(|c| c.as_array()) {
        let failed = result.get("isError").and_then(|e| e.as_bool()) == Some(true);
        return Some(format!(
            "content: {} items{}",
            content.len(),
            if failed { " (tool error)" } else { "" }
        ));
    }
    if let Some(version) = result.get("protocolVersion").and_then(|v| v.as_str()) {
        return Some(format!("initialized ({})", version));
    }
    Some("ok".to_string())
}

fn is_event_stream(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream"))
}

pub async fn http_logging_middleware(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let ctx = TraceContext::new(request.method().as_str(), &path).with_session(
        request
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(String::from),
    );
    let span = RequestSpan::enter(&ctx);

    async move {
        let mut request = request;

        let ctx = if path == "/mcp" && request.method() == axum::http::Method::POST {
            let (parts, body) = request.into_parts();
            let bytes = match to_bytes(body, MAX_REQUEST_BODY).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(trace_id = %ctx.trace_id, "Failed to read request body: {}", e);
                    RequestSpan::log_exit(&ctx, 413, None);
                    return StatusCode::PAYLOAD_TOO_LARGE.into_response();
                }
            };
            let method = extract_mcp_method(&bytes);
            request = Request::from_parts(parts, Body::from(bytes));
            ctx.with_mcp_method(method)
        } else {
            ctx
        };

        RequestSpan::log_entry(&ctx);
        debug!(trace_id = %ctx.trace_id, headers = %headers_compact(request.headers()), "Request headers");
        request.extensions_mut().insert(ctx.clone());

        let response = next.run(request).await;
        let status = response.status().as_u16();

        if path != "/mcp" || is_event_stream(&response) {
            let detail = is_event_stream(&response).then_some("stream");
            RequestSpan::log_exit(&ctx, status, detail);
            return response;
        }

        let (parts, body) = response.into_parts();
        let bytes = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(trace_id = %ctx.trace_id, "Failed to read response body: {}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        };

        if let Some(summary) = format_mcp_response(&bytes) {
            debug!(trace_id = %ctx.trace_id, response = %summary, "MCP response");
        }
        RequestSpan::log_exit(&ctx, status, None);

        Response::from_parts(parts, Body::from(bytes))
    }
    .instrument(span)
    .await
}
