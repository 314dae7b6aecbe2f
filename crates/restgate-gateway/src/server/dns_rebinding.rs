//! DNS rebinding protection
//!
//! Rejects requests whose `Host` or `Origin` is not on the configured
//! allow-lists. An empty list disables that check. HTTP/2 requests carry the
//! host in the `:authority` pseudo-header, which lands in the request URI.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use restgate_core::config::DnsRebindingConfig;
use std::sync::Arc;
use tracing::warn;

use crate::mcp::jsonrpc::{error_response, BAD_SESSION};

pub async fn dns_rebinding_middleware(
    State(config): State<Arc<DnsRebindingConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let host = request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()));
    if !config.allowed_hosts.is_empty() && !host.is_some_and(|h| host_allowed(&config, h)) {
        warn!(host = ?host, "Rejected request with disallowed Host");
        return forbidden(&format!("Invalid Host header: {}", host.unwrap_or("")));
    }

    if let Some(origin) = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
    {
        if !config.allowed_origins.is_empty()
            && !config.allowed_origins.iter().any(|o| o == origin)
        {
            warn!(origin = %origin, "Rejected request with disallowed Origin");
            return forbidden(&format!("Invalid Origin header: {}", origin));
        }
    }

    next.run(request).await
}

fn host_allowed(config: &DnsRebindingConfig, host: &str) -> bool {
    let bare = match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    };
    config
        .allowed_hosts
        .iter()
        .any(|allowed| allowed.eq_ignore_ascii_case(host) || allowed.eq_ignore_ascii_case(bare))
}

fn forbidden(message: &str) -> Response {
    error_response(StatusCode::FORBIDDEN, BAD_SESSION, message)
}
