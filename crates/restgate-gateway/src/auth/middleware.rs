//! Bearer authentication for the MCP route
//!
//! Extracts the bearer credential, validates it and attaches the resulting
//! [`AuthInfo`](restgate_core::AuthInfo) to the request extensions.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use futures::FutureExt;
use restgate_core::ValidationResult;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::CredentialValidator;
use crate::logging::TraceContext;
use crate::mcp::jsonrpc::{error_response, INTERNAL_ERROR, UNAUTHORIZED};

/// State for [`auth_middleware`]
#[derive(Clone)]
pub struct AuthLayerState {
    pub validator: Arc<dyn CredentialValidator>,
    /// Advertised in the `WWW-Authenticate` challenge
    pub resource_metadata_url: String,
}

pub async fn auth_middleware(
    State(state): State<AuthLayerState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    // CORS preflight
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let trace_id = request
        .extensions()
        .get::<TraceContext>()
        .map(|ctx| ctx.trace_id.clone())
        .unwrap_or_else(|| "??????".to_string());

    let Some(token) = bearer_token(&request) else {
        warn!(trace_id = %trace_id, "Missing bearer credential");
        return challenge(
            format!("Bearer resource_metadata=\"{}\"", state.resource_metadata_url),
            "Unauthorized: Bearer token required",
        );
    };

    let validation = AssertUnwindSafe(state.validator.validate(&token))
        .catch_unwind()
        .await;

    match validation {
        Ok(ValidationResult::Valid(info)) => {
            debug!(trace_id = %trace_id, client_id = ?info.client_id, "Authenticated");
            request.extensions_mut().insert(info);
            next.run(request).await
        }
        Ok(ValidationResult::Invalid) => {
            warn!(trace_id = %trace_id, "Bearer credential rejected");
            challenge(
                format!(
                    "Bearer error=\"invalid_token\", error_description=\"The access token is invalid or expired\", resource_metadata=\"{}\"",
                    state.resource_metadata_url
                ),
                "Unauthorized: Invalid or expired token",
            )
        }
        Err(_) => {
            error!(trace_id = %trace_id, "Credential validation panicked");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                INTERNAL_ERROR,
                "Internal error during authentication",
            )
        }
    }
}

fn bearer_token(request: &Request<Body>) -> Option<String> {
    let value = request.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token.to_string())
}

fn challenge(www_authenticate: String, message: &str) -> Response {
    let mut response = error_response(StatusCode::UNAUTHORIZED, UNAUTHORIZED, message);
    if let Ok(value) = HeaderValue::from_str(&www_authenticate) {
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, value);
    }
    response
}
