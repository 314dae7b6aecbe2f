//! HTTP handlers

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use tracing::debug;

use super::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub sessions: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    debug!("Health check");
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.dispatcher.registry().count(),
    })
}

/// OAuth Protected Resource Metadata (RFC 9728)
#[derive(Serialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,
    pub bearer_methods_supported: Vec<String>,
}

/// Tells MCP clients which authorization server issues credentials for `/mcp`
pub async fn resource_metadata(State(state): State<AppState>) -> Response {
    let Some(auth) = state.config.auth() else {
        return StatusCode::NOT_FOUND.into_response();
    };
    Json(ProtectedResourceMetadata {
        resource: state.config.resource_url(),
        authorization_servers: vec![auth.authority],
        scopes_supported: auth.scopes,
        bearer_methods_supported: vec!["header".to_string()],
    })
    .into_response()
}
