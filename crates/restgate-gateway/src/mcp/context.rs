//! Request state carried from the HTTP layer into MCP handlers
//!
//! rmcp injects the HTTP request parts into every request's extensions. The
//! session middleware puts what the handler needs into those parts first.

use axum::http::request::Parts;
use restgate_core::{AuthInfo, ToolRegistry};
use rmcp::model::Extensions;
use std::sync::Arc;

use crate::session::SESSION_ID_HEADER;

/// Tools loaded for a session that is being initialized
#[derive(Clone)]
pub struct SessionTools(pub Arc<ToolRegistry>);

fn parts(extensions: &Extensions) -> Option<&Parts> {
    extensions.get::<Parts>()
}

/// Caller identity plus the downstream credential resolved for this call
pub fn auth_info(extensions: &Extensions) -> AuthInfo {
    parts(extensions)
        .and_then(|parts| parts.extensions.get::<AuthInfo>())
        .cloned()
        .unwrap_or_else(AuthInfo::anonymous)
}

pub fn session_id(extensions: &Extensions) -> Option<String> {
    parts(extensions)
        .and_then(|parts| parts.headers.get(SESSION_ID_HEADER))
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn session_tools(extensions: &Extensions) -> Option<Arc<ToolRegistry>> {
    parts(extensions)
        .and_then(|parts| parts.extensions.get::<SessionTools>())
        .map(|tools| tools.0.clone())
}
