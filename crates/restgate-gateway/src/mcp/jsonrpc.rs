//! JSON-RPC error envelopes the gateway writes itself
//!
//! Everything that reaches a session is framed by rmcp; these cover the
//! responses produced before a request gets that far (auth, rate limiting,
//! session admission).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use rmcp::model::{ClientJsonRpcMessage, ClientRequest, ErrorCode};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// No valid session for the request
pub const BAD_SESSION: ErrorCode = ErrorCode(-32000);
/// Missing or rejected bearer credential
pub const UNAUTHORIZED: ErrorCode = ErrorCode(-32001);
pub const INVALID_REQUEST: ErrorCode = ErrorCode(-32600);
pub const INTERNAL_ERROR: ErrorCode = ErrorCode(-32603);
/// Client exceeded its request budget
pub const RATE_LIMITED: ErrorCode = ErrorCode(-32000);

/// `{ jsonrpc, error: { code, message }, id: null }`
pub fn error_envelope(code: ErrorCode, message: impl Into<String>) -> Value {
    serde_json::json!({
        "jsonrpc": JSONRPC_VERSION,
        "error": { "code": code.0, "message": message.into() },
        "id": null,
    })
}

/// HTTP response carrying an error envelope
pub fn error_response(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Response {
    (status, Json(error_envelope(code, message))).into_response()
}

/// True when a raw POST body is a single well-formed `initialize` request
pub fn is_initialize_request(body: &[u8]) -> bool {
    match serde_json::from_slice::<ClientJsonRpcMessage>(body) {
        Ok(ClientJsonRpcMessage::Request(request)) => {
            matches!(request.request, ClientRequest::InitializeRequest(_))
        }
        _ => false,
    }
}
