//! MCP protocol handling
//!
//! - `handler`: rmcp `ServerHandler` serving one session's tools
//! - `context`: request state handed from the HTTP layer to the handler
//! - `jsonrpc`: error envelopes written outside rmcp

pub mod context;
mod handler;
pub mod jsonrpc;

pub use context::SessionTools;
pub use handler::GatewayHandler;
pub use jsonrpc::{error_envelope, is_initialize_request, BAD_SESSION, UNAUTHORIZED};
