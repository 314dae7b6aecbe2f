//! MCP sessions
//!
//! Transports come from rmcp's streamable HTTP session manager;
//! [`RegistrySessionManager`] mirrors their lifecycle into the
//! [`SessionRegistry`], which holds the per-session state the gateway needs
//! (cached downstream credential, activity timestamps).

mod manager;
mod registry;

pub use manager::RegistrySessionManager;
pub use registry::SessionRegistry;

/// Header carrying the session identifier
pub const SESSION_ID_HEADER: &str = "mcp-session-id";
