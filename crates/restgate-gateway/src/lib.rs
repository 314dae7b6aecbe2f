//! Restgate gateway
//!
//! MCP over streamable HTTP in front of a REST backend:
//! - `auth`: bearer credential validation against the authorization server's keys
//! - `oauth`: discovery and RFC 8693 token exchange
//! - `session`: rmcp session manager and the live-session registry
//! - `mcp`: rmcp server handler and JSON-RPC error envelopes
//! - `dispatcher`: routes requests to sessions and resolves downstream credentials
//! - `server`: router, middleware, TLS and graceful shutdown

pub mod auth;
pub mod dispatcher;
pub mod logging;
pub mod mcp;
pub mod oauth;
pub mod server;
pub mod session;

pub use auth::{CredentialValidator, JwtValidator};
pub use dispatcher::{DispatchError, Dispatcher, ToolSource};
pub use mcp::GatewayHandler;
pub use oauth::{CredentialExchanger, DiscoveryCache, TokenExchanger};
pub use server::{shutdown::shutdown_signal, GatewayServer, ShutdownOutcome};
pub use session::{RegistrySessionManager, SessionRegistry, SESSION_ID_HEADER};
