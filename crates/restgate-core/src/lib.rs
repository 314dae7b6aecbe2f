//! Restgate core
//!
//! Configuration, credential context, the backend HTTP client and the tool
//! model shared by the gateway.

pub mod backend;
pub mod config;
pub mod credential;
pub mod tools;

pub use backend::{BackendBody, BackendClient, BackendRequest, BackendResponse};
pub use config::{
    AuthSettings, ConfigError, ConfigStore, ExchangeSettings, GatewayConfig, RateLimitRule,
};
pub use credential::{AuthInfo, ValidationResult};
pub use tools::{
    load_tools, JsonObject, RestToolFactory, ToolContext, ToolDefinition, ToolFactories,
    ToolFactory, ToolHandler, ToolLoadError, ToolManifest, ToolMetadata, ToolRegistry,
};
