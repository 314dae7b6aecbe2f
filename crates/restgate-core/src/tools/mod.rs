//! Tool model
//!
//! A tool is any value satisfying [`ToolHandler`] plus a metadata block. Tools
//! are produced by [`ToolFactory`] implementations from manifests discovered
//! in the tools directory; nothing is loaded as code at runtime.

mod loader;
mod manifest;
mod registry;
mod rest;

pub use loader::{load_tools, ToolFactories, ToolFactory, ToolLoadError};
pub use manifest::ToolManifest;
pub use registry::ToolRegistry;
pub use rest::{RestTool, RestToolFactory};

use async_trait::async_trait;
use rmcp::model::{CallToolResult, Tool};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::backend::BackendClient;
use crate::credential::AuthInfo;

pub type JsonObject = serde_json::Map<String, Value>;

/// Everything a handler may use while serving one call
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Validated caller context, downstream credential resolved
    pub auth: AuthInfo,
    pub backend: BackendClient,
    pub session_id: Option<String>,
}

impl ToolContext {
    pub fn downstream_token(&self) -> Option<&str> {
        self.auth.downstream_token.as_deref()
    }
}

/// Callable side of a tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with schema-validated input
    async fn call(&self, input: JsonObject, ctx: &ToolContext) -> anyhow::Result<CallToolResult>;
}

/// Descriptive side of a tool, exposed unchanged through `tools/list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: JsonObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<JsonObject>,
}

/// A named tool ready to be registered against an endpoint
#[derive(Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub metadata: ToolMetadata,
    pub handler: Arc<dyn ToolHandler>,
    validator: Arc<jsonschema::Validator>,
}

impl ToolDefinition {
    /// Build a definition, compiling the input schema
    pub fn new(
        name: impl Into<String>,
        metadata: ToolMetadata,
        handler: Arc<dyn ToolHandler>,
    ) -> anyhow::Result<Self> {
        let name = name.into();
        let schema = Value::Object(metadata.input_schema.clone());
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| anyhow::anyhow!("invalid input schema for {}: {}", name, e))?;
        Ok(Self {
            name,
            metadata,
            handler,
            validator: Arc::new(validator),
        })
    }

    /// Check arguments against the input schema
    pub fn validate_input(&self, input: &Value) -> Result<(), String> {
        if self.validator.is_valid(input) {
            return Ok(());
        }
        let msg = self
            .validator
            .iter_errors(input)
            .take(5)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        if msg.is_empty() {
            Err("arguments do not match the input schema".to_string())
        } else {
            Err(msg)
        }
    }

    /// MCP representation for `tools/list`
    pub fn to_mcp_tool(&self) -> Result<Tool, serde_json::Error> {
        let mut value = serde_json::to_value(&self.metadata)?;
        if let Value::Object(map) = &mut value {
            map.insert("name".to_string(), Value::String(self.name.clone()));
        }
        serde_json::from_value(value)
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
