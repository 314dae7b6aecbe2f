//! Restgate MCP handler
//!
//! Implements the rmcp `ServerHandler` trait over one session's tool
//! registry. Each session gets its own handler instance; the registry is
//! attached during `initialize` from what the session middleware loaded.

use rmcp::{
    model::*,
    service::{NotificationContext, RequestContext},
    ErrorData as McpError, Peer, RoleServer, ServerHandler,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, error, info, warn};

use restgate_core::{AuthInfo, BackendClient, JsonObject, ToolContext, ToolRegistry};

use super::context;

pub struct GatewayHandler {
    backend: BackendClient,
    tools: OnceLock<Arc<ToolRegistry>>,
    initialized: AtomicBool,
}

impl GatewayHandler {
    pub fn new(backend: BackendClient) -> Self {
        Self {
            backend,
            tools: OnceLock::new(),
            initialized: AtomicBool::new(false),
        }
    }

    /// Handler whose session already has its tools
    pub fn with_tools(tools: Arc<ToolRegistry>, backend: BackendClient) -> Self {
        let handler = Self::new(backend);
        let _ = handler.tools.set(tools);
        handler
    }

    fn tools(&self) -> Result<&Arc<ToolRegistry>, McpError> {
        self.tools
            .get()
            .ok_or_else(|| McpError::invalid_request("Server not initialized", None))
    }

    fn server_info() -> Implementation {
        Implementation {
            name: "restgate".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ..Default::default()
        }
    }

    /// Highest protocol version both sides support
    fn negotiate_protocol_version(client: ProtocolVersion) -> ProtocolVersion {
        // Versions are ISO dates, so string order is release order
        if client > ProtocolVersion::LATEST {
            debug!(
                client_version = %client,
                our_max = %ProtocolVersion::LATEST,
                "Client uses newer protocol, negotiating down"
            );
            return ProtocolVersion::LATEST;
        }
        client
    }

    fn build_initialize_result(protocol_version: ProtocolVersion) -> InitializeResult {
        InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities::builder()
                .enable_tools_with(ToolsCapability {
                    list_changed: Some(false),
                })
                .build(),
            server_info: Self::server_info(),
            instructions: Some(
                "Restgate exposes REST backend operations as MCP tools.".to_string(),
            ),
        }
    }

    /// Every registered tool, in name order
    pub fn list(&self) -> Result<ListToolsResult, McpError> {
        let tools = self
            .tools()?
            .list()
            .into_iter()
            .map(|t| t.to_mcp_tool())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| {
                error!("Failed to render tool metadata: {}", e);
                McpError::internal_error("Failed to list tools", None)
            })?;
        debug!(count = tools.len(), "tools/list");
        Ok(ListToolsResult::with_all_items(tools))
    }

    /// Validate arguments and run one tool
    ///
    /// Handler failures become an `isError` result; the cause is only logged.
    pub async fn execute(
        &self,
        params: CallToolRequestParams,
        auth: AuthInfo,
        session_id: Option<String>,
    ) -> Result<CallToolResult, McpError> {
        let name = params.name.as_ref();
        let tool = self
            .tools()?
            .get(name)
            .ok_or_else(|| McpError::invalid_params(format!("Unknown tool: {}", name), None))?;

        let input = params.arguments.unwrap_or_else(JsonObject::new);
        let arguments = serde_json::Value::Object(input);
        tool.validate_input(&arguments).map_err(|msg| {
            McpError::invalid_params(format!("Invalid arguments for {}: {}", name, msg), None)
        })?;
        let serde_json::Value::Object(input) = arguments else {
            return Err(McpError::invalid_params("arguments must be an object", None));
        };

        info!(
            tool = %name,
            session_id = session_id.as_deref().unwrap_or("-"),
            client = auth.client_id.as_deref().unwrap_or("anon"),
            "call_tool"
        );

        let tool_ctx = ToolContext {
            auth,
            backend: self.backend.clone(),
            session_id,
        };
        let result = match tool.handler.call(input, &tool_ctx).await {
            Ok(result) => result,
            Err(e) => {
                warn!(tool = %name, "Tool call failed: {:#}", e);
                CallToolResult::error(vec![Content::text(format!(
                    "Tool '{}' failed to execute",
                    name
                ))])
            }
        };
        debug!(tool = %name, is_error = ?result.is_error, "call_tool result");
        Ok(result)
    }
}

/// Emits `notifications/progress` for one request
struct ProgressReporter {
    token: ProgressToken,
    peer: Peer<RoleServer>,
}

impl ProgressReporter {
    fn from_context(context: &RequestContext<RoleServer>) -> Option<Self> {
        Some(Self {
            token: context.meta.get_progress_token()?,
            peer: context.peer.clone(),
        })
    }

    async fn report(&self, progress: f64, message: &str) {
        let param = ProgressNotificationParam {
            progress_token: self.token.clone(),
            progress,
            total: Some(1.0),
            message: Some(message.to_string()),
        };
        if let Err(e) = self.peer.notify_progress(param).await {
            debug!("Dropped progress notification: {}", e);
        }
    }
}

impl ServerHandler for GatewayHandler {
    fn get_info(&self) -> ServerInfo {
        Self::build_initialize_result(ProtocolVersion::LATEST)
    }

    async fn initialize(
        &self,
        params: InitializeRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<InitializeResult, McpError> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return Err(McpError::invalid_request("Server already initialized", None));
        }
        if self.tools.get().is_none() {
            let tools = context::session_tools(&context.extensions).ok_or_else(|| {
                error!("Initialize reached a session without loaded tools");
                McpError::internal_error("Internal server error", None)
            })?;
            let _ = self.tools.set(tools);
        }
        if context.peer.peer_info().is_none() {
            context.peer.set_peer_info(params.clone());
        }

        let protocol_version = Self::negotiate_protocol_version(params.protocol_version);
        info!(
            client = %params.client_info.name,
            protocol_version = %protocol_version,
            tools = self.tools()?.len(),
            "Client initializing"
        );
        Ok(Self::build_initialize_result(protocol_version))
    }

    async fn on_initialized(&self, context: NotificationContext<RoleServer>) {
        info!(
            session_id = context::session_id(&context.extensions).as_deref().unwrap_or("-"),
            "Client initialized"
        );
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        self.list()
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParams,
        context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let auth = context::auth_info(&context.extensions);
        let session_id = context::session_id(&context.extensions);

        let progress = ProgressReporter::from_context(&context);
        if let Some(p) = &progress {
            p.report(0.0, "started").await;
        }
        let result = self.execute(params, auth, session_id).await;
        if let Some(p) = &progress {
            p.report(1.0, "completed").await;
        }
        result
    }
}
