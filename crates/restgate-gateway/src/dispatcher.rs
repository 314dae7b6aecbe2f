//! Request dispatcher
//!
//! Sits in front of rmcp's streamable HTTP service and decides what reaches
//! it:
//!
//! 1. Known `mcp-session-id` → forwarded to that session.
//! 2. No session id and a single `initialize` request → tools are loaded for
//!    the new session and the request is forwarded. rmcp allocates the
//!    transport; it only enters the registry once `initialize` succeeds.
//! 3. Anything else → 400, with no session side effects.
//!
//! Before a POST reaches an existing session the downstream credential is
//! resolved: cached value, else token exchange, else the configured fallback
//! token. Whatever is obtained is cached on the session and handed to the
//! MCP handler through the request extensions.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use restgate_core::{
    load_tools, AuthInfo, BackendClient, ConfigStore, GatewayConfig, ToolFactories,
    ToolLoadError, ToolRegistry,
};
use rmcp::transport::streamable_http_server::session::SessionId;
use rmcp::transport::streamable_http_server::{
    SessionManager, StreamableHttpServerConfig, StreamableHttpService,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::mcp::jsonrpc::{error_response, INTERNAL_ERROR, INVALID_REQUEST};
use crate::mcp::{is_initialize_request, GatewayHandler, SessionTools, BAD_SESSION};
use crate::oauth::CredentialExchanger;
use crate::server::MAX_REQUEST_BODY;
use crate::session::{RegistrySessionManager, SessionRegistry, SESSION_ID_HEADER};

/// Interval between SSE keep-alive comments
pub const SSE_KEEP_ALIVE: Duration = Duration::from_secs(15);
/// Reconnect hint sent in the priming event of every SSE stream
pub const SSE_RETRY: Duration = Duration::from_secs(3);

/// rmcp streamable HTTP service serving `/mcp`
pub type McpService = StreamableHttpService<GatewayHandler, RegistrySessionManager>;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("failed to load tools for new session: {0}")]
    ToolLoad(#[from] ToolLoadError),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        error!("{}", self);
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            INTERNAL_ERROR,
            "Internal server error",
        )
    }
}

/// Where new sessions get their tools from
pub enum ToolSource {
    /// One registry built at startup and shared by every session
    Shared(Arc<ToolRegistry>),
    /// Re-scan the tools directory for every new session
    PerSession {
        config: Arc<GatewayConfig>,
        dir: PathBuf,
        factories: Arc<ToolFactories>,
    },
}

impl ToolSource {
    /// Pick the source `config.sessions` asks for, loading once either way
    ///
    /// The startup load makes an unreadable tools directory fatal before
    /// any client connects.
    pub async fn from_config(
        config: Arc<GatewayConfig>,
        dir: PathBuf,
        factories: ToolFactories,
    ) -> Result<Self, ToolLoadError> {
        let tools = load_tools(&config, &dir, &factories).await?;
        if config.sessions.reload_tools_per_session {
            info!(dir = %dir.display(), "Tools are reloaded for every session");
            Ok(ToolSource::PerSession {
                config,
                dir,
                factories: Arc::new(factories),
            })
        } else {
            Ok(ToolSource::Shared(Arc::new(ToolRegistry::from_definitions(
                tools,
            ))))
        }
    }

    async fn registry(&self) -> Result<Arc<ToolRegistry>, ToolLoadError> {
        match self {
            ToolSource::Shared(registry) => Ok(registry.clone()),
            ToolSource::PerSession {
                config,
                dir,
                factories,
            } => {
                let tools = load_tools(config, dir, factories).await?;
                Ok(Arc::new(ToolRegistry::from_definitions(tools)))
            }
        }
    }
}

pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    sessions: Arc<RegistrySessionManager>,
    tools: ToolSource,
    backend: BackendClient,
    config_store: ConfigStore,
    exchanger: Option<Arc<dyn CredentialExchanger>>,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(tools: ToolSource, backend: BackendClient, config_store: ConfigStore) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        Self {
            sessions: Arc::new(RegistrySessionManager::new(registry.clone())),
            registry,
            tools,
            backend,
            config_store,
            exchanger: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_exchanger(mut self, exchanger: Arc<dyn CredentialExchanger>) -> Self {
        self.exchanger = Some(exchanger);
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// rmcp service that owns the session transports
    pub fn service(&self) -> McpService {
        let backend = self.backend.clone();
        StreamableHttpService::new(
            move || Ok(GatewayHandler::new(backend.clone())),
            self.sessions.clone(),
            StreamableHttpServerConfig {
                stateful_mode: true,
                sse_keep_alive: Some(SSE_KEEP_ALIVE),
                sse_retry: Some(SSE_RETRY),
                cancellation_token: self.cancel.child_token(),
            },
        )
    }

    /// `/mcp` routes: the rmcp service behind [`dispatch_middleware`]
    pub fn router(self: &Arc<Self>) -> Router {
        Router::new()
            .nest_service("/mcp", self.service())
            .layer(middleware::from_fn_with_state(
                Arc::clone(self),
                dispatch_middleware,
            ))
    }

    /// Decide whether `request` may reach the rmcp service
    ///
    /// Returns the request to forward, with whatever the handler needs in
    /// its extensions, or the response that ends it here.
    pub async fn dispatch(&self, request: Request) -> Result<Request, Response> {
        let method = request.method().clone();
        if !matches!(method, Method::GET | Method::POST | Method::DELETE) {
            return Ok(request);
        }
        let session_id = request
            .headers()
            .get(SESSION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string);

        let (mut parts, body) = request.into_parts();
        let (body, bytes) = if method == Method::POST {
            match to_bytes(body, MAX_REQUEST_BODY).await {
                Ok(bytes) => (Body::from(bytes.clone()), Some(bytes)),
                Err(e) => {
                    warn!("Failed to read MCP request body: {}", e);
                    return Err(error_response(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        INVALID_REQUEST,
                        "Request body too large",
                    ));
                }
            }
        } else {
            (body, None)
        };

        match session_id {
            Some(id) if self.registry.contains(&id) => {
                self.registry.touch(&id);
                if method == Method::POST {
                    let auth = parts
                        .extensions
                        .get::<AuthInfo>()
                        .cloned()
                        .unwrap_or_else(AuthInfo::anonymous);
                    let auth = self.resolve_credential(&id, auth).await;
                    parts.extensions.insert(auth);
                }
            }
            Some(id) => {
                debug!(session_id = %id, "Unknown session id");
                return Err(reject(&method));
            }
            None if bytes.as_deref().is_some_and(is_initialize_request) => {
                let tools = self
                    .tools
                    .registry()
                    .await
                    .map_err(|e| DispatchError::from(e).into_response())?;
                debug!(tools = tools.len(), "Tools ready for new session");
                parts.extensions.insert(SessionTools(tools));
            }
            None => return Err(reject(&method)),
        }

        Ok(Request::from_parts(parts, body))
    }

    /// Attach the downstream credential for `session_id` to `auth`
    pub async fn resolve_credential(&self, session_id: &str, auth: AuthInfo) -> AuthInfo {
        if let Some(cached) = self.registry.get_downstream_credential(session_id) {
            return auth.with_downstream_token(Some(cached));
        }

        let mut credential = None;
        if let (Some(exchanger), Some(subject)) = (&self.exchanger, auth.token.as_deref()) {
            credential = exchanger.exchange(subject).await;
            if credential.is_none() {
                warn!(session_id = %session_id, "Exchange yielded no credential, using fallback token");
            }
        }

        if credential.is_none() {
            credential = self.config_store.fallback_token().await;
        }

        match &credential {
            Some(value) => self
                .registry
                .set_downstream_credential(session_id, value.clone()),
            None => debug!(session_id = %session_id, "No downstream credential available"),
        }

        auth.with_downstream_token(credential)
    }

    async fn close_session(&self, id: &str) {
        let session_id = SessionId::from(id);
        if let Err(e) = self.sessions.close_session(&session_id).await {
            warn!(session_id = %id, "Failed to close session: {}", e);
        }
        self.registry.delete(Some(id));
    }

    /// Close sessions idle for at least `max_idle`, returning how many
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let idle = self.registry.idle_sessions(max_idle);
        for id in &idle {
            info!(session_id = %id, "Closing idle session");
            self.close_session(id).await;
        }
        idle.len()
    }

    /// Periodically close idle sessions until `cancel` fires
    pub fn spawn_idle_sweeper(
        self: &Arc<Self>,
        max_idle: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let dispatcher = Arc::clone(self);
        let period = (max_idle / 2).max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let closed = dispatcher.sweep_idle(max_idle).await;
                        if closed > 0 {
                            debug!(closed, "Idle sweep finished");
                        }
                    }
                }
            }
        })
    }

    /// Close every live session and end their open SSE streams
    pub async fn close_all(&self) {
        let ids = self.registry.ids();
        let count = ids.len();
        for id in &ids {
            self.close_session(id).await;
        }
        self.registry.clear();
        self.cancel.cancel();
        if count > 0 {
            info!(count, "Closed all sessions");
        }
    }
}

/// Runs [`Dispatcher::dispatch`] in front of the rmcp service
pub async fn dispatch_middleware(
    State(dispatcher): State<Arc<Dispatcher>>,
    request: Request,
    next: Next,
) -> Response {
    match dispatcher.dispatch(request).await {
        Ok(request) => next.run(request).await,
        Err(response) => response,
    }
}

fn reject(method: &Method) -> Response {
    match *method {
        Method::GET | Method::DELETE => {
            (StatusCode::BAD_REQUEST, "Invalid or missing session ID").into_response()
        }
        _ => error_response(
            StatusCode::BAD_REQUEST,
            BAD_SESSION,
            "Bad Request: No valid session ID provided",
        ),
    }
}
