//! Gateway HTTP server
//!
//! Builds the router, wires the validator, exchanger and dispatcher from the
//! configuration, and serves over plain TCP or TLS until a shutdown signal.

mod dns_rebinding;
mod handlers;
pub mod logging_middleware;
pub mod rate_limit;
pub mod shutdown;
mod state;
pub mod tls;

pub use handlers::{HealthResponse, ProtectedResourceMetadata};
pub use state::AppState;

use anyhow::Context;
use axum::{
    http::{header, HeaderName, HeaderValue},
    middleware,
    routing::get,
    Extension, Router,
};
use restgate_core::config::CorsConfig;
use restgate_core::{BackendClient, ConfigStore, GatewayConfig};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{auth_middleware, AuthLayerState, CredentialValidator, JwtValidator};
use crate::dispatcher::{Dispatcher, ToolSource};
use crate::oauth::{CredentialExchanger, DiscoveryCache, TokenExchanger};
use crate::session::SESSION_ID_HEADER;

/// Largest request body accepted on `/mcp`
pub const MAX_REQUEST_BODY: usize = 4 * 1024 * 1024;

/// How the server stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every connection drained within the grace period
    Graceful,
    /// Connections were still open when the grace period ran out
    TimedOut,
}

pub struct GatewayServer {
    config: Arc<GatewayConfig>,
    state: AppState,
    validator: Option<Arc<dyn CredentialValidator>>,
}

impl GatewayServer {
    pub fn new(
        config: GatewayConfig,
        tools: ToolSource,
        config_store: ConfigStore,
    ) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let http_client = reqwest::Client::builder()
            .timeout(config.backend_timeout())
            .build()
            .context("Failed to build HTTP client")?;
        let backend = BackendClient::new(&config.backend.base_url, config.backend_timeout())?;

        let discovery = config.oauth.authority.as_ref().map(|authority| {
            Arc::new(DiscoveryCache::new(
                authority.clone(),
                http_client.clone(),
                std::time::Duration::from_secs(config.oauth.discovery_ttl_secs),
            ))
        });

        let validator = match (config.auth(), &discovery) {
            (Some(settings), Some(discovery)) => Some(Arc::new(JwtValidator::new(
                &settings,
                discovery.clone(),
                http_client.clone(),
            )) as Arc<dyn CredentialValidator>),
            _ => None,
        };

        let mut dispatcher = Dispatcher::new(tools, backend, config_store);
        if let (Some(settings), Some(discovery)) = (config.exchange(), &discovery) {
            let exchanger: Arc<dyn CredentialExchanger> = Arc::new(TokenExchanger::new(
                settings,
                discovery.clone(),
                http_client.clone(),
            ));
            dispatcher = dispatcher.with_exchanger(exchanger);
        }

        Ok(Self::with_parts(config, Arc::new(dispatcher), validator))
    }

    /// Assemble a server from already-built components
    pub fn with_parts(
        config: Arc<GatewayConfig>,
        dispatcher: Arc<Dispatcher>,
        validator: Option<Arc<dyn CredentialValidator>>,
    ) -> Self {
        Self {
            state: AppState {
                config: config.clone(),
                dispatcher,
            },
            config,
            validator,
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.state.dispatcher
    }

    /// Router with the full middleware stack
    ///
    /// Outer to inner: CORS, request logging, rate limiting, DNS rebinding
    /// protection, then bearer auth and session dispatch on `/mcp` only.
    pub fn router(&self) -> Router {
        let mut mcp_routes = self.state.dispatcher.router();
        if let Some(validator) = &self.validator {
            let auth = AuthLayerState {
                validator: validator.clone(),
                resource_metadata_url: self.config.resource_metadata_url(),
            };
            mcp_routes = mcp_routes.layer(middleware::from_fn_with_state(auth, auth_middleware));
        }

        let mut router = Router::new()
            .route("/health", get(handlers::health))
            .route(
                "/.well-known/oauth-protected-resource",
                get(handlers::resource_metadata),
            )
            .route(
                "/.well-known/oauth-protected-resource/mcp",
                get(handlers::resource_metadata),
            )
            .with_state(self.state.clone())
            .merge(mcp_routes);

        if self.config.dns_rebinding.enabled() {
            router = router.layer(middleware::from_fn_with_state(
                Arc::new(self.config.dns_rebinding.clone()),
                dns_rebinding::dns_rebinding_middleware,
            ));
        }

        if let Some(rule) = self.config.rate_limit.rule() {
            router = router
                .layer(middleware::from_fn(rate_limit::rate_limit_middleware))
                .layer(Extension(rate_limit::RateLimiter::new(rule)));
        }

        router
            .layer(middleware::from_fn(
                logging_middleware::http_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&self.config.cors))
    }

    /// Serve until `shutdown` resolves, then drain within the grace period
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<ShutdownOutcome> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<ShutdownOutcome> {
        let local_addr = listener.local_addr()?;
        let cancel = CancellationToken::new();
        let app = self.router();

        info!(
            "Auth: {}, token exchange: {}",
            if self.config.auth_enabled() { "enabled" } else { "disabled" },
            if self.config.exchange_enabled() { "enabled" } else { "disabled" },
        );

        let sweeper = self
            .config
            .sessions
            .idle_timeout()
            .map(|idle| self.state.dispatcher.spawn_idle_sweeper(idle, cancel.clone()));

        let mut server = match self.config.tls.paths() {
            Some((cert, key)) => {
                let tls = tls::load_server_config(cert, key)?;
                info!("Listening on https://{}", local_addr);
                tokio::spawn(tls::serve_tls(listener, app, tls, cancel.clone()))
            }
            None => {
                info!("Listening on http://{}", local_addr);
                let serve = axum::serve(
                    listener,
                    app.into_make_service_with_connect_info::<SocketAddr>(),
                )
                .with_graceful_shutdown(cancel.clone().cancelled_owned());
                tokio::spawn(async move { serve.await.map_err(anyhow::Error::from) })
            }
        };

        tokio::select! {
            _ = shutdown => {}
            result = &mut server => {
                cancel.cancel();
                return match result {
                    Ok(Ok(())) => Ok(ShutdownOutcome::Graceful),
                    Ok(Err(e)) => Err(e),
                    Err(e) => Err(e.into()),
                };
            }
        }

        info!("Shutting down, closing sessions");
        self.state.dispatcher.close_all().await;
        cancel.cancel();
        if let Some(sweeper) = sweeper {
            sweeper.abort();
        }

        let grace = self.config.shutdown_grace();
        match tokio::time::timeout(grace, server).await {
            Ok(Ok(Ok(()))) => {
                info!("Shutdown complete");
                Ok(ShutdownOutcome::Graceful)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!("Connections still open after {:?}", grace);
                Ok(ShutdownOutcome::TimedOut)
            }
        }
    }
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([
            HeaderName::from_static(SESSION_ID_HEADER),
            header::WWW_AUTHENTICATE,
        ]);

    if cors.allows_any() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}
