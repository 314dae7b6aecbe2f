//! Gateway configuration
//!
//! The configuration lives in `<config_dir>/config.json`. Features are toggled
//! by the presence of paired fields (both TLS paths, both OAuth identifiers,
//! both token-exchange client credentials, both rate-limit values). A pair
//! with only one side set is rejected at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// File name of the configuration document inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Errors raised while loading or validating the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{section}: `{first}` and `{second}` must be configured together")]
    PartialPair {
        section: &'static str,
        first: &'static str,
        second: &'static str,
    },
    #[error("invalid `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Root configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub dns_rebinding: DnsRebindingConfig,
    #[serde(default)]
    pub sessions: SessionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Seconds to wait for in-flight connections after a shutdown signal
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Externally visible base URL (used in OAuth metadata and challenges)
    #[serde(default)]
    pub public_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the REST API that tools call
    pub base_url: String,
    /// Static credential used when no exchanged credential is available
    #[serde(default)]
    pub fallback_token: Option<String>,
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default)]
    pub cert_path: Option<PathBuf>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

impl TlsConfig {
    /// Certificate and key paths, when TLS is enabled
    pub fn paths(&self) -> Option<(&Path, &Path)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert.as_path(), key.as_path())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allowed origins; `"*"` allows any origin
    #[serde(default = "default_cors_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_cors_origins(),
        }
    }
}

impl CorsConfig {
    pub fn allows_any(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub window_secs: Option<u64>,
    #[serde(default)]
    pub max_requests: Option<u32>,
}

/// Resolved rate-limit rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub window: Duration,
    pub max_requests: u32,
}

impl RateLimitConfig {
    pub fn rule(&self) -> Option<RateLimitRule> {
        match (self.window_secs, self.max_requests) {
            (Some(window), Some(max_requests)) => Some(RateLimitRule {
                window: Duration::from_secs(window),
                max_requests,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Issuer of inbound credentials (authorization server base URL)
    #[serde(default)]
    pub authority: Option<String>,
    /// Expected audience of inbound credentials
    #[serde(default)]
    pub client_id: Option<String>,
    /// Scopes advertised in protected-resource metadata
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default = "default_discovery_ttl_secs")]
    pub discovery_ttl_secs: u64,
    #[serde(default = "default_jwks_cache_size")]
    pub jwks_cache_size: usize,
    #[serde(default = "default_jwks_cache_ttl_secs")]
    pub jwks_cache_ttl_secs: u64,
    #[serde(default)]
    pub token_exchange: Option<TokenExchangeConfig>,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            authority: None,
            client_id: None,
            scopes: Vec::new(),
            discovery_ttl_secs: default_discovery_ttl_secs(),
            jwks_cache_size: default_jwks_cache_size(),
            jwks_cache_ttl_secs: default_jwks_cache_ttl_secs(),
            token_exchange: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenExchangeConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Target audience of the downstream credential
    #[serde(default)]
    pub audience: Option<String>,
    /// Target resource (RFC 8707) of the downstream credential
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Resolved inbound authentication settings
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub authority: String,
    pub client_id: String,
    pub scopes: Vec<String>,
    pub discovery_ttl: Duration,
    pub jwks_cache_size: usize,
    pub jwks_cache_ttl: Duration,
}

/// Resolved token-exchange settings
#[derive(Debug, Clone)]
pub struct ExchangeSettings {
    pub authority: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: Option<String>,
    pub resource: Option<String>,
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DnsRebindingConfig {
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl DnsRebindingConfig {
    pub fn enabled(&self) -> bool {
        !self.allowed_hosts.is_empty() || !self.allowed_origins.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Close sessions idle for longer than this; 0 disables the sweep
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Re-scan the tools directory for every new session instead of sharing
    /// the registry built at startup
    #[serde(default)]
    pub reload_tools_per_session: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            reload_tools_per_session: false,
        }
    }
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for daily-rotated log files; console only when unset
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_backend_timeout_secs() -> u64 {
    30
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_discovery_ttl_secs() -> u64 {
    3600
}

fn default_jwks_cache_size() -> usize {
    5
}

fn default_jwks_cache_ttl_secs() -> u64 {
    600
}

fn default_idle_timeout_secs() -> u64 {
    1800
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

impl GatewayConfig {
    /// Parse and validate a configuration document
    pub fn from_json(path: &Path, raw: &str) -> Result<Self, ConfigError> {
        let config: GatewayConfig =
            serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.json` from a configuration directory
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(CONFIG_FILE_NAME);
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_json(&path, &raw)
    }

    /// Check field pairing and URL shapes
    pub fn validate(&self) -> Result<(), ConfigError> {
        let backend = url::Url::parse(&self.backend.base_url).map_err(|e| {
            ConfigError::Invalid {
                field: "backend.base_url",
                reason: e.to_string(),
            }
        })?;
        if !matches!(backend.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "backend.base_url",
                reason: format!("unsupported scheme `{}`", backend.scheme()),
            });
        }

        if let Some(public_url) = &self.server.public_url {
            url::Url::parse(public_url).map_err(|e| ConfigError::Invalid {
                field: "server.public_url",
                reason: e.to_string(),
            })?;
        }

        require_pair(
            "tls",
            ("cert_path", self.tls.cert_path.is_some()),
            ("key_path", self.tls.key_path.is_some()),
        )?;
        require_pair(
            "rate_limit",
            ("window_secs", self.rate_limit.window_secs.is_some()),
            ("max_requests", self.rate_limit.max_requests.is_some()),
        )?;
        if let Some(rule) = self.rate_limit.rule() {
            if rule.window.is_zero() || rule.max_requests == 0 {
                return Err(ConfigError::Invalid {
                    field: "rate_limit",
                    reason: "window and threshold must be positive".to_string(),
                });
            }
        }

        require_pair(
            "oauth",
            ("authority", self.oauth.authority.is_some()),
            ("client_id", self.oauth.client_id.is_some()),
        )?;
        if let Some(authority) = &self.oauth.authority {
            url::Url::parse(authority).map_err(|e| ConfigError::Invalid {
                field: "oauth.authority",
                reason: e.to_string(),
            })?;
        }
        if self.oauth.jwks_cache_size == 0 {
            return Err(ConfigError::Invalid {
                field: "oauth.jwks_cache_size",
                reason: "must be at least 1".to_string(),
            });
        }

        if let Some(exchange) = &self.oauth.token_exchange {
            require_pair(
                "oauth.token_exchange",
                ("client_id", exchange.client_id.is_some()),
                ("client_secret", exchange.client_secret.is_some()),
            )?;
            if exchange.client_id.is_some() && self.oauth.authority.is_none() {
                return Err(ConfigError::Invalid {
                    field: "oauth.token_exchange",
                    reason: "token exchange requires oauth.authority and oauth.client_id"
                        .to_string(),
                });
            }
        }

        Ok(())
    }

    /// Inbound authentication settings, when both OAuth identifiers are set
    pub fn auth(&self) -> Option<AuthSettings> {
        let authority = self.oauth.authority.clone()?;
        let client_id = self.oauth.client_id.clone()?;
        Some(AuthSettings {
            authority,
            client_id,
            scopes: self.oauth.scopes.clone(),
            discovery_ttl: Duration::from_secs(self.oauth.discovery_ttl_secs),
            jwks_cache_size: self.oauth.jwks_cache_size,
            jwks_cache_ttl: Duration::from_secs(self.oauth.jwks_cache_ttl_secs),
        })
    }

    pub fn auth_enabled(&self) -> bool {
        self.auth().is_some()
    }

    /// Token-exchange settings, when exchange client credentials are set
    pub fn exchange(&self) -> Option<ExchangeSettings> {
        let authority = self.oauth.authority.clone()?;
        let exchange = self.oauth.token_exchange.as_ref()?;
        Some(ExchangeSettings {
            authority,
            client_id: exchange.client_id.clone()?,
            client_secret: exchange.client_secret.clone()?,
            audience: exchange.audience.clone(),
            resource: exchange.resource.clone(),
            scope: exchange.scope.clone(),
        })
    }

    pub fn exchange_enabled(&self) -> bool {
        self.exchange().is_some()
    }

    /// Externally visible base URL without a trailing slash
    pub fn public_url(&self) -> String {
        match &self.server.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => {
                let scheme = if self.tls.paths().is_some() { "https" } else { "http" };
                format!("{}://localhost:{}", scheme, self.server.port)
            }
        }
    }

    /// URL of the protected MCP endpoint
    pub fn resource_url(&self) -> String {
        format!("{}/mcp", self.public_url())
    }

    /// URL of the RFC 9728 protected-resource metadata document
    pub fn resource_metadata_url(&self) -> String {
        format!("{}/.well-known/oauth-protected-resource", self.public_url())
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn require_pair(
    section: &'static str,
    first: (&'static str, bool),
    second: (&'static str, bool),
) -> Result<(), ConfigError> {
    if first.1 != second.1 {
        return Err(ConfigError::PartialPair {
            section,
            first: first.0,
            second: second.0,
        });
    }
    Ok(())
}

/// Handle on the configuration directory
///
/// Startup reads the full document once; the backend fallback token is read
/// again on every lookup so operators can rotate it without a restart.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    dir: PathBuf,
}

impl ConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE_NAME)
    }

    /// Current `backend.fallback_token`, read fresh from disk
    pub async fn fallback_token(&self) -> Option<String> {
        let path = self.config_path();
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to re-read {}: {}", path.display(), e);
                return None;
            }
        };
        let document: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                return None;
            }
        };
        let token = document
            .pointer("/backend/fallback_token")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .map(String::from);
        if token.is_none() {
            debug!("No backend fallback token configured");
        }
        token
    }
}
