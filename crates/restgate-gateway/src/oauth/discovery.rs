//! Authorization server discovery
//!
//! Fetches the authorization server's metadata from its `.well-known`
//! endpoints and caches it. The validator reads `jwks_uri` from it and the
//! exchanger reads `token_endpoint`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// OAuth/OIDC metadata document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthServerMetadata {
    #[serde(default)]
    pub issuer: Option<String>,

    #[serde(default)]
    pub token_endpoint: Option<String>,

    /// Key set used to verify issued credentials
    #[serde(default)]
    pub jwks_uri: Option<String>,

    #[serde(default)]
    pub grant_types_supported: Vec<String>,

    #[serde(default)]
    pub scopes_supported: Vec<String>,
}

impl AuthServerMetadata {
    /// True unless the server advertises grants and `grant` is not among them
    pub fn supports_grant(&self, grant: &str) -> bool {
        self.grant_types_supported.is_empty()
            || self.grant_types_supported.iter().any(|g| g == grant)
    }
}

struct Cached {
    metadata: Arc<AuthServerMetadata>,
    fetched_at: Instant,
}

/// Process-wide discovery cache for one authority
///
/// Entries live for `ttl`. The lock is held across the fetch, so concurrent
/// callers on a cold cache wait for a single request.
pub struct DiscoveryCache {
    authority: String,
    http_client: reqwest::Client,
    ttl: Duration,
    cached: Mutex<Option<Cached>>,
}

impl DiscoveryCache {
    pub fn new(authority: impl Into<String>, http_client: reqwest::Client, ttl: Duration) -> Self {
        Self {
            authority: authority.into(),
            http_client,
            ttl,
            cached: Mutex::new(None),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Cached metadata, fetching it if missing or expired
    pub async fn get(&self) -> anyhow::Result<Arc<AuthServerMetadata>> {
        let mut cached = self.cached.lock().await;
        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.metadata.clone());
            }
            debug!("Discovery cache expired for {}", self.authority);
        }

        let metadata = Arc::new(self.fetch().await?);
        *cached = Some(Cached {
            metadata: metadata.clone(),
            fetched_at: Instant::now(),
        });
        Ok(metadata)
    }

    /// Drop the cached document so the next lookup refetches it
    pub async fn reset(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch(&self) -> anyhow::Result<AuthServerMetadata> {
        let base = self.authority.trim_end_matches('/');

        let oidc_url = format!("{}/.well-known/openid-configuration", base);
        debug!("Trying OIDC discovery: {}", oidc_url);
        match self.fetch_metadata(&oidc_url).await {
            Ok(metadata) => {
                info!("OIDC discovery successful for {}", self.authority);
                return Ok(metadata);
            }
            Err(e) => debug!("OIDC discovery failed: {}, trying OAuth AS metadata", e),
        }

        let oauth_url = format!("{}/.well-known/oauth-authorization-server", base);
        debug!("Trying OAuth AS discovery: {}", oauth_url);
        match self.fetch_metadata(&oauth_url).await {
            Ok(metadata) => {
                info!("OAuth AS discovery successful for {}", self.authority);
                Ok(metadata)
            }
            Err(e) => anyhow::bail!(
                "OAuth discovery failed for {}: no valid metadata at OIDC or OAuth AS endpoints: {}",
                self.authority,
                e
            ),
        }
    }

    async fn fetch_metadata(&self, url: &str) -> anyhow::Result<AuthServerMetadata> {
        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Discovery request failed: HTTP {}", response.status());
        }

        Ok(response.json().await?)
    }
}
