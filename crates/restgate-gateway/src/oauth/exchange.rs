//! Token exchange (RFC 8693)
//!
//! Trades the caller's bearer credential for one scoped to the REST backend.
//! Every failure is logged here and reported to the caller as `None`.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use restgate_core::ExchangeSettings;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::DiscoveryCache;

pub const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
pub const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";

/// Exchanges a subject credential for a downstream credential
#[async_trait]
pub trait CredentialExchanger: Send + Sync {
    /// `None` when the exchange is unavailable for any reason
    async fn exchange(&self, subject_token: &str) -> Option<String>;
}

/// Token endpoint response
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    issued_token_type: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl TokenResponse {
    /// `None` when absent or past what a timestamp can hold
    fn expires_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.expires_in?).ok()?;
        Utc::now().checked_add_signed(TimeDelta::try_seconds(secs)?)
    }
}

/// Exchanger backed by the authorization server's token endpoint
pub struct TokenExchanger {
    settings: ExchangeSettings,
    discovery: Arc<DiscoveryCache>,
    http_client: reqwest::Client,
}

impl TokenExchanger {
    pub fn new(
        settings: ExchangeSettings,
        discovery: Arc<DiscoveryCache>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            settings,
            discovery,
            http_client,
        }
    }

    async fn try_exchange(&self, subject_token: &str) -> anyhow::Result<Option<String>> {
        let metadata = self.discovery.get().await?;

        if !metadata.supports_grant(TOKEN_EXCHANGE_GRANT) {
            warn!(
                authority = %self.discovery.authority(),
                "Authorization server does not advertise token exchange"
            );
            return Ok(None);
        }

        let token_endpoint = metadata
            .token_endpoint
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Discovery document has no token_endpoint"))?;

        let mut params = vec![
            ("grant_type", TOKEN_EXCHANGE_GRANT),
            ("subject_token", subject_token),
            ("subject_token_type", ACCESS_TOKEN_TYPE),
            ("requested_token_type", ACCESS_TOKEN_TYPE),
        ];
        if let Some(audience) = &self.settings.audience {
            params.push(("audience", audience.as_str()));
        }
        if let Some(resource) = &self.settings.resource {
            params.push(("resource", resource.as_str()));
        }
        if let Some(scope) = &self.settings.scope {
            params.push(("scope", scope.as_str()));
        }

        debug!(endpoint = %token_endpoint, "Requesting token exchange");

        let response = self
            .http_client
            .post(token_endpoint)
            .basic_auth(&self.settings.client_id, Some(&self.settings.client_secret))
            .header("Accept", "application/json")
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Token exchange failed: HTTP {} - {}", status, body);
        }

        let token: TokenResponse = response.json().await?;
        if token.access_token.is_none() {
            warn!("Token exchange response has no access_token");
        } else {
            debug!(
                token_type = ?token.token_type,
                issued_token_type = ?token.issued_token_type,
                expires_at = ?token.expires_at(),
                "Token exchange succeeded"
            );
        }
        Ok(token.access_token)
    }
}

#[async_trait]
impl CredentialExchanger for TokenExchanger {
    async fn exchange(&self, subject_token: &str) -> Option<String> {
        match self.try_exchange(subject_token).await {
            Ok(token) => token,
            Err(e) => {
                warn!("Credential exchange unavailable: {:#}", e);
                None
            }
        }
    }
}
