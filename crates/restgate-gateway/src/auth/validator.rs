//! Bearer credential validation
//!
//! Verifies signed JWTs against the authorization server's published keys.
//! Callers only ever see valid or invalid; the reason goes to the log.

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use restgate_core::{AuthInfo, AuthSettings, ValidationResult};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use super::jwks::KeySetCache;
use crate::oauth::DiscoveryCache;

#[async_trait]
pub trait CredentialValidator: Send + Sync {
    async fn validate(&self, token: &str) -> ValidationResult;
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => value.split_whitespace().map(str::to_string).collect(),
            OneOrMany::Many(values) => values,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Claims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    aud: Option<OneOrMany>,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    azp: Option<String>,
    #[serde(default)]
    scope: Option<OneOrMany>,
    #[serde(default)]
    scp: Option<OneOrMany>,
}

impl Claims {
    fn into_auth_info(self, token: &str) -> AuthInfo {
        let scopes = self
            .scope
            .or(self.scp)
            .map(OneOrMany::into_vec)
            .unwrap_or_default();
        let audience = match self.aud {
            Some(OneOrMany::One(aud)) => vec![aud],
            Some(OneOrMany::Many(aud)) => aud,
            None => Vec::new(),
        };
        AuthInfo {
            client_id: self.client_id.or(self.azp),
            scopes,
            subject: self.sub,
            audience,
            token: Some(token.to_string()),
            downstream_token: None,
        }
    }
}

/// JWT validator for one authority and audience
pub struct JwtValidator {
    authority: String,
    client_id: String,
    keys: KeySetCache,
}

impl JwtValidator {
    pub fn new(
        settings: &AuthSettings,
        discovery: Arc<DiscoveryCache>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            authority: settings.authority.clone(),
            client_id: settings.client_id.clone(),
            keys: KeySetCache::new(
                discovery,
                http_client,
                settings.jwks_cache_size,
                settings.jwks_cache_ttl,
            ),
        }
    }

    async fn verify(&self, token: &str) -> anyhow::Result<AuthInfo> {
        let header = decode_header(token)?;
        let kid = header
            .kid
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Credential header has no kid"))?;

        let key = self.keys.key(kid).await?;
        if let Some(published) = key.algorithm {
            let matches = Algorithm::from_str(&published.to_string())
                .is_ok_and(|alg| alg == header.alg);
            if !matches {
                anyhow::bail!(
                    "Credential alg {:?} does not match key '{}' alg {}",
                    header.alg,
                    kid,
                    published
                );
            }
        }

        let trimmed = self.authority.trim_end_matches('/');
        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[trimmed.to_string(), format!("{}/", trimmed)]);
        validation.set_audience(&[self.client_id.as_str()]);

        let data = decode::<Claims>(token, &key.key, &validation)?;
        Ok(data.claims.into_auth_info(token))
    }
}

#[async_trait]
impl CredentialValidator for JwtValidator {
    async fn validate(&self, token: &str) -> ValidationResult {
        match self.verify(token).await {
            Ok(info) => {
                debug!(client_id = ?info.client_id, subject = ?info.subject, "Credential valid");
                ValidationResult::Valid(info)
            }
            Err(e) => {
                warn!("Credential rejected: {}", e);
                ValidationResult::Invalid
            }
        }
    }
}
