//! Bounded cache of verification keys
//!
//! Keys are looked up by `kid`. A miss fetches the authorization server's key
//! set from the `jwks_uri` found through discovery.

use anyhow::Context;
use jsonwebtoken::jwk::{JwkSet, KeyAlgorithm};
use jsonwebtoken::DecodingKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::oauth::DiscoveryCache;

pub const DEFAULT_CAPACITY: usize = 5;
pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

/// A published key and the algorithm it is restricted to, if any
#[derive(Clone)]
pub struct VerificationKey {
    pub key: DecodingKey,
    pub algorithm: Option<KeyAlgorithm>,
}

struct CachedKey {
    key: VerificationKey,
    inserted_at: Instant,
}

pub struct KeySetCache {
    discovery: Arc<DiscoveryCache>,
    http_client: reqwest::Client,
    capacity: usize,
    ttl: Duration,
    keys: Mutex<HashMap<String, CachedKey>>,
}

impl KeySetCache {
    pub fn new(
        discovery: Arc<DiscoveryCache>,
        http_client: reqwest::Client,
        capacity: usize,
        ttl: Duration,
    ) -> Self {
        Self {
            discovery,
            http_client,
            capacity: capacity.max(1),
            ttl,
            keys: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verification key for `kid`, fetching the key set on a miss
    pub async fn key(&self, kid: &str) -> anyhow::Result<VerificationKey> {
        if let Some(key) = self.cached(kid) {
            return Ok(key);
        }

        let metadata = self.discovery.get().await?;
        let jwks_uri = metadata
            .jwks_uri
            .as_deref()
            .context("Discovery document has no jwks_uri")?;

        debug!(kid = %kid, jwks_uri = %jwks_uri, "Fetching key set");
        let response = self.http_client.get(jwks_uri).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Key set request failed: HTTP {}", response.status());
        }
        let set: JwkSet = response.json().await.context("Invalid key set document")?;

        let jwk = set
            .find(kid)
            .with_context(|| format!("No key with kid '{}' in key set", kid))?;
        let key = VerificationKey {
            key: DecodingKey::from_jwk(jwk).context("Unusable key in key set")?,
            algorithm: jwk.common.key_algorithm,
        };

        self.insert(kid, key.clone());
        Ok(key)
    }

    fn cached(&self, kid: &str) -> Option<VerificationKey> {
        let mut keys = self.keys.lock();
        match keys.get(kid) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => Some(entry.key.clone()),
            Some(_) => {
                keys.remove(kid);
                None
            }
            None => None,
        }
    }

    fn insert(&self, kid: &str, key: VerificationKey) {
        let mut keys = self.keys.lock();
        keys.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);

        if !keys.contains_key(kid) && keys.len() >= self.capacity {
            let oldest = keys
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                keys.remove(&oldest);
            }
        }

        keys.insert(
            kid.to_string(),
            CachedKey {
                key,
                inserted_at: Instant::now(),
            },
        );
    }
}
