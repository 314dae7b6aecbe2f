//! In-memory session registry
//!
//! Tracks every live session by identifier together with the downstream
//! credential cached for it. The transport behind an identifier is owned by
//! the rmcp session manager; the registry only learns about a session once
//! that transport has answered `initialize`. Keeping the credential inside
//! the session entry means a deleted session cannot leave a stale credential
//! behind.

use dashmap::DashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

struct SessionEntry {
    downstream_credential: Option<String>,
    created_at: Instant,
    last_seen: Instant,
}

/// Live sessions keyed by identifier
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session under its identifier
    ///
    /// Returns false and leaves the existing entry alone if the identifier is
    /// already live.
    pub fn add(&self, id: &str) -> bool {
        let now = Instant::now();
        match self.sessions.entry(id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                warn!(session_id = %id, "Session id already registered");
                false
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(SessionEntry {
                    downstream_credential: None,
                    created_at: now,
                    last_seen: now,
                });
                debug!(session_id = %id, total = self.sessions.len(), "Session registered");
                true
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Remove a session; absent or unknown identifiers are ignored
    pub fn delete(&self, id: Option<&str>) -> bool {
        let Some(id) = id else {
            return false;
        };
        match self.sessions.remove(id) {
            Some((_, entry)) => {
                debug!(
                    session_id = %id,
                    age_secs = entry.created_at.elapsed().as_secs(),
                    "Session removed"
                );
                true
            }
            None => false,
        }
    }

    pub fn get_downstream_credential(&self, id: &str) -> Option<String> {
        self.sessions
            .get(id)
            .and_then(|e| e.downstream_credential.clone())
    }

    /// Cache a downstream credential; unknown identifiers are ignored
    pub fn set_downstream_credential(&self, id: &str, credential: String) {
        match self.sessions.get_mut(id) {
            Some(mut entry) => entry.downstream_credential = Some(credential),
            None => debug!(session_id = %id, "Credential for unknown session dropped"),
        }
    }

    /// Record activity on a session
    pub fn touch(&self, id: &str) {
        if let Some(mut entry) = self.sessions.get_mut(id) {
            entry.last_seen = Instant::now();
        }
    }

    /// Identifiers of sessions without activity for at least `max_idle`
    pub fn idle_sessions(&self, max_idle: Duration) -> Vec<String> {
        self.sessions
            .iter()
            .filter(|e| e.last_seen.elapsed() >= max_idle)
            .map(|e| e.key().clone())
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn clear(&self) {
        self.sessions.clear();
    }
}
