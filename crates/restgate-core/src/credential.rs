//! Inbound credential context
//!
//! The validator produces a [`ValidationResult`]; requests that pass carry an
//! [`AuthInfo`] in their extensions. The dispatcher fills in the downstream
//! credential before tool handlers see it.

use std::fmt;

/// Outcome of validating an inbound bearer credential
///
/// Failure reasons are deliberately not carried: callers only learn whether
/// the credential is usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Invalid,
    Valid(AuthInfo),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    pub fn into_auth_info(self) -> Option<AuthInfo> {
        match self {
            ValidationResult::Valid(info) => Some(info),
            ValidationResult::Invalid => None,
        }
    }
}

/// Claims of a validated credential plus the downstream credential slot
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AuthInfo {
    /// Client the credential was issued to
    pub client_id: Option<String>,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// Subject (user) identifier
    pub subject: Option<String>,
    /// Audience values of the credential
    pub audience: Vec<String>,
    /// Original bearer value, kept for credential exchange
    pub token: Option<String>,
    /// Credential presented to the REST backend
    pub downstream_token: Option<String>,
}

impl AuthInfo {
    /// Context used when authentication is disabled
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_downstream_token(mut self, token: Option<String>) -> Self {
        self.downstream_token = token;
        self
    }
}

impl fmt::Debug for AuthInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthInfo")
            .field("client_id", &self.client_id)
            .field("scopes", &self.scopes)
            .field("subject", &self.subject)
            .field("audience", &self.audience)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "downstream_token",
                &self.downstream_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}
