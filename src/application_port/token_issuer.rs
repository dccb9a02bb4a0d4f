use crate::domain_model::UserIdentity;
use chrono::{DateTime, Utc};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("malformed credential")]
    MalformedCredential,
    #[error("expired credential")]
    ExpiredCredential,
    #[error("bad signature")]
    BadSignature,
    #[error("signing error: {0}")]
    Signing(String),
}

impl TokenError {
    /// Stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::MalformedCredential => "malformed",
            TokenError::ExpiredCredential => "expired",
            TokenError::BadSignature => "bad_signature",
            TokenError::Signing(_) => "signing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedAccess {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedAccess {
    pub identity: UserIdentity,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Mints and checks self-contained access credentials. Pure computation over
/// a process-wide secret and the clock; no shared state is touched.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, identity: &UserIdentity, ttl: Duration) -> Result<IssuedAccess, TokenError>;
    fn validate(&self, token: &str) -> Result<VerifiedAccess, TokenError>;
}
