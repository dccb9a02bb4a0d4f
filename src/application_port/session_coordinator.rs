use crate::application_port::TokenError;
use crate::domain_model::{UserId, UserIdentity};
use crate::domain_port::RefreshStoreError;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown refresh token")]
    UnknownToken,
    #[error("refresh token idle timeout exceeded")]
    IdleTimeoutExceeded,
    #[error("refresh token absolute timeout exceeded")]
    AbsoluteTimeoutExceeded,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    /// The presented token was consumed but its replacement was never
    /// written.
    #[error("refresh token consumed without a replacement: {0}")]
    RotationIncomplete(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl SessionError {
    /// The caller holds no usable session and has to go through login again.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            SessionError::UnknownToken
                | SessionError::IdleTimeoutExceeded
                | SessionError::AbsoluteTimeoutExceeded
                | SessionError::RotationIncomplete(_)
        )
    }
}

impl From<RefreshStoreError> for SessionError {
    fn from(err: RefreshStoreError) -> Self {
        match err {
            RefreshStoreError::UnknownToken => SessionError::UnknownToken,
            RefreshStoreError::IdleTimeoutExceeded => SessionError::IdleTimeoutExceeded,
            RefreshStoreError::AbsoluteTimeoutExceeded => SessionError::AbsoluteTimeoutExceeded,
            RefreshStoreError::StoreUnavailable(e) => SessionError::StoreUnavailable(e),
            // The script already removed it; nothing usable is left.
            RefreshStoreError::CorruptRecord(_) => SessionError::UnknownToken,
        }
    }
}

impl From<TokenError> for SessionError {
    fn from(err: TokenError) -> Self {
        SessionError::InternalError(err.to_string())
    }
}

/// The pair of credentials handed to one client as two cookies.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub identity: UserIdentity,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait SessionCoordinator: Send + Sync {
    /// Open a session for an identity the upstream provider flow has already
    /// resolved.
    async fn login(&self, identity: UserIdentity) -> Result<SessionTokens, SessionError>;
    /// Rotate the refresh token and mint a new access credential. Nothing is
    /// created when this fails.
    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, SessionError>;
    async fn logout(&self, refresh_token: &str) -> Result<(), SessionError>;
    /// Forced revocation, e.g. on account deactivation.
    async fn revoke_user(&self, user_id: UserId) -> Result<u64, SessionError>;
}
