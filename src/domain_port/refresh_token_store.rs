use crate::domain_model::*;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// TTL-backed storage of refresh records.
///
/// Every mutation that matters for correctness is a single atomic operation
/// on the backing store:
/// - `create` replaces the user's previous record in the same step as it
///   inserts the new one, so a user never has two live records;
/// - `take_for_rotation` removes the record and hands it back in one step, so
///   of two concurrent callers presenting the same token only one gets it.
///
/// Implementations fail closed: if the backing store cannot be reached in
/// time they return [`RefreshStoreError::StoreUnavailable`] rather than
/// guessing.
#[async_trait::async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Insert a fresh record for `identity`, superseding any existing one, and
    /// return its token.
    async fn create(
        &self,
        identity: &UserIdentity,
        absolute_ttl: Duration,
    ) -> Result<String, RefreshStoreError>;

    /// Remove the record for `token` and return it if it is still alive.
    /// A dead record is removed as well and reported by its expiry kind.
    async fn take_for_rotation(&self, token: &str) -> Result<RefreshRecord, RefreshStoreError>;

    /// Mark the record as used now without consuming it.
    async fn touch(&self, token: &str) -> Result<(), RefreshStoreError>;

    /// Idempotent removal.
    async fn delete(&self, token: &str) -> Result<(), RefreshStoreError>;

    async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, RefreshStoreError>;

    /// Remove every record whose absolute or idle deadline is before `now`.
    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, RefreshStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RefreshStoreError {
    #[error("unknown refresh token")]
    UnknownToken,
    #[error("refresh token idle timeout exceeded")]
    IdleTimeoutExceeded,
    #[error("refresh token absolute timeout exceeded")]
    AbsoluteTimeoutExceeded,
    #[error("refresh token store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("corrupt refresh record: {0}")]
    CorruptRecord(String),
}

impl RefreshStoreError {
    /// Map a dead liveness verdict to its error; `None` when alive.
    pub fn from_liveness(liveness: Liveness) -> Option<Self> {
        match liveness {
            Liveness::Alive => None,
            Liveness::IdleTimeout => Some(RefreshStoreError::IdleTimeoutExceeded),
            Liveness::AbsoluteTimeout => Some(RefreshStoreError::AbsoluteTimeoutExceeded),
        }
    }
}
