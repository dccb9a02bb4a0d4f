use crate::domain_model::{UserId, UserIdentity};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Server-side half of a session, keyed by the opaque token string itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub token: String,
    pub user_id: UserId,
    pub email: String,
    pub display_name: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub last_used_at: DateTime<Utc>,
    #[serde(rename = "ttl")]
    pub absolute_ttl_secs: u64,
}

impl RefreshRecord {
    pub fn new(
        token: String,
        identity: &UserIdentity,
        now: DateTime<Utc>,
        absolute_ttl: std::time::Duration,
    ) -> Self {
        Self {
            token,
            user_id: identity.user_id,
            email: identity.email.clone(),
            display_name: identity.display_name.clone(),
            created_at: now,
            last_used_at: now,
            absolute_ttl_secs: absolute_ttl.as_secs(),
        }
    }

    pub fn identity(&self) -> UserIdentity {
        UserIdentity::new(self.user_id, self.email.clone(), self.display_name.clone())
    }

    pub fn absolute_deadline(&self) -> DateTime<Utc> {
        add_secs(self.created_at, self.absolute_ttl_secs)
    }

    pub fn idle_deadline(&self, idle_ttl: std::time::Duration) -> DateTime<Utc> {
        add_secs(self.last_used_at, idle_ttl.as_secs())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    IdleTimeout,
    AbsoluteTimeout,
}

/// The two independent expiry clocks of a refresh record. Either one firing
/// kills the record; when both have fired the absolute one is reported.
#[derive(Debug, Clone, Copy)]
pub struct ExpiryPolicy {
    pub idle_ttl: std::time::Duration,
}

impl ExpiryPolicy {
    pub fn new(idle_ttl: std::time::Duration) -> Self {
        Self { idle_ttl }
    }

    pub fn evaluate(&self, record: &RefreshRecord, now: DateTime<Utc>) -> Liveness {
        if now > record.absolute_deadline() {
            Liveness::AbsoluteTimeout
        } else if now > record.idle_deadline(self.idle_ttl) {
            Liveness::IdleTimeout
        } else {
            Liveness::Alive
        }
    }
}

fn add_secs(at: DateTime<Utc>, secs: u64) -> DateTime<Utc> {
    i64::try_from(secs)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|d| at.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
