use crate::application_port::*;
use crate::domain_model::{UserId, UserIdentity, fingerprint};
use crate::domain_port::{Clock, RefreshStoreError, RefreshTokenStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub access_ttl: Duration,
    pub refresh_absolute_ttl: Duration,
}

pub struct RealSessionCoordinator {
    token_issuer: Arc<dyn TokenIssuer>,
    store: Arc<dyn RefreshTokenStore>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl RealSessionCoordinator {
    pub fn new(
        token_issuer: Arc<dyn TokenIssuer>,
        store: Arc<dyn RefreshTokenStore>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            token_issuer,
            store,
            clock,
            config,
        }
    }

    fn refresh_expires_at(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        chrono::Duration::from_std(self.config.refresh_absolute_ttl)
            .ok()
            .and_then(|ttl| from.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Access credential first: it is pure, so a signing failure leaves no
    /// record behind.
    async fn open(&self, identity: UserIdentity) -> Result<SessionTokens, SessionError> {
        let access = self
            .token_issuer
            .issue(&identity, self.config.access_ttl)?;

        let now = self.clock.now();
        let refresh_token = self
            .store
            .create(&identity, self.config.refresh_absolute_ttl)
            .await?;

        Ok(SessionTokens {
            identity,
            access_token: access.token,
            access_token_expires_at: access.expires_at,
            refresh_token,
            refresh_token_expires_at: self.refresh_expires_at(now),
        })
    }
}

#[async_trait::async_trait]
impl SessionCoordinator for RealSessionCoordinator {
    async fn login(&self, identity: UserIdentity) -> Result<SessionTokens, SessionError> {
        let user_id = identity.user_id;
        let tokens = self.open(identity).await.inspect_err(|e| {
            error!(%user_id, error = %e, "session could not be opened");
        })?;
        info!(%user_id, refresh = %fingerprint(&tokens.refresh_token), "session opened");
        Ok(tokens)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, SessionError> {
        let presented = fingerprint(refresh_token);

        // Rotation: the old record is gone from here on, whatever happens next.
        let record = match self.store.take_for_rotation(refresh_token).await {
            Ok(record) => record,
            Err(e) => {
                match &e {
                    RefreshStoreError::UnknownToken => {
                        warn!(refresh = %presented, "unknown or already rotated refresh token")
                    }
                    RefreshStoreError::IdleTimeoutExceeded
                    | RefreshStoreError::AbsoluteTimeoutExceeded => {
                        info!(refresh = %presented, reason = %e, "refresh token expired")
                    }
                    RefreshStoreError::StoreUnavailable(_) | RefreshStoreError::CorruptRecord(_) => {
                        error!(refresh = %presented, error = %e, "refresh rotation failed")
                    }
                }
                return Err(e.into());
            }
        };

        let user_id = record.user_id;
        let tokens = self.open(record.identity()).await.map_err(|e| {
            error!(%user_id, error = %e, "refresh consumed but no new session was created");
            SessionError::RotationIncomplete(e.to_string())
        })?;
        info!(
            %user_id,
            from = %presented,
            to = %fingerprint(&tokens.refresh_token),
            "refresh token rotated"
        );
        Ok(tokens)
    }

    async fn logout(&self, refresh_token: &str) -> Result<(), SessionError> {
        self.store.delete(refresh_token).await?;
        info!(refresh = %fingerprint(refresh_token), "session closed");
        Ok(())
    }

    async fn revoke_user(&self, user_id: UserId) -> Result<u64, SessionError> {
        let removed = self.store.delete_all_for_user(user_id).await?;
        info!(%user_id, removed, "sessions revoked");
        Ok(removed)
    }
}
