use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{RedisResult, Script};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const REFRESH_CREATE: &str = include_str!("refresh_create.lua");
const REFRESH_TAKE: &str = include_str!("refresh_take.lua");
const REFRESH_TOUCH: &str = include_str!("refresh_touch.lua");
const REFRESH_DELETE_ALL: &str = include_str!("refresh_delete_all.lua");
const REFRESH_SWEEP_ONE: &str = include_str!("refresh_sweep_one.lua");

const SCAN_BATCH: usize = 200;

/// Refresh records as JSON strings under `{prefix}:token:{token}`, with a
/// per-user index `{prefix}:user:{user_id}` holding the user's live token.
/// Both keys carry the absolute ttl as native expiry; the idle window is
/// judged on read and by the sweeper.
pub struct RedisRefreshTokenStore {
    conn: ConnectionManager,
    prefix: String,
    policy: ExpiryPolicy,
    clock: Arc<dyn Clock>,
    op_timeout: Duration,
}

impl RedisRefreshTokenStore {
    pub fn new(
        conn: ConnectionManager,
        prefix: impl Into<String>,
        policy: ExpiryPolicy,
        clock: Arc<dyn Clock>,
        op_timeout: Duration,
    ) -> Self {
        RedisRefreshTokenStore {
            conn,
            prefix: prefix.into(),
            policy,
            clock,
            op_timeout,
        }
    }

    fn record_prefix(&self) -> String {
        format!("{}:token:", self.prefix)
    }

    fn index_prefix(&self) -> String {
        format!("{}:user:", self.prefix)
    }

    fn record_key(&self, token: &str) -> String {
        format!("{}:token:{}", self.prefix, token)
    }

    fn index_key(&self, user_id: UserId) -> String {
        format!("{}:user:{}", self.prefix, user_id)
    }

    /// Every round trip goes through here: a slow or absent server is an
    /// outage, never an answer.
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = RedisResult<T>>,
    ) -> Result<T, RefreshStoreError> {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                warn!(op, error = %e, "redis operation failed");
                Err(RefreshStoreError::StoreUnavailable(e.to_string()))
            }
            Err(_) => {
                warn!(op, timeout = ?self.op_timeout, "redis operation timed out");
                Err(RefreshStoreError::StoreUnavailable(format!(
                    "{op} timed out after {:?}",
                    self.op_timeout
                )))
            }
        }
    }

    fn decode(raw: &str) -> Result<RefreshRecord, RefreshStoreError> {
        serde_json::from_str(raw).map_err(|e| RefreshStoreError::CorruptRecord(e.to_string()))
    }

    async fn remove(&self, token: &str) -> Result<Option<String>, RefreshStoreError> {
        let mut conn = self.conn.clone();
        let script = Script::new(REFRESH_TAKE);
        let mut invocation = script.key(self.record_key(token));
        invocation.arg(self.index_prefix()).arg(token);
        self.bounded("take", invocation.invoke_async(&mut conn))
            .await
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for RedisRefreshTokenStore {
    async fn create(
        &self,
        identity: &UserIdentity,
        absolute_ttl: Duration,
    ) -> Result<String, RefreshStoreError> {
        let token = generate_refresh_token();
        let record = RefreshRecord::new(token.clone(), identity, self.clock.now(), absolute_ttl);
        let raw = serde_json::to_string(&record)
            .map_err(|e| RefreshStoreError::CorruptRecord(e.to_string()))?;

        let mut conn = self.conn.clone();
        let script = Script::new(REFRESH_CREATE);
        let mut invocation = script.key(self.index_key(identity.user_id));
        invocation
            .key(self.record_key(&token))
            .arg(raw)
            .arg(absolute_ttl.as_secs().max(1))
            .arg(self.record_prefix())
            .arg(&token);
        let _: i64 = self
            .bounded("create", invocation.invoke_async(&mut conn))
            .await?;

        Ok(token)
    }

    async fn take_for_rotation(&self, token: &str) -> Result<RefreshRecord, RefreshStoreError> {
        let raw = self
            .remove(token)
            .await?
            .ok_or(RefreshStoreError::UnknownToken)?;
        let record = Self::decode(&raw)?;

        match RefreshStoreError::from_liveness(self.policy.evaluate(&record, self.clock.now())) {
            Some(dead) => Err(dead),
            None => Ok(record),
        }
    }

    async fn touch(&self, token: &str) -> Result<(), RefreshStoreError> {
        let mut conn = self.conn.clone();
        let script = Script::new(REFRESH_TOUCH);
        let mut invocation = script.key(self.record_key(token));
        invocation
            .arg(self.clock.now().timestamp())
            .arg(self.policy.idle_ttl.as_secs())
            .arg(self.index_prefix())
            .arg(token);
        let status: i64 = self
            .bounded("touch", invocation.invoke_async(&mut conn))
            .await?;

        match status {
            1 => Ok(()),
            0 => Err(RefreshStoreError::UnknownToken),
            -1 => Err(RefreshStoreError::AbsoluteTimeoutExceeded),
            -2 => Err(RefreshStoreError::IdleTimeoutExceeded),
            other => Err(RefreshStoreError::CorruptRecord(format!(
                "touch script status {other}"
            ))),
        }
    }

    async fn delete(&self, token: &str) -> Result<(), RefreshStoreError> {
        self.remove(token).await.map(|_| ())
    }

    async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, RefreshStoreError> {
        let mut conn = self.conn.clone();
        let script = Script::new(REFRESH_DELETE_ALL);
        let mut invocation = script.key(self.index_key(user_id));
        invocation.arg(self.record_prefix());
        self.bounded("delete_all", invocation.invoke_async(&mut conn))
            .await
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, RefreshStoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", self.record_prefix());
        let record_prefix = self.record_prefix();
        let sweep_one = Script::new(REFRESH_SWEEP_ONE);
        let mut cursor = 0u64;
        let mut removed = 0u64;

        loop {
            let (next, keys): (u64, Vec<String>) = self
                .bounded(
                    "scan",
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn),
                )
                .await?;

            if !keys.is_empty() {
                let values: Vec<Option<String>> = self
                    .bounded(
                        "mget",
                        redis::cmd("MGET").arg(&keys).query_async(&mut conn),
                    )
                    .await?;

                for (key, raw) in keys.iter().zip(values) {
                    // Gone between SCAN and MGET.
                    let Some(raw) = raw else { continue };
                    let token = key.strip_prefix(record_prefix.as_str()).unwrap_or(key.as_str());
                    let index = match Self::decode(&raw) {
                        Ok(record) if self.policy.evaluate(&record, now) == Liveness::Alive => {
                            continue;
                        }
                        Ok(record) => self.index_key(record.user_id),
                        Err(e) => {
                            warn!(key = %key, error = %e, "removing unreadable refresh record");
                            key.clone()
                        }
                    };

                    let mut invocation = sweep_one.key(key);
                    invocation.key(index).arg(&raw).arg(token);
                    let deleted: i64 = self
                        .bounded("sweep", invocation.invoke_async(&mut conn))
                        .await?;
                    removed += deleted as u64;
                }
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: Duration = Duration::from_secs(7 * 24 * 3600);
    const ABSOLUTE: Duration = Duration::from_secs(30 * 24 * 3600);

    async fn setup() -> (RedisRefreshTokenStore, Arc<ManualClock>) {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into());
        let conn = redis::Client::open(url)
            .unwrap()
            .get_connection_manager()
            .await
            .unwrap();
        let clock = Arc::new(ManualClock::starting_now());
        let prefix = format!("test:refresh:{}", generate_refresh_token());
        let store = RedisRefreshTokenStore::new(
            conn,
            prefix,
            ExpiryPolicy::new(IDLE),
            clock.clone(),
            Duration::from_secs(2),
        );
        (store, clock)
    }

    fn alice() -> UserIdentity {
        UserIdentity::new(UserId(42), "a@x.com", "a")
    }

    #[tokio::test]
    #[ignore = "needs a running redis (REDIS_URL)"]
    async fn test_redis_create_take_and_supersede() {
        let (store, _) = setup().await;
        let first = store.create(&alice(), ABSOLUTE).await.unwrap();
        let second = store.create(&alice(), ABSOLUTE).await.unwrap();

        assert!(matches!(
            store.take_for_rotation(&first).await,
            Err(RefreshStoreError::UnknownToken)
        ));
        let record = store.take_for_rotation(&second).await.unwrap();
        assert_eq!(record.identity(), alice());
        assert!(matches!(
            store.take_for_rotation(&second).await,
            Err(RefreshStoreError::UnknownToken)
        ));
    }

    #[tokio::test]
    #[ignore = "needs a running redis (REDIS_URL)"]
    async fn test_redis_touch_and_idle_timeout() {
        let (store, clock) = setup().await;
        let token = store.create(&alice(), ABSOLUTE).await.unwrap();

        clock.advance(Duration::from_secs(6 * 24 * 3600));
        store.touch(&token).await.unwrap();

        clock.advance(Duration::from_secs(6 * 24 * 3600));
        store.touch(&token).await.unwrap();

        clock.advance(IDLE + Duration::from_secs(1));
        assert!(matches!(
            store.take_for_rotation(&token).await,
            Err(RefreshStoreError::IdleTimeoutExceeded)
        ));
    }

    #[tokio::test]
    #[ignore = "needs a running redis (REDIS_URL)"]
    async fn test_redis_delete_all_and_sweep() {
        let (store, clock) = setup().await;
        let bob = UserIdentity::new(UserId(7), "b@x.com", "b");
        store.create(&alice(), ABSOLUTE).await.unwrap();
        let bobs = store.create(&bob, ABSOLUTE).await.unwrap();

        assert_eq!(store.delete_all_for_user(UserId(42)).await.unwrap(), 1);
        assert_eq!(store.delete_all_for_user(UserId(42)).await.unwrap(), 0);

        clock.advance(IDLE + Duration::from_secs(1));
        assert_eq!(store.sweep_expired(clock.now()).await.unwrap(), 1);
        assert!(matches!(
            store.touch(&bobs).await,
            Err(RefreshStoreError::UnknownToken)
        ));
    }
}
