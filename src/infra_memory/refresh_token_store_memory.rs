use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// In-process refresh store for single-node deployments and tests.
///
/// There is no native TTL here: liveness is decided by the [`ExpiryPolicy`]
/// on every read, and the sweeper reclaims what nobody reads again.
///
/// Lock order is `by_user` before `records`; no path takes a `records` guard
/// and then touches `by_user`.
pub struct MemoryRefreshTokenStore {
    records: DashMap<String, RefreshRecord>,
    by_user: DashMap<UserId, String>,
    policy: ExpiryPolicy,
    clock: Arc<dyn Clock>,
}

impl MemoryRefreshTokenStore {
    pub fn new(policy: ExpiryPolicy, clock: Arc<dyn Clock>) -> Self {
        MemoryRefreshTokenStore {
            records: DashMap::new(),
            by_user: DashMap::new(),
            policy,
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, token: &str) -> Option<RefreshRecord> {
        self.records.get(token).map(|r| r.value().clone())
    }

    pub fn record_count_for_user(&self, user_id: UserId) -> usize {
        self.records
            .iter()
            .filter(|r| r.value().user_id == user_id)
            .count()
    }

    fn unlink_user(&self, user_id: UserId, token: &str) {
        self.by_user.remove_if(&user_id, |_, current| current == token);
    }
}

#[async_trait::async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn create(
        &self,
        identity: &UserIdentity,
        absolute_ttl: Duration,
    ) -> Result<String, RefreshStoreError> {
        let token = generate_refresh_token();
        let record = RefreshRecord::new(token.clone(), identity, self.clock.now(), absolute_ttl);

        // The slot guard serialises creates for the same user.
        let mut slot = self
            .by_user
            .entry(identity.user_id)
            .or_insert_with(String::new);
        let previous = std::mem::replace(slot.value_mut(), token.clone());
        if !previous.is_empty() {
            self.records.remove(&previous);
        }
        self.records.insert(token.clone(), record);
        drop(slot);

        Ok(token)
    }

    async fn take_for_rotation(&self, token: &str) -> Result<RefreshRecord, RefreshStoreError> {
        let (_, record) = self
            .records
            .remove(token)
            .ok_or(RefreshStoreError::UnknownToken)?;
        self.unlink_user(record.user_id, token);

        match RefreshStoreError::from_liveness(self.policy.evaluate(&record, self.clock.now())) {
            Some(dead) => Err(dead),
            None => Ok(record),
        }
    }

    async fn touch(&self, token: &str) -> Result<(), RefreshStoreError> {
        let now = self.clock.now();
        let (user_id, verdict) = {
            let mut entry = self
                .records
                .get_mut(token)
                .ok_or(RefreshStoreError::UnknownToken)?;
            let verdict = self.policy.evaluate(entry.value(), now);
            if verdict == Liveness::Alive {
                entry.value_mut().last_used_at = now;
            }
            (entry.value().user_id, verdict)
        };

        match RefreshStoreError::from_liveness(verdict) {
            None => Ok(()),
            Some(dead) => {
                self.records.remove(token);
                self.unlink_user(user_id, token);
                Err(dead)
            }
        }
    }

    async fn delete(&self, token: &str) -> Result<(), RefreshStoreError> {
        if let Some((_, record)) = self.records.remove(token) {
            self.unlink_user(record.user_id, token);
        }
        Ok(())
    }

    async fn delete_all_for_user(&self, user_id: UserId) -> Result<u64, RefreshStoreError> {
        let mut removed = 0u64;
        if let Some((_, token)) = self.by_user.remove(&user_id) {
            if self.records.remove(&token).is_some() {
                removed += 1;
            }
        }
        // Stragglers from a create racing with this call.
        let orphans: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.value().user_id == user_id)
            .map(|r| r.key().clone())
            .collect();
        for token in orphans {
            if self
                .records
                .remove_if(&token, |_, r| r.user_id == user_id)
                .is_some()
            {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<u64, RefreshStoreError> {
        let dead: Vec<String> = self
            .records
            .iter()
            .filter(|r| self.policy.evaluate(r.value(), now) != Liveness::Alive)
            .map(|r| r.key().clone())
            .collect();

        let mut removed = 0u64;
        for token in dead {
            // Re-check: the record may have been touched since the scan.
            if let Some((_, record)) = self
                .records
                .remove_if(&token, |_, r| self.policy.evaluate(r, now) != Liveness::Alive)
            {
                self.unlink_user(record.user_id, &token);
                removed += 1;
            }
        }
        Ok(removed)
    }
}
