#![allow(dead_code)]

use chrono::{DateTime, Utc};
use cocktail_auth::domain_model::*;
use cocktail_auth::domain_port::*;
use cocktail_auth::infra_memory::MemoryRefreshTokenStore;
use cocktail_auth::server::Server;
use cocktail_auth::settings::{Settings, parse_settings_str};
use std::sync::Arc;
use std::time::Duration;
use warp::http::Response;
use warp::hyper::body::Bytes;

pub const ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
pub const IDLE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
pub const ABSOLUTE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const TEST_SETTINGS: &str = r#"
    [http]
    address = "127.0.0.1:0"

    [log]
    filter = "debug"

    [store]
    backend = "memory"

    [token]
    secret_key = "integration-test-signing-key-0123456789"
    access_ttl_secs = 900

    [refresh]
    absolute_ttl_secs = 2592000
    idle_ttl_secs = 604800
    sweep_interval_secs = 3600

    [cookie]
    secure = true
    same_site = "Lax"
    frontend_url = "http://localhost:3000/"
"#;

pub fn settings() -> Settings {
    parse_settings_str(TEST_SETTINGS).expect("test settings should parse")
}

pub struct TestContext {
    pub server: Arc<Server>,
    pub store: Arc<MemoryRefreshTokenStore>,
    pub clock: Arc<ManualClock>,
}

/// A server over the in-memory store and a clock that only moves on demand.
pub fn setup() -> TestContext {
    let settings = settings();
    let clock = Arc::new(ManualClock::starting_now());
    let store = Arc::new(MemoryRefreshTokenStore::new(
        ExpiryPolicy::new(settings.refresh.idle_ttl()),
        clock.clone(),
    ));
    let server = Arc::new(Server::assemble(&settings, store.clone(), clock.clone()));
    TestContext {
        server,
        store,
        clock,
    }
}

pub fn alice() -> UserIdentity {
    UserIdentity::new(UserId(42), "a@x.com", "a")
}

/// Every store operation fails the way an unreachable backend does.
pub struct UnavailableStore;

fn outage() -> RefreshStoreError {
    RefreshStoreError::StoreUnavailable("connection refused".to_string())
}

#[async_trait::async_trait]
impl RefreshTokenStore for UnavailableStore {
    async fn create(&self, _: &UserIdentity, _: Duration) -> Result<String, RefreshStoreError> {
        Err(outage())
    }
    async fn take_for_rotation(&self, _: &str) -> Result<RefreshRecord, RefreshStoreError> {
        Err(outage())
    }
    async fn touch(&self, _: &str) -> Result<(), RefreshStoreError> {
        Err(outage())
    }
    async fn delete(&self, _: &str) -> Result<(), RefreshStoreError> {
        Err(outage())
    }
    async fn delete_all_for_user(&self, _: UserId) -> Result<u64, RefreshStoreError> {
        Err(outage())
    }
    async fn sweep_expired(&self, _: DateTime<Utc>) -> Result<u64, RefreshStoreError> {
        Err(outage())
    }
}

/// Take succeeds, every write fails: the store dropped between the two
/// halves of a rotation.
pub struct CreateFailsStore;

#[async_trait::async_trait]
impl RefreshTokenStore for CreateFailsStore {
    async fn create(&self, _: &UserIdentity, _: Duration) -> Result<String, RefreshStoreError> {
        Err(outage())
    }
    async fn take_for_rotation(&self, token: &str) -> Result<RefreshRecord, RefreshStoreError> {
        Ok(RefreshRecord::new(
            token.to_string(),
            &alice(),
            chrono::Utc::now(),
            ABSOLUTE_TTL,
        ))
    }
    async fn touch(&self, _: &str) -> Result<(), RefreshStoreError> {
        Err(outage())
    }
    async fn delete(&self, _: &str) -> Result<(), RefreshStoreError> {
        Err(outage())
    }
    async fn delete_all_for_user(&self, _: UserId) -> Result<u64, RefreshStoreError> {
        Err(outage())
    }
    async fn sweep_expired(&self, _: DateTime<Utc>) -> Result<u64, RefreshStoreError> {
        Err(outage())
    }
}

pub fn set_cookies<B>(response: &Response<B>) -> Vec<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.to_str().expect("ascii cookie").to_string())
        .collect()
}

/// Value of the named cookie among `Set-Cookie` headers.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    cookies.iter().find_map(|c| {
        c.strip_prefix(&prefix)
            .and_then(|rest| rest.split(';').next())
            .map(str::to_string)
    })
}

pub fn json_body(response: &Response<Bytes>) -> serde_json::Value {
    serde_json::from_slice(response.body()).expect("json body")
}
