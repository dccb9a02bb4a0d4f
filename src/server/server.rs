use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_model::ExpiryPolicy;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::server::Sweeper;
use crate::settings::{Cookie, Settings, StoreBackend};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const REDIS_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Server {
    pub session_coordinator: Arc<dyn SessionCoordinator>,
    pub authenticator: Arc<Authenticator>,
    pub cookie: Cookie,
    pub access_ttl: Duration,
    pub refresh_absolute_ttl: Duration,
    sweeper_handle: Mutex<Option<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        settings.validate()?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let policy = ExpiryPolicy::new(settings.refresh.idle_ttl());

        let store: Arc<dyn RefreshTokenStore> = match settings.store.backend {
            StoreBackend::Redis => {
                let redis_client = redis::Client::open(settings.store.redis_url.as_str())?;
                let redis_manager =
                    tokio::time::timeout(REDIS_CONNECT_TIMEOUT, redis_client.get_connection_manager())
                        .await
                        .map_err(|_| anyhow::anyhow!("timed out connecting to redis"))??;
                info!(prefix = %settings.store.key_prefix, "using redis refresh store");
                Arc::new(RedisRefreshTokenStore::new(
                    redis_manager,
                    settings.store.key_prefix.clone(),
                    policy,
                    clock.clone(),
                    settings.store.op_timeout(),
                ))
            }
            StoreBackend::Memory => {
                warn!("using in-memory refresh store; sessions will not survive a restart");
                Arc::new(MemoryRefreshTokenStore::new(policy, clock.clone()))
            }
        };

        Ok(Self::assemble(settings, store, clock))
    }

    /// Wires the services over an already-built store and clock and starts
    /// the sweeper. Must be called inside a tokio runtime.
    pub fn assemble(
        settings: &Settings,
        store: Arc<dyn RefreshTokenStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let token_issuer: Arc<dyn TokenIssuer> = Arc::new(JwtHs256Issuer::new(
            settings.token.secret_key.as_bytes(),
            clock.clone(),
        ));
        let authenticator = Arc::new(Authenticator::new(token_issuer.clone()));
        let session_coordinator: Arc<dyn SessionCoordinator> =
            Arc::new(RealSessionCoordinator::new(
                token_issuer,
                store.clone(),
                clock.clone(),
                SessionConfig {
                    access_ttl: settings.token.access_ttl(),
                    refresh_absolute_ttl: settings.refresh.absolute_ttl(),
                },
            ));

        let cancel = CancellationToken::new();
        let sweeper = Sweeper::new(store, clock, settings.refresh.sweep_interval());
        let sweeper_handle = tokio::spawn(sweeper.run(cancel.clone()));

        info!("server started");

        Self {
            session_coordinator,
            authenticator,
            cookie: settings.cookie.clone(),
            access_ttl: settings.token.access_ttl(),
            refresh_absolute_ttl: settings.refresh.absolute_ttl(),
            sweeper_handle: Mutex::new(Some(sweeper_handle)),
            cancel,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        self.cancel.cancel();

        let handle = self.sweeper_handle.lock().ok().and_then(|mut lock| lock.take());
        if let Some(handle) = handle {
            let r = handle.await;
            info!("sweeper handle dropped: {:?}", r);
        }
    }
}
