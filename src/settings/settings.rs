use anyhow::{Result, anyhow};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// HS256 keys shorter than the hash output are rejected outright.
pub const MIN_SECRET_KEY_BYTES: usize = 32;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub log: Log,
    pub store: Store,
    pub token: Token,
    #[serde(default)]
    pub refresh: Refresh,
    pub cookie: Cookie,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Http {
    pub address: String,
    // TLS is served only when both are set
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Store {
    pub backend: StoreBackend,
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_op_timeout_ms")]
    pub op_timeout_ms: u64,
}

#[derive(Clone, Deserialize)]
pub struct Token {
    pub secret_key: String,
    #[serde(default = "default_access_ttl_secs")]
    pub access_ttl_secs: u64,
}

// Keep the signing key out of `info!(?settings)`.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("secret_key", &"<redacted>")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Refresh {
    #[serde(default = "default_absolute_ttl_secs")]
    pub absolute_ttl_secs: u64,
    #[serde(default = "default_idle_ttl_secs")]
    pub idle_ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SameSite::Strict => f.write_str("Strict"),
            SameSite::Lax => f.write_str("Lax"),
            SameSite::None => f.write_str("None"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cookie {
    pub domain: Option<String>,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: SameSite,
    pub frontend_url: String,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_key_prefix() -> String {
    "auth:refresh".to_string()
}
fn default_op_timeout_ms() -> u64 {
    500
}
fn default_access_ttl_secs() -> u64 {
    15 * 60
}
fn default_absolute_ttl_secs() -> u64 {
    30 * 24 * 60 * 60
}
fn default_idle_ttl_secs() -> u64 {
    7 * 24 * 60 * 60
}
fn default_sweep_interval_secs() -> u64 {
    60 * 60
}

impl Store {
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

impl Token {
    pub fn access_ttl(&self) -> Duration {
        Duration::from_secs(self.access_ttl_secs)
    }
}

impl Default for Refresh {
    fn default() -> Self {
        Refresh {
            absolute_ttl_secs: default_absolute_ttl_secs(),
            idle_ttl_secs: default_idle_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Refresh {
    pub fn absolute_ttl(&self) -> Duration {
        Duration::from_secs(self.absolute_ttl_secs)
    }

    pub fn idle_ttl(&self) -> Duration {
        Duration::from_secs(self.idle_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("token.secret_key must be at least {MIN_SECRET_KEY_BYTES} bytes, got {0}")]
    SecretTooShort(usize),
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),
    #[error("refresh.idle_ttl_secs ({idle}) exceeds refresh.absolute_ttl_secs ({absolute})")]
    IdleExceedsAbsolute { idle: u64, absolute: u64 },
    #[error("cookie.same_site = None requires cookie.secure = true")]
    InsecureSameSiteNone,
    #[error("http.cert_path and http.key_path must be set together")]
    PartialTls,
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        let secret_len = self.token.secret_key.len();
        if secret_len < MIN_SECRET_KEY_BYTES {
            return Err(SettingsError::SecretTooShort(secret_len));
        }

        for (name, value) in [
            ("token.access_ttl_secs", self.token.access_ttl_secs),
            ("refresh.absolute_ttl_secs", self.refresh.absolute_ttl_secs),
            ("refresh.idle_ttl_secs", self.refresh.idle_ttl_secs),
            ("refresh.sweep_interval_secs", self.refresh.sweep_interval_secs),
            ("store.op_timeout_ms", self.store.op_timeout_ms),
        ] {
            if value == 0 {
                return Err(SettingsError::ZeroDuration(name));
            }
        }

        if self.refresh.idle_ttl_secs > self.refresh.absolute_ttl_secs {
            return Err(SettingsError::IdleExceedsAbsolute {
                idle: self.refresh.idle_ttl_secs,
                absolute: self.refresh.absolute_ttl_secs,
            });
        }

        if self.cookie.same_site == SameSite::None && !self.cookie.secure {
            return Err(SettingsError::InsecureSameSiteNone);
        }

        if self.http.cert_path.is_some() != self.http.key_path.is_some() {
            return Err(SettingsError::PartialTls);
        }

        Ok(())
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

const ENV_PREFIX: &str = "COCKTAIL_AUTH";

/// File first, then `COCKTAIL_AUTH_<SECTION>__<KEY>` environment overrides.
pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);
    build(File::with_name(path), environment())
}

/// Same layering as [`parse_settings`] over an inline TOML document.
pub fn parse_settings_str(toml: &str) -> Result<Settings> {
    build(File::from_str(toml, FileFormat::Toml), environment())
}

// One `_` after the prefix, `__` between nesting levels.
fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

fn build<S>(file: S, env: Environment) -> Result<Settings>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings: Settings = Config::builder()
        .add_source(file)
        .add_source(env)
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;
    Ok(settings)
}
