//! Server assembly for veriface.
//!
//! Turns a [`ServerConfig`] into a ready-to-serve axum [`Router`] backed by
//! the encrypted SQLite store, plus the background task that purges expired
//! sessions.

pub mod error;

pub use error::{Error, Result};

use std::{
  fmt,
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{Router, http::HeaderValue};
use serde::Deserialize;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use veriface_api::{AppState, CookieConfig, cookie::DEFAULT_COOKIE_NAME};
use veriface_core::{
  enrollment::EnrollmentService,
  session::{DEFAULT_SESSION_TTL, SessionAuthority},
  store::SessionStore,
};
use veriface_store_sqlite::{SqliteStore, StoreKeys};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `VERIFACE_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default = "default_store_path")]
  pub store_path:          PathBuf,
  /// Base64, 32 bytes.
  pub encryption_key:      String,
  /// Base64, 64 bytes.
  pub signing_key:         String,
  #[serde(default = "default_session_ttl_secs")]
  pub session_ttl_secs:    u64,
  #[serde(default = "default_purge_interval_secs")]
  pub purge_interval_secs: u64,
  #[serde(default)]
  pub cookie_secure:       bool,
  #[serde(default = "default_cookie_name")]
  pub cookie_name:         String,
  /// Browser origin allowed to call the API with credentials. Empty
  /// disables CORS.
  #[serde(default = "default_cors_origin")]
  pub cors_origin:         String,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 3000 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/veriface/veriface.db") }
fn default_session_ttl_secs() -> u64 { DEFAULT_SESSION_TTL.num_seconds().unsigned_abs() }
fn default_purge_interval_secs() -> u64 { 15 * 60 }
fn default_cookie_name() -> String { DEFAULT_COOKIE_NAME.to_owned() }
fn default_cors_origin() -> String { "http://localhost:5173".to_owned() }

impl fmt::Debug for ServerConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ServerConfig")
      .field("host", &self.host)
      .field("port", &self.port)
      .field("store_path", &self.store_path)
      .field("encryption_key", &"[REDACTED]")
      .field("signing_key", &"[REDACTED]")
      .field("session_ttl_secs", &self.session_ttl_secs)
      .field("purge_interval_secs", &self.purge_interval_secs)
      .field("cookie_secure", &self.cookie_secure)
      .field("cookie_name", &self.cookie_name)
      .field("cors_origin", &self.cors_origin)
      .finish()
  }
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn keys(&self) -> Result<StoreKeys> {
    Ok(StoreKeys::from_base64(&self.encryption_key, &self.signing_key)?)
  }

  pub fn session_ttl(&self) -> Result<chrono::Duration> {
    if self.session_ttl_secs == 0 {
      return Err(Error::Config("session_ttl_secs must be positive".to_owned()));
    }
    i64::try_from(self.session_ttl_secs)
      .ok()
      .and_then(chrono::Duration::try_seconds)
      .ok_or_else(|| Error::Config("session_ttl_secs is too large".to_owned()))
  }

  pub fn purge_interval(&self) -> Result<std::time::Duration> {
    if self.purge_interval_secs == 0 {
      return Err(Error::Config("purge_interval_secs must be positive".to_owned()));
    }
    Ok(std::time::Duration::from_secs(self.purge_interval_secs))
  }

  pub fn cookie(&self) -> Result<CookieConfig> {
    CookieConfig::new(self.cookie_name.clone(), self.cookie_secure)
      .map_err(|e| Error::Config(e.to_string()))
  }

  /// The CORS origin as a header value, or `None` when CORS is off.
  pub fn allowed_origin(&self) -> Result<Option<HeaderValue>> {
    let origin = self.cors_origin.trim();
    if origin.is_empty() {
      return Ok(None);
    }
    if origin == "*" {
      return Err(Error::Config(
        "cors_origin must name one origin; credentials cannot be shared with `*`".to_owned(),
      ));
    }
    HeaderValue::from_str(origin)
      .map(Some)
      .map_err(|_| Error::Config(format!("cors_origin {origin:?} is not a valid header value")))
  }
}

// ─── Assembly ─────────────────────────────────────────────────────────────────

/// Everything `main` needs to run the service.
pub struct Server {
  pub router:   Router,
  pub sessions: SessionAuthority<SqliteStore>,
}

/// Open the store named by `config` and assemble the server.
pub async fn build(config: &ServerConfig) -> Result<Server> {
  let path = expand_tilde(&config.store_path);
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .map_err(|e| Error::Config(format!("cannot create {}: {e}", parent.display())))?;
  }

  let store = SqliteStore::open(&path, config.keys()?).await?;
  tracing::info!(path = %path.display(), "store opened");
  build_with_store(store, config)
}

/// Assemble the server around an already-open store.
pub fn build_with_store(store: SqliteStore, config: &ServerConfig) -> Result<Server> {
  let cookie = config.cookie()?;
  let cors = config.allowed_origin()?;
  let store = Arc::new(store);
  let sessions = SessionAuthority::new(Arc::clone(&store), config.session_ttl()?);
  let service = EnrollmentService::new(store, sessions.clone());

  let mut router = veriface_api::router(AppState::new(service, cookie));
  if let Some(origin) = cors {
    tracing::info!(origin = ?origin, "CORS enabled");
    router = router.layer(veriface_api::cors_layer(origin));
  }
  Ok(Server { router, sessions })
}

/// Periodically delete expired sessions until the task is aborted.
pub fn spawn_session_purge<T>(
  sessions: SessionAuthority<T>,
  every: std::time::Duration,
) -> JoinHandle<()>
where
  T: SessionStore + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      if let Err(e) = sessions.purge_expired().await {
        tracing::warn!(error = %e, "session purge failed");
      }
    }
  })
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
