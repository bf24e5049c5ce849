//! Server-held sessions and the [`SessionAuthority`] that owns them.
//!
//! A session binds a random bearer token to an identity id for a fixed window
//! from creation. Only the SHA-256 digest of the token is persisted, so a
//! leaked session table cannot be replayed.
//!
//! Lifecycle: `NoSession → Active → (Expired | Revoked)`. There is no refresh;
//! re-authentication always goes through [`SessionAuthority::establish`].

use std::{fmt, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, Result, store::SessionStore};

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TTL: Duration = Duration::hours(24);

const TOKEN_BYTES: usize = 32;

// ─── Token ───────────────────────────────────────────────────────────────────

/// An opaque bearer token as carried in the session cookie.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
  /// Generate 256 random bits, hex-encoded.
  pub fn generate() -> Self {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Self(hex::encode(bytes))
  }

  pub fn as_str(&self) -> &str { &self.0 }

  /// The key under which this token's session is stored.
  pub fn digest(&self) -> String { hex::encode(Sha256::digest(self.0.as_bytes())) }
}

impl From<String> for SessionToken {
  fn from(s: String) -> Self { Self(s) }
}

impl From<&str> for SessionToken {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl fmt::Debug for SessionToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("SessionToken([REDACTED])")
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A persisted session. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSession {
  pub token_digest: String,
  pub identity_id:  Uuid,
  pub created_at:   DateTime<Utc>,
  pub expires_at:   DateTime<Utc>,
}

impl ServerSession {
  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool { now >= self.expires_at }
}

/// What the client receives from [`SessionAuthority::establish`].
#[derive(Debug, Clone)]
pub struct SessionGrant {
  pub token:      SessionToken,
  pub expires_at: DateTime<Utc>,
  /// Remaining lifetime, for the cookie `Max-Age`.
  pub max_age:    Duration,
}

/// Outcome of [`SessionAuthority::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLookup {
  Active {
    identity_id: Uuid,
    expires_at:  DateTime<Utc>,
  },
  /// Cookie missing, token unknown, or session expired.
  NoActiveSession,
}

impl SessionLookup {
  pub fn identity_id(&self) -> Option<Uuid> {
    match self {
      Self::Active { identity_id, .. } => Some(*identity_id),
      Self::NoActiveSession => None,
    }
  }
}

// ─── Authority ───────────────────────────────────────────────────────────────

/// Source of the current time. Swappable so expiry can be tested.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The sole issuer and validator of sessions.
pub struct SessionAuthority<T> {
  store: Arc<T>,
  ttl:   Duration,
  clock: Clock,
}

impl<T> Clone for SessionAuthority<T> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      ttl:   self.ttl,
      clock: Arc::clone(&self.clock),
    }
  }
}

impl<T: SessionStore> SessionAuthority<T> {
  pub fn new(store: Arc<T>, ttl: Duration) -> Self {
    Self::with_clock(store, ttl, Arc::new(Utc::now))
  }

  pub fn with_clock(store: Arc<T>, ttl: Duration, clock: Clock) -> Self {
    Self { store, ttl, clock }
  }

  pub fn ttl(&self) -> Duration { self.ttl }

  /// Open a new session for `identity_id`.
  pub async fn establish(&self, identity_id: Uuid) -> Result<SessionGrant> {
    let token = SessionToken::generate();
    let created_at = (self.clock)();
    let expires_at = created_at + self.ttl;

    self
      .store
      .insert_session(ServerSession {
        token_digest: token.digest(),
        identity_id,
        created_at,
        expires_at,
      })
      .await
      .map_err(Error::from_store)?;

    tracing::debug!(%identity_id, %expires_at, "session established");
    Ok(SessionGrant { token, expires_at, max_age: self.ttl })
  }

  /// Resolve `token` to the identity it is bound to.
  ///
  /// A missing, unknown or expired token is [`SessionLookup::NoActiveSession`],
  /// never an error. Expired sessions are deleted on the way out, best effort.
  pub async fn validate(&self, token: Option<&SessionToken>) -> Result<SessionLookup> {
    let Some(token) = token else {
      return Ok(SessionLookup::NoActiveSession);
    };
    let digest = token.digest();

    let Some(session) = self.store.get_session(&digest).await.map_err(Error::from_store)?
    else {
      return Ok(SessionLookup::NoActiveSession);
    };

    if session.is_expired_at((self.clock)()) {
      tracing::debug!(identity_id = %session.identity_id, "session expired");
      // The purge task retries what this misses.
      if let Err(e) = self.store.delete_session(&digest).await {
        tracing::warn!(error = %e, "failed to delete expired session");
      }
      return Ok(SessionLookup::NoActiveSession);
    }

    Ok(SessionLookup::Active {
      identity_id: session.identity_id,
      expires_at:  session.expires_at,
    })
  }

  /// End the session behind `token`. Succeeds whether or not it existed.
  pub async fn revoke(&self, token: Option<&SessionToken>) -> Result<()> {
    if let Some(token) = token {
      self
        .store
        .delete_session(&token.digest())
        .await
        .map_err(Error::from_store)?;
      tracing::debug!("session revoked");
    }
    Ok(())
  }

  /// Drop every expired session from the store.
  pub async fn purge_expired(&self) -> Result<usize> {
    self
      .store
      .purge_expired((self.clock)())
      .await
      .map_err(Error::from_store)
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::testing::MemoryStore;

  fn authority(store: Arc<MemoryStore>) -> SessionAuthority<MemoryStore> {
    SessionAuthority::new(store, DEFAULT_SESSION_TTL)
  }

  /// A clock that can be moved forward by the test.
  fn manual_clock(start: DateTime<Utc>) -> (Clock, Arc<Mutex<DateTime<Utc>>>) {
    let now = Arc::new(Mutex::new(start));
    let handle = Arc::clone(&now);
    let clock: Clock = Arc::new(move || *handle.lock().unwrap());
    (clock, now)
  }

  #[test]
  fn tokens_are_random_and_hex() {
    let a = SessionToken::generate();
    let b = SessionToken::generate();
    assert_ne!(a, b);
    assert_eq!(a.as_str().len(), TOKEN_BYTES * 2);
    assert!(a.as_str().bytes().all(|c| c.is_ascii_hexdigit()));
  }

  #[test]
  fn digest_differs_from_token() {
    let t = SessionToken::generate();
    assert_ne!(t.digest(), t.as_str());
    assert_eq!(t.digest(), SessionToken::from(t.as_str()).digest());
  }

  #[test]
  fn debug_redacts_token() {
    let t = SessionToken::from("super-secret");
    assert!(!format!("{t:?}").contains("super-secret"));
  }

  #[tokio::test]
  async fn establish_then_validate() {
    let store = Arc::new(MemoryStore::default());
    let auth = authority(Arc::clone(&store));
    let id = Uuid::new_v4();

    let grant = auth.establish(id).await.unwrap();
    let lookup = auth.validate(Some(&grant.token)).await.unwrap();
    assert_eq!(lookup.identity_id(), Some(id));

    // Only the digest is stored.
    assert!(store.session_keys().iter().all(|k| k != grant.token.as_str()));
  }

  #[tokio::test]
  async fn missing_or_unknown_token_is_no_session() {
    let auth = authority(Arc::new(MemoryStore::default()));
    assert_eq!(auth.validate(None).await.unwrap(), SessionLookup::NoActiveSession);
    let stranger = SessionToken::generate();
    assert_eq!(
      auth.validate(Some(&stranger)).await.unwrap(),
      SessionLookup::NoActiveSession
    );
  }

  #[tokio::test]
  async fn revoke_ends_session_and_is_idempotent() {
    let auth = authority(Arc::new(MemoryStore::default()));
    let grant = auth.establish(Uuid::new_v4()).await.unwrap();

    auth.revoke(Some(&grant.token)).await.unwrap();
    assert_eq!(
      auth.validate(Some(&grant.token)).await.unwrap(),
      SessionLookup::NoActiveSession
    );

    auth.revoke(Some(&grant.token)).await.unwrap();
    auth.revoke(None).await.unwrap();
  }

  #[tokio::test]
  async fn session_expires_after_fixed_window() {
    let start = Utc::now();
    let (clock, now) = manual_clock(start);
    let store = Arc::new(MemoryStore::default());
    let auth = SessionAuthority::with_clock(Arc::clone(&store), Duration::minutes(30), clock);

    let grant = auth.establish(Uuid::new_v4()).await.unwrap();
    assert_eq!(grant.expires_at, start + Duration::minutes(30));

    *now.lock().unwrap() = start + Duration::minutes(29);
    assert!(auth.validate(Some(&grant.token)).await.unwrap().identity_id().is_some());

    *now.lock().unwrap() = start + Duration::minutes(30);
    assert_eq!(
      auth.validate(Some(&grant.token)).await.unwrap(),
      SessionLookup::NoActiveSession
    );
    assert!(store.session_keys().is_empty(), "expired session should be deleted");

    // Revoking an already-expired session still succeeds.
    auth.revoke(Some(&grant.token)).await.unwrap();
  }

  #[tokio::test]
  async fn expired_session_stays_inactive_when_delete_fails() {
    let start = Utc::now();
    let (clock, now) = manual_clock(start);
    let store = Arc::new(MemoryStore::default());
    let auth = SessionAuthority::with_clock(Arc::clone(&store), Duration::minutes(30), clock);
    let grant = auth.establish(Uuid::new_v4()).await.unwrap();

    store.fail_deletes();
    *now.lock().unwrap() = start + Duration::minutes(31);
    assert_eq!(
      auth.validate(Some(&grant.token)).await.unwrap(),
      SessionLookup::NoActiveSession
    );
    assert_eq!(store.session_keys().len(), 1);
  }

  #[tokio::test]
  async fn purge_removes_only_expired() {
    let start = Utc::now();
    let (clock, now) = manual_clock(start);
    let store = Arc::new(MemoryStore::default());
    let auth = SessionAuthority::with_clock(Arc::clone(&store), Duration::minutes(10), clock);

    auth.establish(Uuid::new_v4()).await.unwrap();
    *now.lock().unwrap() = start + Duration::minutes(5);
    let fresh = auth.establish(Uuid::new_v4()).await.unwrap();

    *now.lock().unwrap() = start + Duration::minutes(11);
    assert_eq!(auth.purge_expired().await.unwrap(), 1);
    assert!(auth.validate(Some(&fresh.token)).await.unwrap().identity_id().is_some());
  }
}
