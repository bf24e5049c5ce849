//! In-memory store used by this crate's unit tests.

use std::{
  collections::HashMap,
  sync::{Mutex, MutexGuard},
};

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::{
  identity::{IdentityRecord, NewIdentity},
  session::ServerSession,
  store::{IdentityStore, SessionStore, StoreFailure},
};

#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("duplicate email")]
  Duplicate,
  #[error("corrupted record")]
  Corrupted,
  #[error("store unavailable")]
  Unavailable,
}

impl StoreFailure for MemoryError {
  fn is_conflict(&self) -> bool { matches!(self, Self::Duplicate) }

  fn is_integrity(&self) -> bool { matches!(self, Self::Corrupted) }
}

#[derive(Default)]
struct Inner {
  identities: HashMap<Uuid, IdentityRecord>,
  sessions:   HashMap<String, ServerSession>,
  corrupted:  bool,
  no_deletes: bool,
}

#[derive(Default)]
pub struct MemoryStore {
  inner: Mutex<Inner>,
}

impl MemoryStore {
  fn lock(&self) -> MutexGuard<'_, Inner> { self.inner.lock().unwrap() }

  pub fn identity_count(&self) -> usize { self.lock().identities.len() }

  pub fn identity_by_email(&self, email: &str) -> Option<IdentityRecord> {
    self.lock().identities.values().find(|r| r.email == email).cloned()
  }

  pub fn remove_identity(&self, id: Uuid) { self.lock().identities.remove(&id); }

  pub fn session_keys(&self) -> Vec<String> { self.lock().sessions.keys().cloned().collect() }

  /// Make every subsequent session delete fail.
  pub fn fail_deletes(&self) { self.lock().no_deletes = true; }

  /// Make every subsequent identity read fail its integrity check.
  pub fn corrupt_all(&self) { self.lock().corrupted = true; }

  fn read(&self, pick: impl Fn(&IdentityRecord) -> bool) -> Result<Option<IdentityRecord>, MemoryError> {
    let inner = self.lock();
    match inner.identities.values().find(|r| pick(r)) {
      Some(_) if inner.corrupted => Err(MemoryError::Corrupted),
      found => Ok(found.cloned()),
    }
  }
}

impl IdentityStore for MemoryStore {
  type Error = MemoryError;

  async fn create_identity(&self, new: NewIdentity) -> Result<IdentityRecord, MemoryError> {
    let mut inner = self.lock();
    if inner.identities.values().any(|r| r.email == new.email) {
      return Err(MemoryError::Duplicate);
    }
    let record = IdentityRecord::from_new(Uuid::new_v4(), Utc::now(), new);
    inner.identities.insert(record.id, record.clone());
    Ok(record)
  }

  async fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>, MemoryError> {
    self.read(|r| r.email == email)
  }

  async fn get_identity(&self, id: Uuid) -> Result<Option<IdentityRecord>, MemoryError> {
    self.read(|r| r.id == id)
  }
}

impl SessionStore for MemoryStore {
  type Error = MemoryError;

  async fn insert_session(&self, session: ServerSession) -> Result<(), MemoryError> {
    self.lock().sessions.insert(session.token_digest.clone(), session);
    Ok(())
  }

  async fn get_session(&self, token_digest: &str) -> Result<Option<ServerSession>, MemoryError> {
    Ok(self.lock().sessions.get(token_digest).cloned())
  }

  async fn delete_session(&self, token_digest: &str) -> Result<(), MemoryError> {
    let mut inner = self.lock();
    if inner.no_deletes {
      return Err(MemoryError::Unavailable);
    }
    inner.sessions.remove(token_digest);
    Ok(())
  }

  async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, MemoryError> {
    let mut inner = self.lock();
    let before = inner.sessions.len();
    inner.sessions.retain(|_, s| !s.is_expired_at(now));
    Ok(before - inner.sessions.len())
  }
}
