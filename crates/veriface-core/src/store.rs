//! Storage traits for identity records and server sessions.
//!
//! Implemented by storage backends (e.g. `veriface-store-sqlite`). The
//! enrollment service and session authority depend on these abstractions,
//! never on a concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  identity::{IdentityRecord, NewIdentity},
  session::ServerSession,
};

// ─── Failure classification ──────────────────────────────────────────────────

/// Lets the services tell the failures they must report distinctly apart
/// from ordinary backend errors.
pub trait StoreFailure: std::error::Error + Send + Sync + 'static {
  /// A uniqueness constraint rejected the write.
  fn is_conflict(&self) -> bool;

  /// A stored record failed decryption or signature verification.
  fn is_integrity(&self) -> bool;
}

// ─── Identities ──────────────────────────────────────────────────────────────

/// Persistence for [`IdentityRecord`]s.
///
/// Implementations must enforce email uniqueness themselves: the service's
/// lookup before insert is only an early exit, and two concurrent creates with
/// the same email must not both succeed.
pub trait IdentityStore: Send + Sync {
  type Error: StoreFailure;

  /// Persist a new identity, assigning its `id` and `created_at`.
  ///
  /// Fails with a conflict error if `new.email` is already taken.
  fn create_identity(
    &self,
    new: NewIdentity,
  ) -> impl Future<Output = Result<IdentityRecord, Self::Error>> + Send + '_;

  /// Look up an identity by exact email. Returns `None` if absent.
  fn find_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<IdentityRecord>, Self::Error>> + Send + 'a;

  /// Retrieve an identity by id. Returns `None` if absent.
  fn get_identity(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<IdentityRecord>, Self::Error>> + Send + '_;
}

// ─── Sessions ────────────────────────────────────────────────────────────────

/// Persistence for [`ServerSession`]s, keyed by the token digest.
pub trait SessionStore: Send + Sync {
  type Error: StoreFailure;

  fn insert_session(
    &self,
    session: ServerSession,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_session<'a>(
    &'a self,
    token_digest: &'a str,
  ) -> impl Future<Output = Result<Option<ServerSession>, Self::Error>> + Send + 'a;

  /// Delete a session. Deleting an absent session is not an error.
  fn delete_session<'a>(
    &'a self,
    token_digest: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Delete every session that expired at or before `now`; returns how many.
  fn purge_expired(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
