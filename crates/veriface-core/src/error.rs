//! Error types for `veriface-core`.
//!
//! Every variant except [`Error::Store`] renders a message that is safe to
//! show to an end user.

use thiserror::Error;

use crate::store::StoreFailure;

#[derive(Debug, Error)]
pub enum Error {
  /// A required field was missing or malformed.
  #[error("{0}")]
  Validation(String),

  #[error("invalid date of birth: {0:?}")]
  InvalidDate(String),

  #[error("email already registered")]
  Conflict,

  /// Unknown email and wrong password both land here.
  #[error("invalid credentials")]
  InvalidCredentials,

  #[error("record integrity check failed")]
  Integrity,

  #[error("credential hashing failed: {0}")]
  Credential(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn validation(message: impl Into<String>) -> Self { Self::Validation(message.into()) }

  /// Map a backend failure onto the variants callers must tell apart.
  pub fn from_store<E: StoreFailure>(e: E) -> Self {
    if e.is_conflict() {
      Self::Conflict
    } else if e.is_integrity() {
      Self::Integrity
    } else {
      Self::Store(Box::new(e))
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
