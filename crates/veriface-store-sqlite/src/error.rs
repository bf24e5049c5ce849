//! Error type for `veriface-store-sqlite`.

use thiserror::Error;
use veriface_core::store::StoreFailure;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("invalid key material: {0}")]
  Key(String),

  #[error("encoding error: {0}")]
  Encoding(String),

  /// The UNIQUE constraint on `identities.email` rejected an insert.
  #[error("email already registered")]
  DuplicateEmail,

  /// Decryption or signature verification failed for a stored row.
  #[error("identity {0} failed integrity verification")]
  Integrity(uuid::Uuid),
}

impl StoreFailure for Error {
  fn is_conflict(&self) -> bool { matches!(self, Self::DuplicateEmail) }

  fn is_integrity(&self) -> bool { matches!(self, Self::Integrity(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
