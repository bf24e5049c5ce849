//! Startup errors for the server.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid configuration: {0}")]
  Config(String),

  #[error(transparent)]
  Store(#[from] veriface_store_sqlite::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
