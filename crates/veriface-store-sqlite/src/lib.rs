//! SQLite backend for the Veriface identity and session stores.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Identity rows are sealed field-by-field
//! with keys supplied at construction; see [`cipher`].

mod encode;
mod schema;
mod store;

pub mod cipher;
pub mod error;

pub use cipher::StoreKeys;
pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
