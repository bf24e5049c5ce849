//! Core types, traits and services for the Veriface enrollment pipeline.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! store backend, the JSON API and the capture client all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod credential;
pub mod dob;
pub mod enrollment;
pub mod error;
pub mod identity;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
