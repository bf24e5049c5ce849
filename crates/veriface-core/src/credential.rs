//! Password hashing.
//!
//! Credentials are stored as argon2id PHC strings. Plaintext passwords never
//! reach the record store.

use std::sync::LazyLock;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use rand_core::OsRng;

use crate::{Error, Result};

/// Verified against when the email is unknown, so a miss costs the same as
/// a wrong password.
static DECOY_HASH: LazyLock<Option<String>> =
  LazyLock::new(|| hash_password("decoy-credential").ok());

/// Hash `password` with a fresh random salt.
pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| Error::Credential(e.to_string()))
}

/// Check `password` against a stored PHC string.
///
/// An unparseable hash counts as a mismatch.
pub fn verify_password(password: &str, phc: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(phc) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

/// Burn one verification against the decoy hash. Always `false`.
pub fn verify_decoy(password: &str) -> bool {
  if let Some(phc) = DECOY_HASH.as_deref() {
    let _ = verify_password(password, phc);
  }
  false
}
