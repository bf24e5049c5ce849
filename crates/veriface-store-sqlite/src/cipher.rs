//! Field-level sealing for identity rows.
//!
//! Protected fields are serialised together, encrypted with XChaCha20-Poly1305
//! under the encryption key, and the resulting blob is signed with
//! HMAC-SHA512 under a separate signing key. The signature covers the row id,
//! the clear-text email and the sealed blob, so moving a blob between rows or
//! editing the email column is detected on read.
//!
//! Sealed layout: `nonce (24 bytes) || ciphertext+tag`.

use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use chacha20poly1305::{
  XChaCha20Poly1305, XNonce,
  aead::{Aead, KeyInit, Payload},
};
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha2::Sha512;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Error, Result};

type HmacSha512 = Hmac<Sha512>;

pub const ENCRYPTION_KEY_LEN: usize = 32;
pub const SIGNING_KEY_LEN: usize = 64;
const NONCE_LEN: usize = 24;

// ─── Keys ────────────────────────────────────────────────────────────────────

/// Symmetric key material for the record store. Zeroised on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct StoreKeys {
  encryption: [u8; ENCRYPTION_KEY_LEN],
  signing:    [u8; SIGNING_KEY_LEN],
}

impl StoreKeys {
  pub const fn from_bytes(
    encryption: [u8; ENCRYPTION_KEY_LEN],
    signing: [u8; SIGNING_KEY_LEN],
  ) -> Self {
    Self { encryption, signing }
  }

  /// Decode a base64 encryption key (32 bytes) and signing key (64 bytes).
  pub fn from_base64(encryption: &str, signing: &str) -> Result<Self> {
    Ok(Self {
      encryption: decode_key(encryption.trim(), "encryption")?,
      signing:    decode_key(signing.trim(), "signing")?,
    })
  }

  /// Fresh random keys.
  pub fn generate() -> Self {
    let mut keys = Self { encryption: [0; ENCRYPTION_KEY_LEN], signing: [0; SIGNING_KEY_LEN] };
    OsRng.fill_bytes(&mut keys.encryption);
    OsRng.fill_bytes(&mut keys.signing);
    keys
  }

  /// Base64 `(encryption, signing)` pair, for writing into configuration.
  pub fn to_base64(&self) -> (String, String) {
    (B64.encode(self.encryption), B64.encode(self.signing))
  }
}

impl std::fmt::Debug for StoreKeys {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StoreKeys")
      .field("encryption", &"[REDACTED]")
      .field("signing", &"[REDACTED]")
      .finish()
  }
}

fn decode_key<const N: usize>(encoded: &str, which: &str) -> Result<[u8; N]> {
  let mut bytes = B64
    .decode(encoded)
    .map_err(|e| Error::Key(format!("{which} key is not valid base64: {e}")))?;
  let key: [u8; N] = bytes.as_slice().try_into().map_err(|_| {
    Error::Key(format!("{which} key must be {N} bytes, got {}", bytes.len()))
  })?;
  bytes.zeroize();
  Ok(key)
}

// ─── Cipher ──────────────────────────────────────────────────────────────────

pub struct FieldCipher {
  aead: XChaCha20Poly1305,
  keys: StoreKeys,
}

impl FieldCipher {
  pub fn new(keys: StoreKeys) -> Result<Self> {
    let aead = XChaCha20Poly1305::new_from_slice(&keys.encryption)
      .map_err(|e| Error::Key(e.to_string()))?;
    Ok(Self { aead, keys })
  }

  /// Encrypt `plaintext`, binding it to the row `id`.
  pub fn seal(&self, id: Uuid, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let ciphertext = self
      .aead
      .encrypt(XNonce::from_slice(&nonce), Payload { msg: plaintext, aad: id.as_bytes() })
      .map_err(|_| Error::Encoding("encryption failed".to_owned()))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(sealed)
  }

  /// Decrypt a blob produced by [`seal`](Self::seal) for the same `id`.
  pub fn open(&self, id: Uuid, sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN {
      return Err(Error::Integrity(id));
    }
    let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);
    self
      .aead
      .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad: id.as_bytes() })
      .map_err(|_| Error::Integrity(id))
  }

  pub fn sign(&self, id: Uuid, email: &str, sealed: &[u8]) -> Result<Vec<u8>> {
    Ok(self.mac(id, email, sealed)?.finalize().into_bytes().to_vec())
  }

  /// Constant-time check of a row signature.
  pub fn verify(&self, id: Uuid, email: &str, sealed: &[u8], signature: &[u8]) -> Result<()> {
    self
      .mac(id, email, sealed)?
      .verify_slice(signature)
      .map_err(|_| Error::Integrity(id))
  }

  fn mac(&self, id: Uuid, email: &str, sealed: &[u8]) -> Result<HmacSha512> {
    let mut mac = <HmacSha512 as Mac>::new_from_slice(&self.keys.signing)
      .map_err(|e| Error::Key(e.to_string()))?;
    // Length prefixes keep the field boundaries unambiguous.
    for part in [id.as_bytes().as_slice(), email.as_bytes(), sealed] {
      mac.update(&(part.len() as u64).to_be_bytes());
      mac.update(part);
    }
    Ok(mac)
  }
}
