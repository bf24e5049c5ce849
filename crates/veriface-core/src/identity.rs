//! Identity records, one per enrolled person.
//!
//! An [`IdentityRecord`] is written exactly once by the enrollment service and
//! never updated by this crate afterwards. Callers outside the trust boundary
//! only ever see the sanitised [`IdentityView`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Geolocation ─────────────────────────────────────────────────────────────

/// Best-effort geolocation captured at signup. Either half may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
  pub lat: Option<f64>,
  pub lng: Option<f64>,
}

impl Coordinates {
  pub fn is_empty(&self) -> bool { self.lat.is_none() && self.lng.is_none() }
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// The personal details extracted by the verification gateway.
///
/// `date_of_birth` is kept as the raw string the gateway (or the user)
/// supplied; it is normalised by the enrollment service, not here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityProfile {
  pub full_name:     String,
  pub date_of_birth: String,
  pub address:       String,
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Everything needed to persist a new identity. The store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone)]
pub struct NewIdentity {
  pub full_name:       String,
  pub date_of_birth:   NaiveDate,
  pub address:         String,
  pub email:           String,
  /// Argon2 PHC string; never the plaintext password.
  pub password_secret: String,
  pub document_image:  Vec<u8>,
  pub selfie_image:    Vec<u8>,
  pub wallet_address:  Option<String>,
  pub coordinates:     Option<Coordinates>,
}

/// A persisted identity, fully decrypted.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityRecord {
  pub id:              Uuid,
  pub full_name:       String,
  pub date_of_birth:   NaiveDate,
  pub address:         String,
  pub email:           String,
  pub password_secret: String,
  pub document_image:  Vec<u8>,
  pub selfie_image:    Vec<u8>,
  pub wallet_address:  Option<String>,
  pub created_at:      DateTime<Utc>,
  pub coordinates:     Option<Coordinates>,
}

impl IdentityRecord {
  /// Build the record a store will persist for `new`.
  pub fn from_new(id: Uuid, created_at: DateTime<Utc>, new: NewIdentity) -> Self {
    Self {
      id,
      full_name: new.full_name,
      date_of_birth: new.date_of_birth,
      address: new.address,
      email: new.email,
      password_secret: new.password_secret,
      document_image: new.document_image,
      selfie_image: new.selfie_image,
      wallet_address: new.wallet_address,
      created_at,
      coordinates: new.coordinates,
    }
  }

  /// Strip the credential and both images.
  pub fn view(&self) -> IdentityView {
    IdentityView {
      id:             self.id,
      full_name:      self.full_name.clone(),
      date_of_birth:  self.date_of_birth,
      address:        self.address.clone(),
      email:          self.email.clone(),
      wallet_address: self.wallet_address.clone(),
      created_at:     self.created_at,
      coordinates:    self.coordinates,
    }
  }
}

/// The sanitised projection of an [`IdentityRecord`] handed back to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityView {
  pub id:             Uuid,
  pub full_name:      String,
  pub date_of_birth:  NaiveDate,
  pub address:        String,
  pub email:          String,
  pub wallet_address: Option<String>,
  pub created_at:     DateTime<Utc>,
  pub coordinates:    Option<Coordinates>,
}
