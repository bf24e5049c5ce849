//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order matches chronological order
//! in `WHERE expires_at <= ?` comparisons. UUIDs are hyphenated lowercase.
//! Protected identity fields travel as one CBOR document inside the sealed
//! blob.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use veriface_core::{
  identity::{Coordinates, IdentityRecord},
  session::ServerSession,
};

use crate::{Error, Result, cipher::FieldCipher};

/// Bumped whenever [`ProtectedFields`] changes shape.
const PROTECTED_VERSION: u32 = 1;

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Protected fields ────────────────────────────────────────────────────────

/// Every identity field that is encrypted at rest.
#[derive(Debug, Serialize, Deserialize)]
struct ProtectedFields {
  version:         u32,
  full_name:       String,
  date_of_birth:   NaiveDate,
  address:         String,
  password_secret: String,
  document_image:  Vec<u8>,
  selfie_image:    Vec<u8>,
  wallet_address:  Option<String>,
  created_at:      DateTime<Utc>,
  coordinates:     Option<Coordinates>,
}

/// The columns written for one identity row.
pub struct SealedIdentity {
  pub identity_id: String,
  pub email:       String,
  pub sealed:      Vec<u8>,
  pub signature:   Vec<u8>,
}

impl SealedIdentity {
  pub fn seal(record: &IdentityRecord, cipher: &FieldCipher) -> Result<Self> {
    let fields = ProtectedFields {
      version:         PROTECTED_VERSION,
      full_name:       record.full_name.clone(),
      date_of_birth:   record.date_of_birth,
      address:         record.address.clone(),
      password_secret: record.password_secret.clone(),
      document_image:  record.document_image.clone(),
      selfie_image:    record.selfie_image.clone(),
      wallet_address:  record.wallet_address.clone(),
      created_at:      record.created_at,
      coordinates:     record.coordinates,
    };

    let mut plaintext = Vec::new();
    ciborium::ser::into_writer(&fields, &mut plaintext)
      .map_err(|e| Error::Encoding(e.to_string()))?;

    let sealed = cipher.seal(record.id, &plaintext)?;
    let signature = cipher.sign(record.id, &record.email, &sealed)?;

    Ok(Self {
      identity_id: encode_uuid(record.id),
      email: record.email.clone(),
      sealed,
      signature,
    })
  }

  /// Verify, decrypt and decode a stored row.
  ///
  /// A bad signature or failed decryption is [`Error::Integrity`]; it is
  /// never reported as a missing row.
  pub fn open(self, cipher: &FieldCipher) -> Result<IdentityRecord> {
    let id = decode_uuid(&self.identity_id)?;
    cipher.verify(id, &self.email, &self.sealed, &self.signature)?;
    let plaintext = cipher.open(id, &self.sealed)?;

    let fields: ProtectedFields = ciborium::de::from_reader(plaintext.as_slice())
      .map_err(|e| Error::Encoding(e.to_string()))?;
    if fields.version != PROTECTED_VERSION {
      return Err(Error::Encoding(format!(
        "unsupported protected-field version {}",
        fields.version
      )));
    }

    Ok(IdentityRecord {
      id,
      full_name: fields.full_name,
      date_of_birth: fields.date_of_birth,
      address: fields.address,
      email: self.email,
      password_secret: fields.password_secret,
      document_image: fields.document_image,
      selfie_image: fields.selfie_image,
      wallet_address: fields.wallet_address,
      created_at: fields.created_at,
      coordinates: fields.coordinates,
    })
  }
}

// ─── Sessions ────────────────────────────────────────────────────────────────

/// Raw strings read directly from a `sessions` row.
pub struct RawSession {
  pub token_digest: String,
  pub identity_id:  String,
  pub created_at:   String,
  pub expires_at:   String,
}

impl RawSession {
  pub fn into_session(self) -> Result<ServerSession> {
    Ok(ServerSession {
      token_digest: self.token_digest,
      identity_id:  decode_uuid(&self.identity_id)?,
      created_at:   decode_dt(&self.created_at)?,
      expires_at:   decode_dt(&self.expires_at)?,
    })
  }
}
