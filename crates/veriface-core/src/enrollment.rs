//! The enrollment service: signup, login and session lookup.
//!
//! Turns a verified capture plus a user-chosen password into a persisted
//! [`IdentityRecord`](crate::identity::IdentityRecord) and an active session.
//! Errors leaving this module are always one of the user-safe variants of
//! [`Error`]; backend detail stays inside [`Error::Store`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  credential::{hash_password, verify_decoy, verify_password},
  dob::normalize_dob,
  identity::{Coordinates, IdentityProfile, IdentityView, NewIdentity},
  session::{SessionAuthority, SessionGrant, SessionLookup, SessionToken},
  store::{IdentityStore, SessionStore},
};

// ─── Inputs and outputs ──────────────────────────────────────────────────────

/// Everything a signup submits.
#[derive(Debug, Clone, Default)]
pub struct EnrollmentRequest {
  pub profile:        IdentityProfile,
  pub email:          String,
  pub password:       String,
  pub document_image: Vec<u8>,
  pub selfie_image:   Vec<u8>,
  pub wallet_address: Option<String>,
  pub coordinates:    Option<Coordinates>,
}

/// A successful signup or login: the sanitised identity plus its new session.
#[derive(Debug, Clone)]
pub struct Authenticated {
  pub identity: IdentityView,
  pub session:  SessionGrant,
}

/// Login credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
  pub email:    String,
  pub password: String,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct EnrollmentService<S, T> {
  identities: Arc<S>,
  sessions:   SessionAuthority<T>,
}

impl<S, T> Clone for EnrollmentService<S, T> {
  fn clone(&self) -> Self {
    Self {
      identities: Arc::clone(&self.identities),
      sessions:   self.sessions.clone(),
    }
  }
}

impl<S, T> EnrollmentService<S, T>
where
  S: IdentityStore,
  T: SessionStore,
{
  pub fn new(identities: Arc<S>, sessions: SessionAuthority<T>) -> Self {
    Self { identities, sessions }
  }

  pub fn sessions(&self) -> &SessionAuthority<T> { &self.sessions }

  /// Create a new identity and log it in.
  ///
  /// Validation and date normalisation happen before any store access. The
  /// email lookup is an early exit only; the store's own uniqueness
  /// constraint decides concurrent races.
  pub async fn enroll(&self, request: EnrollmentRequest) -> Result<Authenticated> {
    let new = self.prepare(request)?;

    if self
      .identities
      .find_by_email(&new.email)
      .await
      .map_err(|e| self.store_failure(e))?
      .is_some()
    {
      tracing::info!("signup rejected: email already registered");
      return Err(Error::Conflict);
    }

    let record = self
      .identities
      .create_identity(new)
      .await
      .map_err(|e| self.store_failure(e))?;

    let session = self.sessions.establish(record.id).await?;
    tracing::info!(identity_id = %record.id, "identity enrolled");

    Ok(Authenticated { identity: record.view(), session })
  }

  /// Log in an existing identity.
  ///
  /// Unknown email and wrong password are indistinguishable to the caller.
  pub async fn authenticate(&self, credentials: &Credentials) -> Result<Authenticated> {
    if credentials.email.trim().is_empty() || credentials.password.is_empty() {
      return Err(Error::validation("email and password are required"));
    }

    let record = self
      .identities
      .find_by_email(&credentials.email)
      .await
      .map_err(|e| self.store_failure(e))?;

    let Some(record) = record else {
      verify_decoy(&credentials.password);
      tracing::warn!("login rejected");
      return Err(Error::InvalidCredentials);
    };

    if !verify_password(&credentials.password, &record.password_secret) {
      tracing::warn!("login rejected");
      return Err(Error::InvalidCredentials);
    }

    let session = self.sessions.establish(record.id).await?;
    tracing::info!(identity_id = %record.id, "login succeeded");

    Ok(Authenticated { identity: record.view(), session })
  }

  /// The identity behind `token`, or `None` if there is no active session.
  ///
  /// A session whose identity has since been deleted is revoked.
  pub async fn current_identity(
    &self,
    token: Option<&SessionToken>,
  ) -> Result<Option<IdentityView>> {
    let SessionLookup::Active { identity_id, .. } = self.sessions.validate(token).await? else {
      return Ok(None);
    };

    match self
      .identities
      .get_identity(identity_id)
      .await
      .map_err(|e| self.store_failure(e))?
    {
      Some(record) => Ok(Some(record.view())),
      None => {
        tracing::info!(%identity_id, "revoking session for missing identity");
        self.sessions.revoke(token).await?;
        Ok(None)
      }
    }
  }

  /// Log out. Succeeds even if the session is already gone.
  pub async fn end_session(&self, token: Option<&SessionToken>) -> Result<()> {
    self.sessions.revoke(token).await
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  fn prepare(&self, request: EnrollmentRequest) -> Result<NewIdentity> {
    let EnrollmentRequest {
      profile,
      email,
      password,
      document_image,
      selfie_image,
      wallet_address,
      coordinates,
    } = request;

    let required = [
      ("full name", profile.full_name.trim().is_empty()),
      ("date of birth", profile.date_of_birth.trim().is_empty()),
      ("email", email.trim().is_empty()),
      ("password", password.is_empty()),
      ("document image", document_image.is_empty()),
      ("selfie image", selfie_image.is_empty()),
    ];
    let missing: Vec<&str> = required
      .iter()
      .filter(|(_, absent)| *absent)
      .map(|(name, _)| *name)
      .collect();
    if !missing.is_empty() {
      return Err(Error::validation(format!(
        "missing required fields: {}",
        missing.join(", ")
      )));
    }

    if !email.contains('@') {
      return Err(Error::validation("email address is malformed"));
    }

    let date_of_birth = normalize_dob(&profile.date_of_birth)?;
    let password_secret = hash_password(&password)?;

    Ok(NewIdentity {
      full_name: profile.full_name.trim().to_owned(),
      date_of_birth,
      address: profile.address.trim().to_owned(),
      email,
      password_secret,
      document_image,
      selfie_image,
      wallet_address: wallet_address.filter(|w| !w.trim().is_empty()),
      coordinates: coordinates.filter(|c| !c.is_empty()),
    })
  }

  fn store_failure<E: crate::store::StoreFailure>(&self, e: E) -> Error {
    let err = Error::from_store(e);
    if let Error::Integrity = err {
      tracing::error!("identity record failed integrity verification");
    }
    err
  }
}
