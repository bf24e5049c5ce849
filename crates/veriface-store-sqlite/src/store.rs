//! [`SqliteStore`], the SQLite implementation of [`IdentityStore`] and
//! [`SessionStore`].

use std::{path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;
use veriface_core::{
  identity::{IdentityRecord, NewIdentity},
  session::ServerSession,
  store::{IdentityStore, SessionStore},
};

use crate::{
  Error, Result,
  cipher::{FieldCipher, StoreKeys},
  encode::{RawSession, SealedIdentity, encode_dt, encode_uuid},
  schema::SCHEMA,
};

const SELECT_IDENTITY: &str = "SELECT identity_id, email, sealed, signature FROM identities";

// ─── Store ───────────────────────────────────────────────────────────────────

/// An encrypted identity store backed by a single SQLite file.
///
/// Cloning is cheap: the connection and the cipher are reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
  cipher:          Arc<FieldCipher>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>, keys: StoreKeys) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, keys).await
  }

  /// Open an in-memory store.
  pub async fn open_in_memory(keys: StoreKeys) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, keys).await
  }

  async fn init(conn: tokio_rusqlite::Connection, keys: StoreKeys) -> Result<Self> {
    let store = Self { conn, cipher: Arc::new(FieldCipher::new(keys)?) };
    store
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(store)
  }

  /// A second handle on the same database using different keys.
  #[cfg(test)]
  pub(crate) fn with_keys(&self, keys: StoreKeys) -> Result<Self> {
    Ok(Self { conn: self.conn.clone(), cipher: Arc::new(FieldCipher::new(keys)?) })
  }

  /// Fetch one sealed identity row matching `column = value`.
  async fn select_sealed(
    &self,
    column: &'static str,
    value: String,
  ) -> Result<Option<SealedIdentity>> {
    let sql = format!("{SELECT_IDENTITY} WHERE {column} = ?1");
    let raw = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql, rusqlite::params![value], |row| {
            Ok(SealedIdentity {
              identity_id: row.get(0)?,
              email:       row.get(1)?,
              sealed:      row.get(2)?,
              signature:   row.get(3)?,
            })
          })
          .optional()?)
      })
      .await?;
    Ok(raw)
  }

  fn open_sealed(&self, sealed: Option<SealedIdentity>) -> Result<Option<IdentityRecord>> {
    sealed
      .map(|row| {
        let id = row.identity_id.clone();
        row.open(&self.cipher).inspect_err(|e| {
          if let Error::Integrity(_) = e {
            tracing::error!(identity_id = %id, "identity row failed integrity verification");
          }
        })
      })
      .transpose()
  }
}

// ─── IdentityStore impl ──────────────────────────────────────────────────────

impl IdentityStore for SqliteStore {
  type Error = Error;

  async fn create_identity(&self, new: NewIdentity) -> Result<IdentityRecord> {
    let record = IdentityRecord::from_new(Uuid::new_v4(), Utc::now(), new);
    let row = SealedIdentity::seal(&record, &self.cipher)?;

    let inserted = self
      .conn
      .call(move |conn| {
        let result = conn.execute(
          "INSERT INTO identities (identity_id, email, sealed, signature)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![row.identity_id, row.email, row.sealed, row.signature],
        );
        match result {
          Ok(_) => Ok(true),
          Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
          {
            Ok(false)
          }
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(Error::DuplicateEmail);
    }

    tracing::debug!(identity_id = %record.id, "identity row written");
    Ok(record)
  }

  async fn find_by_email(&self, email: &str) -> Result<Option<IdentityRecord>> {
    let row = self.select_sealed("email", email.to_owned()).await?;
    self.open_sealed(row)
  }

  async fn get_identity(&self, id: Uuid) -> Result<Option<IdentityRecord>> {
    let row = self.select_sealed("identity_id", encode_uuid(id)).await?;
    self.open_sealed(row)
  }
}

// ─── SessionStore impl ───────────────────────────────────────────────────────

impl SessionStore for SqliteStore {
  type Error = Error;

  async fn insert_session(&self, session: ServerSession) -> Result<()> {
    let id_str = encode_uuid(session.identity_id);
    let created = encode_dt(session.created_at);
    let expires = encode_dt(session.expires_at);
    let digest = session.token_digest;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (token_digest, identity_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![digest, id_str, created, expires],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_session(&self, token_digest: &str) -> Result<Option<ServerSession>> {
    let digest = token_digest.to_owned();

    let raw: Option<RawSession> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT token_digest, identity_id, created_at, expires_at
             FROM sessions WHERE token_digest = ?1",
            rusqlite::params![digest],
            |row| {
              Ok(RawSession {
                token_digest: row.get(0)?,
                identity_id:  row.get(1)?,
                created_at:   row.get(2)?,
                expires_at:   row.get(3)?,
              })
            },
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSession::into_session).transpose()
  }

  async fn delete_session(&self, token_digest: &str) -> Result<()> {
    let digest = token_digest.to_owned();
    self
      .conn
      .call(move |conn| {
        conn.execute("DELETE FROM sessions WHERE token_digest = ?1", rusqlite::params![digest])?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
    let now_str = encode_dt(now);
    let purged = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM sessions WHERE expires_at <= ?1", rusqlite::params![now_str])?)
      })
      .await?;
    if purged > 0 {
      tracing::info!(purged, "expired sessions purged");
    }
    Ok(purged)
  }
}
