//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;
use veriface_core::{
  identity::{Coordinates, NewIdentity},
  session::ServerSession,
  store::{IdentityStore, SessionStore},
};

use crate::{Error, SqliteStore, StoreKeys};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory(StoreKeys::generate())
    .await
    .expect("in-memory store")
}

fn new_identity(email: &str) -> NewIdentity {
  NewIdentity {
    full_name:       "Asha Rao".to_owned(),
    date_of_birth:   NaiveDate::from_ymd_opt(1990, 6, 15).unwrap(),
    address:         "12 Lake Road, Pune".to_owned(),
    email:           email.to_owned(),
    password_secret: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_owned(),
    document_image:  (0u8..=255).collect(),
    selfie_image:    vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10],
    wallet_address:  Some("0x123abc456def".to_owned()),
    coordinates:     Some(Coordinates { lat: Some(18.52), lng: Some(73.85) }),
  }
}

/// Read the raw `sealed` column for `email`.
async fn raw_sealed(s: &SqliteStore, email: &str) -> Vec<u8> {
  let email = email.to_owned();
  s.conn
    .call(move |conn| {
      Ok(conn.query_row(
        "SELECT sealed FROM identities WHERE email = ?1",
        rusqlite::params![email],
        |r| r.get(0),
      )?)
    })
    .await
    .unwrap()
}

async fn overwrite_sealed(s: &SqliteStore, email: &str, sealed: Vec<u8>) {
  let email = email.to_owned();
  s.conn
    .call(move |conn| {
      conn.execute(
        "UPDATE identities SET sealed = ?1 WHERE email = ?2",
        rusqlite::params![sealed, email],
      )?;
      Ok(())
    })
    .await
    .unwrap();
}

async fn execute(s: &SqliteStore, sql: &'static str) {
  s.conn
    .call(move |conn| {
      conn.execute_batch(sql)?;
      Ok(())
    })
    .await
    .unwrap();
}

// ─── Identities: round trip ──────────────────────────────────────────────────

#[tokio::test]
async fn create_and_read_back_identical_fields() {
  let s = store().await;
  let created = s.create_identity(new_identity("asha@example.com")).await.unwrap();

  let by_email = s.find_by_email("asha@example.com").await.unwrap().unwrap();
  assert_eq!(by_email, created);
  assert_eq!(by_email.document_image, (0u8..=255).collect::<Vec<_>>());
  assert_eq!(by_email.selfie_image, vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]);

  let by_id = s.get_identity(created.id).await.unwrap().unwrap();
  assert_eq!(by_id, created);
}

#[tokio::test]
async fn optional_fields_survive_as_none() {
  let s = store().await;
  let mut new = new_identity("bare@example.com");
  new.wallet_address = None;
  new.coordinates = None;
  let created = s.create_identity(new).await.unwrap();

  let back = s.get_identity(created.id).await.unwrap().unwrap();
  assert_eq!(back.wallet_address, None);
  assert_eq!(back.coordinates, None);
}

#[tokio::test]
async fn missing_identity_returns_none() {
  let s = store().await;
  assert!(s.find_by_email("nobody@example.com").await.unwrap().is_none());
  assert!(s.get_identity(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn email_lookup_is_case_sensitive() {
  let s = store().await;
  s.create_identity(new_identity("asha@example.com")).await.unwrap();
  assert!(s.find_by_email("ASHA@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn reopening_a_file_store_with_same_keys_reads_records() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("veriface.db");
  let keys = StoreKeys::generate();

  let id = {
    let s = SqliteStore::open(&path, keys.clone()).await.unwrap();
    s.create_identity(new_identity("asha@example.com")).await.unwrap().id
  };

  let s = SqliteStore::open(&path, keys).await.unwrap();
  assert_eq!(s.get_identity(id).await.unwrap().unwrap().full_name, "Asha Rao");
}

// ─── Identities: uniqueness ──────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_email_is_rejected() {
  let s = store().await;
  s.create_identity(new_identity("asha@example.com")).await.unwrap();

  let second = s.create_identity(new_identity("asha@example.com")).await;
  assert!(matches!(second, Err(Error::DuplicateEmail)));
}

#[tokio::test]
async fn concurrent_duplicate_creates_succeed_once() {
  let s = store().await;
  let (a, b) = tokio::join!(
    s.create_identity(new_identity("race@example.com")),
    s.create_identity(new_identity("race@example.com")),
  );
  assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);

  let rows: i64 = s
    .conn
    .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM identities", [], |r| r.get(0))?))
    .await
    .unwrap();
  assert_eq!(rows, 1);
}

// ─── Identities: encryption at rest ──────────────────────────────────────────

#[tokio::test]
async fn protected_fields_are_not_stored_in_clear() {
  let s = store().await;
  s.create_identity(new_identity("asha@example.com")).await.unwrap();

  let sealed = raw_sealed(&s, "asha@example.com").await;
  for needle in [&b"Asha Rao"[..], b"Lake Road", b"$argon2id", b"0x123abc", b"1990-06-15"] {
    assert!(
      !sealed.windows(needle.len()).any(|w| w == needle),
      "found {:?} in sealed blob",
      String::from_utf8_lossy(needle)
    );
  }
}

#[tokio::test]
async fn tampered_ciphertext_fails_integrity() {
  let s = store().await;
  let created = s.create_identity(new_identity("asha@example.com")).await.unwrap();

  let mut sealed = raw_sealed(&s, "asha@example.com").await;
  let last = sealed.len() - 1;
  sealed[last] ^= 0x01;
  overwrite_sealed(&s, "asha@example.com", sealed).await;

  assert!(matches!(s.find_by_email("asha@example.com").await, Err(Error::Integrity(_))));
  assert!(matches!(s.get_identity(created.id).await, Err(Error::Integrity(id)) if id == created.id));
}

#[tokio::test]
async fn edited_email_column_fails_integrity() {
  let s = store().await;
  s.create_identity(new_identity("asha@example.com")).await.unwrap();
  execute(
    &s,
    "UPDATE identities SET email = 'mallory@example.com' WHERE email = 'asha@example.com'",
  )
  .await;

  assert!(matches!(
    s.find_by_email("mallory@example.com").await,
    Err(Error::Integrity(_))
  ));
}

#[tokio::test]
async fn swapped_blobs_fail_integrity() {
  let s = store().await;
  s.create_identity(new_identity("a@example.com")).await.unwrap();
  s.create_identity(new_identity("b@example.com")).await.unwrap();

  let a = raw_sealed(&s, "a@example.com").await;
  overwrite_sealed(&s, "b@example.com", a).await;

  assert!(matches!(s.find_by_email("b@example.com").await, Err(Error::Integrity(_))));
  assert!(s.find_by_email("a@example.com").await.unwrap().is_some());
}

#[tokio::test]
async fn wrong_keys_fail_integrity() {
  let s = store().await;
  s.create_identity(new_identity("asha@example.com")).await.unwrap();

  let other = s.with_keys(StoreKeys::generate()).unwrap();
  assert!(matches!(other.find_by_email("asha@example.com").await, Err(Error::Integrity(_))));
}

// ─── Sessions ────────────────────────────────────────────────────────────────

fn session(digest: &str, expires_in: Duration) -> ServerSession {
  let now = Utc::now();
  ServerSession {
    token_digest: digest.to_owned(),
    identity_id:  Uuid::new_v4(),
    created_at:   now,
    expires_at:   now + expires_in,
  }
}

#[tokio::test]
async fn session_insert_get_delete() {
  let s = store().await;
  let sess = session("abc", Duration::hours(1));
  s.insert_session(sess.clone()).await.unwrap();

  let fetched = s.get_session("abc").await.unwrap().unwrap();
  assert_eq!(fetched.identity_id, sess.identity_id);
  // Stored at microsecond precision.
  assert_eq!((fetched.expires_at - sess.expires_at).num_milliseconds(), 0);

  s.delete_session("abc").await.unwrap();
  assert!(s.get_session("abc").await.unwrap().is_none());

  // Deleting again is fine.
  s.delete_session("abc").await.unwrap();
}

#[tokio::test]
async fn purge_expired_keeps_live_sessions() {
  let s = store().await;
  s.insert_session(session("old", Duration::seconds(-5))).await.unwrap();
  s.insert_session(session("new", Duration::hours(1))).await.unwrap();

  assert_eq!(s.purge_expired(Utc::now()).await.unwrap(), 1);
  assert!(s.get_session("old").await.unwrap().is_none());
  assert!(s.get_session("new").await.unwrap().is_some());
}
