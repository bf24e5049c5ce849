//! SQL schema for the Veriface SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per enrolled identity. Everything except the id and the email is
-- inside `sealed`; `signature` covers id, email and sealed.
-- Rows are never updated by this service.
CREATE TABLE IF NOT EXISTS identities (
    identity_id TEXT PRIMARY KEY,
    email       TEXT NOT NULL UNIQUE,  -- clear text: lookup and uniqueness key
    sealed      BLOB NOT NULL,         -- nonce || XChaCha20-Poly1305 ciphertext
    signature   BLOB NOT NULL          -- HMAC-SHA512
);

CREATE TABLE IF NOT EXISTS sessions (
    token_digest TEXT PRIMARY KEY,     -- SHA-256 of the cookie token, hex
    identity_id  TEXT NOT NULL,
    created_at   TEXT NOT NULL,        -- fixed-width RFC 3339 UTC
    expires_at   TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS sessions_expiry_idx ON sessions(expires_at);

PRAGMA user_version = 1;
";
