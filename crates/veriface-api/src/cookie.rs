//! Session cookie encoding and extraction.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, HeaderValue, header, request::Parts},
};
use thiserror::Error;
use veriface_core::session::{SessionGrant, SessionToken};

use crate::{AppState, error::ApiError};

pub const DEFAULT_COOKIE_NAME: &str = "veriface_session";

/// The configured cookie name is not an RFC 6265 token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cookie name {0:?}: must be a non-empty RFC 6265 token")]
pub struct InvalidCookieName(pub String);

/// How the session cookie is written.
#[derive(Debug, Clone)]
pub struct CookieConfig {
  name:   String,
  /// Add the `Secure` attribute. Off for plain-HTTP development setups.
  secure: bool,
}

impl Default for CookieConfig {
  fn default() -> Self { Self { name: DEFAULT_COOKIE_NAME.to_owned(), secure: false } }
}

/// RFC 6265 `cookie-name`: visible ASCII without separators.
fn is_token(name: &str) -> bool {
  !name.is_empty()
    && name.bytes().all(|b| {
      b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?={}".contains(&b)
    })
}

impl CookieConfig {
  pub fn new(name: impl Into<String>, secure: bool) -> Result<Self, InvalidCookieName> {
    let name = name.into();
    if !is_token(&name) {
      return Err(InvalidCookieName(name));
    }
    Ok(Self { name, secure })
  }

  pub fn name(&self) -> &str { &self.name }

  pub fn secure(&self) -> bool { self.secure }

  /// `Set-Cookie` value carrying a freshly issued session.
  pub fn issue(&self, grant: &SessionGrant) -> Result<HeaderValue, ApiError> {
    self.render(grant.token.as_str(), grant.max_age.num_seconds().max(0))
  }

  /// `Set-Cookie` value that makes the client drop the session cookie.
  pub fn clear(&self) -> Result<HeaderValue, ApiError> { self.render("", 0) }

  fn render(&self, value: &str, max_age: i64) -> Result<HeaderValue, ApiError> {
    let mut cookie =
      format!("{}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}", self.name);
    if self.secure {
      cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
      .map_err(|_| ApiError::Internal(format!("cookie {:?} cannot be encoded", self.name)))
  }

  /// The session token from the request's `Cookie` headers, if any.
  pub fn token_from(&self, headers: &HeaderMap) -> Option<SessionToken> {
    headers
      .get_all(header::COOKIE)
      .iter()
      .filter_map(|v| v.to_str().ok())
      .flat_map(|v| v.split(';'))
      .filter_map(|pair| pair.trim().split_once('='))
      .find(|(name, value)| *name == self.name && !value.is_empty())
      .map(|(_, value)| SessionToken::from(value))
  }
}

// ─── Extractor ────────────────────────────────────────────────────────────────

/// The caller's session token, or `None` when no cookie was sent.
pub struct SessionCookie(pub Option<SessionToken>);

impl SessionCookie {
  pub fn token(&self) -> Option<&SessionToken> { self.0.as_ref() }
}

impl<S, T> FromRequestParts<AppState<S, T>> for SessionCookie
where
  S: Send + Sync,
  T: Send + Sync,
{
  type Rejection = std::convert::Infallible;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, T>,
  ) -> Result<Self, Self::Rejection> {
    Ok(SessionCookie(state.cookie.token_from(&parts.headers)))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::Request;
  use chrono::{Duration, Utc};

  use super::*;

  fn grant(token: &str) -> SessionGrant {
    SessionGrant {
      token:      SessionToken::from(token),
      expires_at: Utc::now() + Duration::hours(24),
      max_age:    Duration::hours(24),
    }
  }

  #[test]
  fn issued_cookie_has_required_attributes() {
    let value = CookieConfig::default().issue(&grant("abc123")).unwrap();
    let value = value.to_str().unwrap();
    assert!(value.starts_with("veriface_session=abc123;"));
    assert!(value.contains("HttpOnly"));
    assert!(value.contains("SameSite=Lax"));
    assert!(value.contains("Max-Age=86400"));
    assert!(!value.contains("Secure"));
  }

  #[test]
  fn secure_flag_is_configurable() {
    let config = CookieConfig::new(DEFAULT_COOKIE_NAME, true).unwrap();
    let value = config.issue(&grant("abc123")).unwrap();
    assert!(value.to_str().unwrap().ends_with("; Secure"));
  }

  #[test]
  fn cookie_names_must_be_tokens() {
    for bad in ["", "bad\nname", "a=b", "a;b", "with space", "quote\"d", "sessé"] {
      assert_eq!(CookieConfig::new(bad, false).unwrap_err(), InvalidCookieName(bad.to_owned()));
    }
    for good in ["veriface_session", "SID", "__Host-session", "a.b!c"] {
      assert_eq!(CookieConfig::new(good, false).unwrap().name(), good);
    }
  }

  #[test]
  fn unencodable_session_value_is_an_internal_error() {
    let err = CookieConfig::default().issue(&grant("tok\nen")).unwrap_err();
    assert!(matches!(err, ApiError::Internal(_)));
  }

  #[test]
  fn cleared_cookie_expires_immediately() {
    let value = CookieConfig::default().clear().unwrap();
    assert_eq!(
      value.to_str().unwrap(),
      "veriface_session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"
    );
  }

  #[test]
  fn token_found_among_other_cookies() {
    let req = Request::builder()
      .header(header::COOKIE, "theme=dark; veriface_session=tok; lang=en")
      .body(())
      .unwrap();
    let token = CookieConfig::default().token_from(req.headers()).unwrap();
    assert_eq!(token.as_str(), "tok");
  }

  #[test]
  fn empty_or_absent_cookie_is_none() {
    let config = CookieConfig::default();
    let empty = Request::builder()
      .header(header::COOKIE, "veriface_session=")
      .body(())
      .unwrap();
    assert!(config.token_from(empty.headers()).is_none());

    let absent = Request::builder().body(()).unwrap();
    assert!(config.token_from(absent.headers()).is_none());
  }
}
