//! Handlers for the `/api` endpoints.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde::{Deserialize, Serialize};
use veriface_core::{
  enrollment::{Authenticated, Credentials, EnrollmentRequest},
  identity::{Coordinates, IdentityProfile, IdentityView},
  store::{IdentityStore, SessionStore},
};

use crate::{AppState, cookie::SessionCookie, error::ApiError};

// ─── Bodies ───────────────────────────────────────────────────────────────────

/// `POST /api/signup` body. Images are base64, optionally as a data URL.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupBody {
  #[serde(alias = "full_name")]
  pub name:               String,
  #[serde(alias = "date_of_birth")]
  pub dob:                String,
  #[serde(alias = "address")]
  pub location:           String,
  pub email:              String,
  pub password:           String,
  #[serde(alias = "document_image")]
  pub govt_image:         String,
  #[serde(alias = "selfie_image")]
  pub selfie_image:       String,
  #[serde(alias = "wallet_address")]
  pub blockchain_address: Option<String>,
  pub coordinates:        Option<Coordinates>,
}

impl SignupBody {
  fn into_request(self) -> Result<EnrollmentRequest, ApiError> {
    Ok(EnrollmentRequest {
      profile:        IdentityProfile {
        full_name:     self.name,
        date_of_birth: self.dob,
        address:       self.location,
      },
      email:          self.email,
      password:       self.password,
      document_image: decode_image(&self.govt_image, "govtImage")?,
      selfie_image:   decode_image(&self.selfie_image, "selfieImage")?,
      wallet_address: self.blockchain_address,
      coordinates:    self.coordinates,
    })
  }
}

/// Decode a base64 image, tolerating a `data:<mime>;base64,` prefix.
/// An empty field decodes to no bytes and is reported by validation.
fn decode_image(encoded: &str, field: &str) -> Result<Vec<u8>, ApiError> {
  let payload = match encoded.split_once(',') {
    Some((prefix, rest)) if prefix.starts_with("data:") => rest,
    _ => encoded,
  };
  B64
    .decode(payload.trim())
    .map_err(|_| ApiError::BadRequest(format!("{field} is not valid base64")))
}

/// Response to a successful signup or login.
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
  pub message: String,
  pub user:    IdentityView,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
  pub message: String,
}

fn authenticated(
  status: StatusCode,
  message: &str,
  auth: Authenticated,
  cookie: HeaderValue,
) -> Response {
  let body = AuthResponse { message: message.to_owned(), user: auth.identity };
  (status, [(header::SET_COOKIE, cookie)], Json(body)).into_response()
}

// ─── Signup ───────────────────────────────────────────────────────────────────

/// `POST /api/signup`
pub async fn signup<S, T>(
  State(state): State<AppState<S, T>>,
  body: Result<Json<SignupBody>, JsonRejection>,
) -> Result<Response, ApiError>
where
  S: IdentityStore,
  T: SessionStore,
{
  let Json(body) = body?;
  let auth = state.service.enroll(body.into_request()?).await?;
  let cookie = state.cookie.issue(&auth.session)?;
  Ok(authenticated(StatusCode::CREATED, "registered", auth, cookie))
}

// ─── Login ────────────────────────────────────────────────────────────────────

/// `POST /api/login`, body `{"email":"…","password":"…"}`
pub async fn login<S, T>(
  State(state): State<AppState<S, T>>,
  body: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, ApiError>
where
  S: IdentityStore,
  T: SessionStore,
{
  let Json(credentials) = body?;
  let auth = state.service.authenticate(&credentials).await?;
  let cookie = state.cookie.issue(&auth.session)?;
  Ok(authenticated(StatusCode::OK, "logged in", auth, cookie))
}

// ─── Logout ───────────────────────────────────────────────────────────────────

/// `POST /api/logout`. Succeeds with or without a live session.
pub async fn logout<S, T>(
  State(state): State<AppState<S, T>>,
  session: SessionCookie,
) -> Result<Response, ApiError>
where
  S: IdentityStore,
  T: SessionStore,
{
  state.service.end_session(session.token()).await?;
  let cookie = state.cookie.clear()?;
  let body = MessageResponse { message: "logged out".to_owned() };
  Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

// ─── Check session ────────────────────────────────────────────────────────────

/// `GET /api/check-session`
pub async fn check_session<S, T>(
  State(state): State<AppState<S, T>>,
  session: SessionCookie,
) -> Result<Json<IdentityView>, ApiError>
where
  S: IdentityStore,
  T: SessionStore,
{
  state
    .service
    .current_identity(session.token())
    .await?
    .map(Json)
    .ok_or(ApiError::Unauthenticated)
}
