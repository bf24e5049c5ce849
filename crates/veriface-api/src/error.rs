//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every response body is `{"error": "<message>"}`. Server-side failures are
//! logged here and reach the client only as a generic message.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use veriface_core::Error as CoreError;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  /// No valid session cookie.
  #[error("not authenticated")]
  Unauthenticated,

  /// The body could not be read or parsed as JSON.
  #[error("{}", .0.body_text())]
  Rejected(#[from] JsonRejection),

  /// A server-side fault outside the core, such as an unencodable header.
  #[error("{0}")]
  Internal(String),

  #[error(transparent)]
  Core(#[from] CoreError),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      Self::Unauthenticated => (StatusCode::UNAUTHORIZED, self.to_string()),
      Self::Rejected(r) => (r.status(), r.body_text()),
      Self::Internal(detail) => {
        tracing::error!(error = %detail, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
      }
      Self::Core(e) => match e {
        CoreError::Validation(_) | CoreError::InvalidDate(_) => {
          (StatusCode::BAD_REQUEST, e.to_string())
        }
        CoreError::Conflict => (StatusCode::CONFLICT, e.to_string()),
        CoreError::InvalidCredentials => (StatusCode::UNAUTHORIZED, e.to_string()),
        CoreError::Integrity | CoreError::Credential(_) | CoreError::Store(_) => {
          tracing::error!(error = %e, "request failed");
          (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
        }
      },
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
