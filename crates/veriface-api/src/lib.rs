//! JSON HTTP surface for enrollment and sessions.
//!
//! Exposes an axum [`Router`] over an [`EnrollmentService`]. TLS and process
//! concerns are the caller's responsibility.
//!
//! | Method | Path | Success | Failure |
//! |--------|------|---------|---------|
//! | `POST` | `/api/signup` | `201` + identity + cookie | `400`, `409` |
//! | `POST` | `/api/login` | `200` + identity + cookie | `400`, `401` |
//! | `POST` | `/api/logout` | `200`, cookie cleared | |
//! | `GET`  | `/api/check-session` | `200` + identity | `401` |
//!
//! Browser hosts on another origin are admitted with [`cors_layer`].

pub mod cookie;
pub mod error;
pub mod handlers;


use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  http::{HeaderValue, Method, header},
  routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use veriface_core::{
  enrollment::EnrollmentService,
  store::{IdentityStore, SessionStore},
};

pub use cookie::{CookieConfig, InvalidCookieName};
pub use error::ApiError;

/// Signup bodies carry two base64 images.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, T> {
  pub service: EnrollmentService<S, T>,
  pub cookie:  Arc<CookieConfig>,
}

impl<S, T> Clone for AppState<S, T> {
  fn clone(&self) -> Self {
    Self {
      service: self.service.clone(),
      cookie:  Arc::clone(&self.cookie),
    }
  }
}

impl<S, T> AppState<S, T> {
  pub fn new(service: EnrollmentService<S, T>, cookie: CookieConfig) -> Self {
    Self { service, cookie: Arc::new(cookie) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router, already mounted under `/api`.
pub fn router<S, T>(state: AppState<S, T>) -> Router
where
  S: IdentityStore + 'static,
  T: SessionStore + 'static,
{
  Router::new()
    .route("/api/signup", post(handlers::signup::<S, T>))
    .route("/api/login", post(handlers::login::<S, T>))
    .route("/api/logout", post(handlers::logout::<S, T>))
    .route("/api/check-session", get(handlers::check_session::<S, T>))
    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Credentialed CORS for a browser client served from `origin`.
///
/// `origin` must be a concrete origin; browsers refuse credentials with `*`.
pub fn cors_layer(origin: HeaderValue) -> CorsLayer {
  CorsLayer::new()
    .allow_origin(origin)
    .allow_credentials(true)
    .allow_methods([Method::GET, Method::POST])
    .allow_headers([header::CONTENT_TYPE])
}
