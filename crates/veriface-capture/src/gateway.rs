//! Client for the external document + face verification service.
//!
//! One multipart request per attempt, carrying the `document` and
//! `live_face` parts. No retry or backoff happens here.

use std::time::Duration;

use reqwest::{
  Client,
  multipart::{Form, Part},
};
use serde::Deserialize;
use thiserror::Error;
use veriface_core::identity::IdentityProfile;

use crate::{camera::Still, document::DocumentFile};

const VERIFIED: &str = "Verified";
const DEFAULT_REJECTION: &str = "Verification failed. The face may not match the ID.";

/// What the gateway concluded about a document and face pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
  Verified {
    profile: IdentityProfile,
    message: Option<String>,
  },
  Rejected {
    reason: String,
  },
}

/// The request never produced a usable answer.
#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("verification request failed: {0}")]
  Transport(#[from] reqwest::Error),
}

pub trait VerificationGateway: Send + Sync {
  fn verify(
    &self,
    document: &DocumentFile,
    live_face: &Still,
  ) -> impl Future<Output = Result<VerificationOutcome, GatewayError>> + Send;
}

// ─── Wire format ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct GatewayResponse {
  verification_status: Option<String>,
  message:             Option<String>,
  extracted_data:      Option<ExtractedData>,
}

#[derive(Debug, Default, Deserialize)]
struct ExtractedData {
  name:    Option<String>,
  dob:     Option<String>,
  address: Option<String>,
}

impl ExtractedData {
  fn into_profile(self) -> IdentityProfile {
    IdentityProfile {
      full_name:     self.name.unwrap_or_default(),
      date_of_birth: self.dob.unwrap_or_default(),
      address:       self.address.unwrap_or_default(),
    }
  }
}

/// Interpret a gateway reply. Anything other than a 2xx with
/// `verification_status == "Verified"` is a rejection.
fn interpret(success: bool, body: &[u8]) -> VerificationOutcome {
  let parsed = serde_json::from_slice::<GatewayResponse>(body);
  match parsed {
    Ok(resp) if success && resp.verification_status.as_deref() == Some(VERIFIED) => {
      VerificationOutcome::Verified {
        profile: resp.extracted_data.unwrap_or_default().into_profile(),
        message: resp.message,
      }
    }
    Ok(resp) => VerificationOutcome::Rejected {
      reason: resp
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_REJECTION.to_owned()),
    },
    Err(_) => VerificationOutcome::Rejected { reason: DEFAULT_REJECTION.to_owned() },
  }
}

// ─── HTTP gateway ─────────────────────────────────────────────────────────────

/// [`VerificationGateway`] over HTTP.
#[derive(Clone)]
pub struct HttpVerificationGateway {
  client: Client,
  url:    String,
}

impl HttpVerificationGateway {
  /// `url` is the full upload endpoint, e.g. `http://127.0.0.1:5000/upload`.
  pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
    let client = Client::builder().timeout(timeout).build()?;
    Ok(Self { client, url: url.into() })
  }
}

impl VerificationGateway for HttpVerificationGateway {
  async fn verify(
    &self,
    document: &DocumentFile,
    live_face: &Still,
  ) -> Result<VerificationOutcome, GatewayError> {
    let form = Form::new()
      .part(
        "document",
        Part::bytes(document.bytes.clone())
          .file_name(document.name.clone())
          .mime_str(document.kind.mime())?,
      )
      .part(
        "live_face",
        Part::bytes(live_face.bytes.clone())
          .file_name("live_face.jpg")
          .mime_str(live_face.kind.mime())?,
      );

    let resp = self
      .client
      .post(&self.url)
      .header("User-Agent", format!("veriface/{}", env!("CARGO_PKG_VERSION")))
      .multipart(form)
      .send()
      .await?;

    let status = resp.status();
    let body = resp.bytes().await?;
    let outcome = interpret(status.is_success(), &body);
    match &outcome {
      VerificationOutcome::Verified { .. } => tracing::info!("gateway verified capture"),
      VerificationOutcome::Rejected { .. } => {
        tracing::info!(%status, "gateway rejected capture")
      }
    }
    Ok(outcome)
  }
}

#[cfg(test)]
pub(crate) mod fake {
  use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
  };

  use super::*;

  /// What the fake gateway does when called.
  pub enum Script {
    Answer(VerificationOutcome),
    Fail,
    /// Never completes.
    Hang,
  }

  pub struct FakeGateway {
    pub calls:  Arc<AtomicUsize>,
    pub script: Mutex<Script>,
  }

  impl FakeGateway {
    pub fn new(script: Script) -> Self {
      Self { calls: Arc::default(), script: Mutex::new(script) }
    }

    pub fn verified(full_name: &str) -> Self {
      Self::new(Script::Answer(VerificationOutcome::Verified {
        profile: IdentityProfile {
          full_name:     full_name.to_owned(),
          date_of_birth: "15/06/1990".to_owned(),
          address:       "12 Lake Road, Pune".to_owned(),
        },
        message: Some("Verification successful!".to_owned()),
      }))
    }

    pub fn rejected(reason: &str) -> Self {
      Self::new(Script::Answer(VerificationOutcome::Rejected { reason: reason.to_owned() }))
    }

    pub fn set(&self, script: Script) { *self.script.lock().unwrap() = script; }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
  }

  impl VerificationGateway for FakeGateway {
    async fn verify(
      &self,
      _document: &DocumentFile,
      _live_face: &Still,
    ) -> Result<VerificationOutcome, GatewayError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let answer = match &*self.script.lock().unwrap() {
        Script::Answer(outcome) => Some(Ok(outcome.clone())),
        Script::Fail => Some(Err(())),
        Script::Hang => None,
      };
      match answer {
        Some(Ok(outcome)) => Ok(outcome),
        Some(Err(())) => Err(transport_error().await),
        None => std::future::pending().await,
      }
    }
  }

  /// A real `reqwest::Error` from a connection that cannot succeed.
  async fn transport_error() -> GatewayError {
    match Client::new().get("http://127.0.0.1:9/").send().await {
      Err(e) => GatewayError::Transport(e),
      Ok(_) => unreachable!("nothing listens on the discard port"),
    }
  }
}
