//! The capture orchestrator: document selection, camera lifecycle, still
//! capture and the verification call.
//!
//! ```text
//! AwaitingDocument → DocumentSelected → CameraActive → Verifying → Verified
//!                                            ↑             │
//!                                            └── Failed ←──┘
//! ```
//!
//! A failed verification keeps the camera open, and the next attempt starts
//! again from `CameraActive`. A camera that cannot be opened sends the user
//! back to choosing a document. Only [`VerificationState::Verified`] yields an
//! [`EnrollmentRequest`].
//!
//! Hosts observe progress through [`CaptureOrchestrator::subscribe`].

use thiserror::Error;
use tokio::sync::broadcast;
use veriface_core::{
  enrollment::EnrollmentRequest,
  identity::{Coordinates, IdentityProfile},
};

use crate::{
  camera::{Camera, CameraError, Still, StreamGuard, VideoStream},
  document::DocumentFile,
  gateway::{VerificationGateway, VerificationOutcome},
};

const EVENT_CAPACITY: usize = 32;

pub const MSG_AWAITING_DOCUMENT: &str = "Please upload an identity document to begin.";
pub const MSG_DOCUMENT_SELECTED: &str = "Document selected. Starting camera...";
pub const MSG_CAMERA_READY: &str = "Position your face and click Verify.";
pub const MSG_CAMERA_STOPPED: &str = "Camera stopped.";
pub const MSG_NO_DOCUMENT: &str = "Please upload an identity document first.";
pub const MSG_NOT_READY: &str = "Camera not ready. Please wait a moment and try again.";
pub const MSG_VERIFYING: &str = "Analyzing ID and face... Please hold still.";
pub const MSG_VERIFIED: &str = "Verification successful!";
pub const MSG_CAPTURE_FAILED: &str = "Failed to capture face. Please try again.";
pub const MSG_GATEWAY_OFFLINE: &str = "Verification failed. The server might be offline.";
pub const MSG_CAMERA_DENIED: &str = "Webcam access denied. Please enable camera permissions.";
pub const MSG_CAMERA_UNAVAILABLE: &str =
  "Camera unavailable. Please check the device and select your document again.";
pub const MSG_CAMERA_UNSUPPORTED: &str = "This device does not support camera capture.";

// ─── State ────────────────────────────────────────────────────────────────────

/// Where a failed capture can resume from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
  /// The camera is still open; capture again.
  Recapture,
  /// The camera could not be opened; start over with a document.
  ReselectDocument,
  /// Nothing the user can do on this device.
  Terminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
  AwaitingDocument,
  DocumentSelected,
  CameraActive,
  Verifying,
  Verified(IdentityProfile),
  Failed { reason: String, recovery: Recovery },
}

impl VerificationState {
  pub fn name(&self) -> &'static str {
    match self {
      Self::AwaitingDocument => "awaiting_document",
      Self::DocumentSelected => "document_selected",
      Self::CameraActive => "camera_active",
      Self::Verifying => "verifying",
      Self::Verified(_) => "verified",
      Self::Failed { .. } => "failed",
    }
  }
}

/// Broadcast on every state or status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
  pub state:  VerificationState,
  pub status: String,
}

/// Why a requested step did not happen. Only [`CaptureError::is_terminal`]
/// errors end the flow; the rest are re-prompts.
#[derive(Debug, Error)]
pub enum CaptureError {
  #[error("no document selected")]
  NoDocument,

  #[error("camera not ready")]
  NotReady,

  #[error("capture has not been verified")]
  NotVerified,

  #[error(transparent)]
  Camera(#[from] CameraError),
}

impl CaptureError {
  pub fn is_terminal(&self) -> bool { matches!(self, Self::Camera(CameraError::Unsupported)) }
}

// ─── Orchestrator ─────────────────────────────────────────────────────────────

pub struct CaptureOrchestrator<C: Camera, G> {
  camera:   C,
  gateway:  G,
  document: Option<DocumentFile>,
  stream:   Option<StreamGuard<C::Stream>>,
  still:    Option<Still>,
  state:    VerificationState,
  status:   String,
  events:   broadcast::Sender<CaptureEvent>,
}

impl<C: Camera, G: VerificationGateway> CaptureOrchestrator<C, G> {
  pub fn new(camera: C, gateway: G) -> Self {
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Self {
      camera,
      gateway,
      document: None,
      stream: None,
      still: None,
      state: VerificationState::AwaitingDocument,
      status: MSG_AWAITING_DOCUMENT.to_owned(),
      events,
    }
  }

  pub fn state(&self) -> &VerificationState { &self.state }

  pub fn status(&self) -> &str { &self.status }

  pub fn document(&self) -> Option<&DocumentFile> { self.document.as_ref() }

  /// The still sent with the last verification attempt.
  pub fn still(&self) -> Option<&Still> { self.still.as_ref() }

  /// The extracted profile, once verified.
  pub fn profile(&self) -> Option<&IdentityProfile> {
    match &self.state {
      VerificationState::Verified(profile) => Some(profile),
      _ => None,
    }
  }

  pub fn camera_active(&self) -> bool {
    self.stream.as_ref().is_some_and(|g| g.stream().is_some())
  }

  pub fn subscribe(&self) -> broadcast::Receiver<CaptureEvent> { self.events.subscribe() }

  // ── Operations ────────────────────────────────────────────────────────────

  /// Take `document` as the identity document and start the camera.
  pub async fn select_document(&mut self, document: DocumentFile) -> Result<(), CaptureError> {
    tracing::debug!(name = %document.name, kind = ?document.kind, "document selected");
    self.document = Some(document);
    self.still = None;
    self.transition(VerificationState::DocumentSelected, MSG_DOCUMENT_SELECTED);
    self.activate_camera().await
  }

  /// Open the camera for preview. An already open stream is reused.
  pub async fn activate_camera(&mut self) -> Result<(), CaptureError> {
    if self.document.is_none() {
      self.notify(MSG_NO_DOCUMENT);
      return Err(CaptureError::NoDocument);
    }
    if self.camera_active() {
      self.transition(VerificationState::CameraActive, MSG_CAMERA_READY);
      return Ok(());
    }

    match self.camera.acquire().await {
      Ok(stream) => {
        self.stream = Some(StreamGuard::new(stream));
        tracing::debug!("camera acquired");
        self.transition(VerificationState::CameraActive, MSG_CAMERA_READY);
        Ok(())
      }
      Err(e) => {
        tracing::warn!(error = %e, "camera could not be opened");
        self.document = None;
        let (reason, recovery) = match e {
          CameraError::Unsupported => (MSG_CAMERA_UNSUPPORTED, Recovery::Terminal),
          CameraError::Denied => (MSG_CAMERA_DENIED, Recovery::ReselectDocument),
          _ => (MSG_CAMERA_UNAVAILABLE, Recovery::ReselectDocument),
        };
        self.transition(
          VerificationState::Failed { reason: reason.to_owned(), recovery },
          reason,
        );
        Err(e.into())
      }
    }
  }

  /// Freeze the current frame and submit it with the document.
  ///
  /// Without a document and a live stream that has decoded a frame, this
  /// only re-prompts and the gateway is not contacted. A rejection or a
  /// transport failure leaves the camera open for another attempt.
  pub async fn capture_and_verify(&mut self) -> Result<&VerificationState, CaptureError> {
    // A retry goes back through the live preview first.
    if matches!(self.state, VerificationState::Failed { recovery: Recovery::Recapture, .. })
      && self.camera_active()
    {
      self.transition(VerificationState::CameraActive, MSG_CAMERA_READY);
    }

    let ready = self.document.is_some() && self.stream.as_ref().is_some_and(StreamGuard::is_ready);
    if !ready {
      self.notify(MSG_NOT_READY);
      return Err(CaptureError::NotReady);
    }

    self.transition(VerificationState::Verifying, MSG_VERIFYING);

    let captured = match self.stream.as_mut().and_then(StreamGuard::stream_mut) {
      Some(stream) => stream.capture_still(),
      None => Err(CameraError::Unavailable("stream closed".to_owned())),
    };
    let still = match captured {
      Ok(still) => still,
      Err(e) => {
        tracing::warn!(error = %e, "still capture failed");
        self.fail(MSG_CAPTURE_FAILED);
        return Err(e.into());
      }
    };

    let Some(document) = self.document.as_ref() else {
      return Err(CaptureError::NoDocument);
    };
    let result = self.gateway.verify(document, &still).await;
    self.still = Some(still);

    match result {
      Ok(VerificationOutcome::Verified { profile, message }) => {
        self.stop_camera();
        let status = message.unwrap_or_else(|| MSG_VERIFIED.to_owned());
        self.transition(VerificationState::Verified(profile), status);
      }
      Ok(VerificationOutcome::Rejected { reason }) => self.fail(reason),
      Err(e) => {
        tracing::warn!(error = %e, "verification gateway unreachable");
        self.fail(MSG_GATEWAY_OFFLINE);
      }
    }
    Ok(&self.state)
  }

  /// Edit the extracted profile before submission.
  pub fn amend_profile(
    &mut self,
    amend: impl FnOnce(&mut IdentityProfile),
  ) -> Result<(), CaptureError> {
    let VerificationState::Verified(profile) = &mut self.state else {
      return Err(CaptureError::NotVerified);
    };
    amend(profile);
    Ok(())
  }

  /// Everything a signup needs, once verified.
  pub fn enrollment_request(
    &self,
    email: impl Into<String>,
    password: impl Into<String>,
    wallet_address: Option<String>,
    coordinates: Option<Coordinates>,
  ) -> Result<EnrollmentRequest, CaptureError> {
    let (Some(profile), Some(document), Some(still)) =
      (self.profile(), self.document.as_ref(), self.still.as_ref())
    else {
      return Err(CaptureError::NotVerified);
    };
    Ok(EnrollmentRequest {
      profile: profile.clone(),
      email: email.into(),
      password: password.into(),
      document_image: document.bytes.clone(),
      selfie_image: still.bytes.clone(),
      wallet_address,
      coordinates,
    })
  }

  /// Stop the camera without leaving the flow.
  pub fn release(&mut self) {
    if !self.camera_active() {
      return;
    }
    self.stop_camera();
    if matches!(
      self.state,
      VerificationState::CameraActive
        | VerificationState::Verifying
        | VerificationState::Failed { recovery: Recovery::Recapture, .. }
    ) {
      self.transition(VerificationState::DocumentSelected, MSG_CAMERA_STOPPED);
    }
  }

  /// Drop everything and start over.
  pub fn reset(&mut self) {
    self.stop_camera();
    self.document = None;
    self.still = None;
    self.transition(VerificationState::AwaitingDocument, MSG_AWAITING_DOCUMENT);
  }

  // ── Helpers ───────────────────────────────────────────────────────────────

  fn stop_camera(&mut self) {
    if let Some(mut guard) = self.stream.take() {
      guard.release();
    }
  }

  fn fail(&mut self, reason: impl Into<String>) {
    let reason = reason.into();
    self.transition(
      VerificationState::Failed { reason: reason.clone(), recovery: Recovery::Recapture },
      reason,
    );
  }

  fn transition(&mut self, state: VerificationState, status: impl Into<String>) {
    tracing::debug!(from = self.state.name(), to = state.name(), "capture state changed");
    self.state = state;
    self.notify(status);
  }

  fn notify(&mut self, status: impl Into<String>) {
    self.status = status.into();
    // No subscribers is fine.
    let _ = self.events.send(CaptureEvent { state: self.state.clone(), status: self.status.clone() });
  }
}
