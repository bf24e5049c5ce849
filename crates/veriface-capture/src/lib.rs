//! Client side of veriface: document and face capture, the verification
//! gateway, the enrollment API client, and IP geolocation.

pub mod camera;
pub mod client;
pub mod document;
pub mod gateway;
pub mod geo;
pub mod orchestrator;
pub mod still;

pub use orchestrator::{
  CaptureError, CaptureEvent, CaptureOrchestrator, Recovery, VerificationState,
};
