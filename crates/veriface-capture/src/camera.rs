//! Camera access.
//!
//! A [`Camera`] hands out at most one live [`VideoStream`] at a time. The
//! orchestrator keeps it inside a [`StreamGuard`], which stops the stream
//! exactly once, whether by explicit release or by drop.

use thiserror::Error;

use crate::document::ImageKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
  #[error("camera access denied")]
  Denied,

  #[error("camera unavailable: {0}")]
  Unavailable(String),

  /// The host has no camera support at all.
  #[error("camera capture is not supported")]
  Unsupported,

  #[error("failed to capture a still: {0}")]
  Capture(String),
}

/// A frame frozen from the live stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Still {
  pub width:  u32,
  pub height: u32,
  pub kind:   ImageKind,
  pub bytes:  Vec<u8>,
}

/// An open camera stream. Used for preview and for freezing stills only.
pub trait VideoStream: Send {
  fn is_active(&self) -> bool;

  /// Dimensions of the most recently decoded frame; `(0, 0)` before the
  /// first frame arrives.
  fn dimensions(&self) -> (u32, u32);

  fn capture_still(&mut self) -> Result<Still, CameraError>;

  /// Stop every track and give the device back.
  fn stop(&mut self);
}

pub trait Camera: Send + Sync {
  type Stream: VideoStream + 'static;

  /// Request exclusive access to the device.
  fn acquire(&self) -> impl Future<Output = Result<Self::Stream, CameraError>> + Send;
}

// ─── Guard ────────────────────────────────────────────────────────────────────

/// Owns a stream and stops it exactly once.
pub struct StreamGuard<S: VideoStream> {
  stream: Option<S>,
}

impl<S: VideoStream> StreamGuard<S> {
  pub fn new(stream: S) -> Self { Self { stream: Some(stream) } }

  pub fn stream(&self) -> Option<&S> { self.stream.as_ref() }

  pub fn stream_mut(&mut self) -> Option<&mut S> { self.stream.as_mut() }

  /// Active, and at least one frame with nonzero dimensions decoded.
  pub fn is_ready(&self) -> bool {
    self.stream().is_some_and(|s| {
      let (w, h) = s.dimensions();
      s.is_active() && w > 0 && h > 0
    })
  }

  pub fn release(&mut self) {
    if let Some(mut stream) = self.stream.take() {
      stream.stop();
      tracing::debug!("camera released");
    }
  }
}

impl<S: VideoStream> Drop for StreamGuard<S> {
  fn drop(&mut self) { self.release(); }
}


#[cfg(test)]
mod tests {
  use super::{fake::*, *};

  #[tokio::test]
  async fn guard_releases_once_on_explicit_release_and_drop() {
    let camera = FakeCamera::new((640, 480));
    let mut guard = StreamGuard::new(camera.acquire().await.unwrap());
    assert!(guard.is_ready());

    guard.release();
    guard.release();
    assert!(!guard.is_ready());
    drop(guard);

    assert_eq!(camera.counters.released(), 1);
  }

  #[tokio::test]
  async fn guard_releases_on_drop() {
    let camera = FakeCamera::new((640, 480));
    drop(StreamGuard::new(camera.acquire().await.unwrap()));
    assert_eq!(camera.counters.released(), 1);
  }

  #[tokio::test]
  async fn zero_dimension_stream_is_not_ready() {
    let camera = FakeCamera::new((0, 0));
    let guard = StreamGuard::new(camera.acquire().await.unwrap());
    assert!(!guard.is_ready());
  }
}
