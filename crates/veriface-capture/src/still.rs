//! A camera backed by a still image file, for headless capture.

use std::path::PathBuf;

use crate::{
  camera::{Camera, CameraError, Still, VideoStream},
  document::{ImageKind, dimensions},
};

/// Serves the same image as every frame.
pub struct StillImageCamera {
  path: PathBuf,
}

impl StillImageCamera {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }
}

pub struct StillImageStream {
  frame: Option<Still>,
}

impl Camera for StillImageCamera {
  type Stream = StillImageStream;

  async fn acquire(&self) -> Result<StillImageStream, CameraError> {
    let bytes = tokio::fs::read(&self.path)
      .await
      .map_err(|e| CameraError::Unavailable(format!("{}: {e}", self.path.display())))?;
    let kind = ImageKind::sniff(&bytes)
      .ok_or_else(|| CameraError::Unavailable("face image is not a supported image".to_owned()))?;
    let (width, height) = dimensions(&bytes).ok_or_else(|| {
      CameraError::Unavailable("face image must be JPEG, PNG or GIF".to_owned())
    })?;
    Ok(StillImageStream { frame: Some(Still { width, height, kind, bytes }) })
  }
}

impl VideoStream for StillImageStream {
  fn is_active(&self) -> bool { self.frame.is_some() }

  fn dimensions(&self) -> (u32, u32) {
    self.frame.as_ref().map_or((0, 0), |f| (f.width, f.height))
  }

  fn capture_still(&mut self) -> Result<Still, CameraError> {
    self
      .frame
      .clone()
      .ok_or_else(|| CameraError::Capture("stream stopped".to_owned()))
  }

  fn stop(&mut self) { self.frame = None; }
}
