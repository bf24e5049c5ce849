//! Identity document files and image sniffing.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
  #[error("the selected file is empty")]
  Empty,

  #[error("the selected file is not a supported image")]
  NotAnImage,

  #[error("could not read {path}: {source}")]
  Io {
    path:   String,
    #[source]
    source: std::io::Error,
  },
}

// ─── Image kinds ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
  Jpeg,
  Png,
  Gif,
  Webp,
}

impl ImageKind {
  /// Identify an image by its magic bytes.
  pub fn sniff(bytes: &[u8]) -> Option<Self> {
    match bytes {
      [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
      [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
      [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(Self::Gif),
      [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
      _ => None,
    }
  }

  pub fn mime(self) -> &'static str {
    match self {
      Self::Jpeg => "image/jpeg",
      Self::Png => "image/png",
      Self::Gif => "image/gif",
      Self::Webp => "image/webp",
    }
  }
}

/// Pixel dimensions read from an image header, when the format is simple
/// enough to parse without decoding. WebP is not handled.
pub fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
  match ImageKind::sniff(bytes)? {
    ImageKind::Png => {
      let w = u32::from_be_bytes(bytes.get(16..20)?.try_into().ok()?);
      let h = u32::from_be_bytes(bytes.get(20..24)?.try_into().ok()?);
      Some((w, h))
    }
    ImageKind::Gif => {
      let w = u16::from_le_bytes(bytes.get(6..8)?.try_into().ok()?);
      let h = u16::from_le_bytes(bytes.get(8..10)?.try_into().ok()?);
      Some((w.into(), h.into()))
    }
    ImageKind::Jpeg => jpeg_dimensions(bytes),
    ImageKind::Webp => None,
  }
}

/// Walk JPEG segments until a start-of-frame marker.
fn jpeg_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
  let mut i = 2;
  loop {
    while *bytes.get(i)? != 0xFF {
      i += 1;
    }
    while *bytes.get(i)? == 0xFF {
      i += 1;
    }
    let marker = *bytes.get(i)?;
    i += 1;
    match marker {
      0xD8 | 0x01 | 0xD0..=0xD7 => continue,
      0xD9 | 0xDA => return None,
      _ => {}
    }
    let len = usize::from(u16::from_be_bytes(bytes.get(i..i + 2)?.try_into().ok()?));
    let is_sof = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
    if is_sof {
      let h = u16::from_be_bytes(bytes.get(i + 3..i + 5)?.try_into().ok()?);
      let w = u16::from_be_bytes(bytes.get(i + 5..i + 7)?.try_into().ok()?);
      return Some((w.into(), h.into()));
    }
    i += len;
  }
}

// ─── Documents ────────────────────────────────────────────────────────────────

/// An identity document image chosen by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFile {
  pub name:  String,
  pub kind:  ImageKind,
  pub bytes: Vec<u8>,
}

impl DocumentFile {
  /// Accept `bytes` only if they look like an image.
  pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, DocumentError> {
    if bytes.is_empty() {
      return Err(DocumentError::Empty);
    }
    let kind = ImageKind::sniff(&bytes).ok_or(DocumentError::NotAnImage)?;
    Ok(Self { name: name.into(), kind, bytes })
  }

  pub async fn read(path: impl AsRef<Path>) -> Result<Self, DocumentError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await.map_err(|source| DocumentError::Io {
      path: path.display().to_string(),
      source,
    })?;
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "document".to_owned());
    Self::from_bytes(name, bytes)
  }
}
