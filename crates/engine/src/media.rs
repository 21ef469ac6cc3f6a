//! Image validation for variant uploads.
//!
//! Uploaded bytes are accepted only when they are at most [`MAX_IMAGE_BYTES`]
//! long and their leading bytes identify a JPEG, PNG or WebP image. The
//! declared content type of the upload is never trusted; the stored content
//! type comes from the sniffed format.

use thiserror::Error;

/// Largest accepted image (5 MiB).
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Image formats accepted for variant images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
}

impl ImageFormat {
    /// MIME type stored alongside the object.
    #[must_use]
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
        }
    }
}

/// Reasons an image is rejected before upload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("image is empty")]
    Empty,

    #[error("image is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("unsupported image format")]
    UnsupportedFormat,
}

/// An image that passed validation.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ImageUpload {
    /// Validate raw bytes and wrap them for upload.
    ///
    /// # Errors
    ///
    /// Returns `MediaError` if the bytes are empty, too large, or not a
    /// supported image format.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, MediaError> {
        let format = validate_image(&bytes)?;
        Ok(Self { bytes, format })
    }

    /// MIME type of the sniffed format.
    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Check size and magic bytes of an image.
///
/// # Errors
///
/// Returns `MediaError` describing the first failed check.
pub fn validate_image(bytes: &[u8]) -> Result<ImageFormat, MediaError> {
    if bytes.is_empty() {
        return Err(MediaError::Empty);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(MediaError::TooLarge {
            size: bytes.len(),
            limit: MAX_IMAGE_BYTES,
        });
    }
    sniff_format(bytes).ok_or(MediaError::UnsupportedFormat)
}

fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(ImageFormat::Jpeg);
    }
    if bytes.starts_with(PNG_SIGNATURE) {
        return Some(ImageFormat::Png);
    }
    // RIFF....WEBP
    if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && bytes.get(8..12) == Some(&b"WEBP"[..]) {
        return Some(ImageFormat::WebP);
    }
    None
}
