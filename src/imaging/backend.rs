//! Collaborator traits and shared types.
//!
//! The downscale core never touches files, sockets or codecs itself. It talks
//! to two collaborators:
//!
//! - [`Acquire`] turns a [`Source`] into decoded pixels. This is the only
//!   place a request suspends on I/O, so it is async.
//! - [`Produce`] turns the downscaled pixels into what the caller asked for
//!   (raw pixels, encoded bytes, or a data URL). Pure CPU work, so it is sync.
//!
//! The production implementation of both is
//! [`RustBackend`](super::rust_backend::RustBackend). Tests swap in the
//! recording mock from [`tests`].

use super::params::{OutputKind, OutputOptions};
use super::pixels::{PixelBuffer, PixelBufferError};
use crate::source::Source;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Encode failed: {0}")]
    Encode(String),
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid pixel data: {0}")]
    InvalidPixels(#[from] PixelBufferError),
}

/// The artifact handed back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    /// Downscaled pixels, not encoded.
    Pixels(PixelBuffer),
    /// Encoded image bytes.
    Encoded { mime: &'static str, data: Vec<u8> },
    /// `data:<mime>;base64,<payload>`.
    DataUrl(String),
}

impl Output {
    pub fn kind(&self) -> OutputKind {
        match self {
            Self::Pixels(_) => OutputKind::Surface,
            Self::Encoded { .. } => OutputKind::Bytes,
            Self::DataUrl(_) => OutputKind::DataUrl,
        }
    }

    /// Size of the artifact in bytes (pixel count × 4 for raw pixels).
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Pixels(buffer) => buffer.pixels().len() * 4,
            Self::Encoded { data, .. } => data.len(),
            Self::DataUrl(url) => url.len(),
        }
    }
}

/// Acquisition collaborator: decode a source into pixels.
#[async_trait]
pub trait Acquire: Send + Sync {
    async fn acquire(&self, source: &Source) -> Result<PixelBuffer, BackendError>;
}

/// Result-production collaborator: turn downscaled pixels into an [`Output`].
pub trait Produce: Send + Sync {
    fn produce(&self, buffer: &PixelBuffer, options: &OutputOptions)
    -> Result<Output, BackendError>;
}
