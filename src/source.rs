//! Image sources and their cache identities.
//!
//! A [`Source`] says where pixels come from; a [`SourceKey`] says which cache
//! entry they belong to. Paths and URLs are keyed by their text. In-memory
//! values have no stable name, so they are **content-addressed**: the key is
//! a SHA-256 of the bytes (or of the decoded pixels), which means two equal
//! in-memory images share one cache entry and one decode.

use crate::error::ArgumentError;
use crate::imaging::PixelBuffer;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Where the pixels of a request come from.
#[derive(Debug, Clone)]
pub enum Source {
    /// Encoded image file on disk.
    File(PathBuf),
    /// `http://` or `https://` resource.
    Url(String),
    /// Encoded image bytes already in memory.
    Encoded(Arc<[u8]>),
    /// Already-decoded pixels (e.g. a frame grabbed from a video).
    Pixels(Arc<PixelBuffer>),
}

impl Source {
    /// Classify a textual source: `http(s)://` is a URL, anything else without
    /// a scheme is a file path.
    pub fn parse(raw: &str) -> Result<Self, ArgumentError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ArgumentError::UnsupportedSource(raw.to_string()));
        }
        if let Some((scheme, _)) = raw.split_once("://") {
            return if scheme.eq_ignore_ascii_case("http") || scheme.eq_ignore_ascii_case("https")
            {
                Ok(Self::Url(raw.to_string()))
            } else {
                Err(ArgumentError::UnsupportedSource(raw.to_string()))
            };
        }
        Ok(Self::File(PathBuf::from(raw)))
    }

    /// Identity used to deduplicate acquisition and cache the decoded buffer.
    pub fn key(&self) -> SourceKey {
        match self {
            Self::File(path) => SourceKey::Path(path.clone()),
            Self::Url(url) => SourceKey::Url(url.clone()),
            Self::Encoded(bytes) => SourceKey::Content(hash_bytes(bytes)),
            Self::Pixels(buffer) => SourceKey::Content(hash_pixels(buffer)),
        }
    }

    /// Short label for logs and reports.
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
            Self::Encoded(bytes) => format!("<{} encoded bytes>", bytes.len()),
            Self::Pixels(buffer) => format!("<{}x{} pixels>", buffer.width(), buffer.height()),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ArgumentError> {
        match self {
            Self::File(path) if path.as_os_str().is_empty() => {
                Err(ArgumentError::UnsupportedSource(String::new()))
            }
            Self::Url(url) => Self::parse(url).map(|_| ()),
            Self::Encoded(bytes) if bytes.is_empty() => Err(ArgumentError::UnsupportedSource(
                "<empty encoded bytes>".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Self::File(path)
    }
}

impl From<PixelBuffer> for Source {
    fn from(buffer: PixelBuffer) -> Self {
        Self::Pixels(Arc::new(buffer))
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Encoded(bytes.into())
    }
}

/// Cache identity of a [`Source`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SourceKey {
    Path(PathBuf),
    Url(String),
    /// SHA-256 hex digest of the source content.
    Content(String),
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "file:{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
            Self::Content(hash) => write!(f, "sha256:{}", &hash[..hash.len().min(12)]),
        }
    }
}

/// SHA-256 of encoded bytes, as a hex string.
fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"encoded\0");
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of decoded pixels. Dimensions are part of the hash so a 2x8 and
/// an 8x2 buffer with the same bytes stay distinct.
fn hash_pixels(buffer: &PixelBuffer) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"pixels\0");
    hasher.update(buffer.width().to_le_bytes());
    hasher.update(buffer.height().to_le_bytes());
    hasher.update(buffer.pixels().as_flattened());
    format!("{:x}", hasher.finalize())
}
