//! Parameter types for result production.
//!
//! These types describe *what* output to produce, not *how*. They are the
//! interface between the request layer (which collects user options) and the
//! [`Produce`](super::backend::Produce) collaborator (which does the encoding).
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (0.0–1.0, default 0.85). Clamped on construction.
//! - [`ImageFormat`]: Output encoding (`jpeg` by default), parsed from `image/<type>` style names.
//! - [`OutputKind`]: Raw pixels, encoded bytes, or a `data:` URL.
//! - [`OutputOptions`]: The three above, bundled for one production call.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Quality setting for lossy encoding, in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(f32);

impl Quality {
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::default();
        }
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Quality on the 1–100 scale used by the JPEG encoder.
    pub fn percent(self) -> u8 {
        ((self.0 * 100.0).round() as u8).max(1)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(0.85)
    }
}

/// Output encoding format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
    Bmp,
}

impl ImageFormat {
    /// MIME type, e.g. `image/jpeg`.
    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Bmp => "image/bmp",
        }
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        }
    }

    /// Whether [`Quality`] affects the encoded output.
    pub fn is_lossy(self) -> bool {
        matches!(self, Self::Jpeg)
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Bmp => "bmp",
        };
        f.write_str(name)
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    /// Accepts bare names (`png`) and MIME types (`image/png`), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let name = lower.strip_prefix("image/").unwrap_or(&lower);
        match name {
            "jpeg" | "jpg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            "bmp" => Ok(Self::Bmp),
            other => Err(format!("unsupported image format: {other}")),
        }
    }
}

/// What the production step hands back to the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    /// The downscaled pixels themselves; no encoding.
    Surface,
    /// Encoded image bytes.
    Bytes,
    /// `data:<mime>;base64,...` string.
    #[default]
    DataUrl,
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "surface" | "pixels" => Ok(Self::Surface),
            "bytes" | "blob" => Ok(Self::Bytes),
            "data-url" | "dataurl" => Ok(Self::DataUrl),
            other => Err(format!("unknown output kind: {other}")),
        }
    }
}

/// Parameters for one production call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutputOptions {
    pub kind: OutputKind,
    pub format: ImageFormat,
    pub quality: Quality,
}
