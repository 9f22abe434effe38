//! Pure Rust collaborator implementation, no system libraries.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Read file | `tokio::fs::read` |
//! | Fetch URL | `reqwest::Client` (rustls, shared connection pool) |
//! | Decode (JPEG, PNG, WebP, BMP) | `image::load_from_memory` on the blocking pool |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (alpha dropped) |
//! | Encode → PNG / WebP / BMP | `image` encoders, lossless |
//! | Data URL | `base64` standard engine |

use super::backend::{Acquire, BackendError, Output, Produce};
use super::params::{ImageFormat, OutputKind, OutputOptions, Quality};
use super::pixels::PixelBuffer;
use crate::config::FetchConfig;
use crate::source::Source;
use async_trait::async_trait;
use base64::Engine as _;
use image::{DynamicImage, ExtendedColorType, ImageEncoder};
use std::sync::Arc;
use std::time::Duration;

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
#[derive(Clone)]
pub struct RustBackend {
    client: reqwest::Client,
}

impl RustBackend {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Backend whose HTTP client uses the configured timeout and user agent.
    pub fn with_fetch_config(fetch: &FetchConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(fetch.timeout_secs))
            .user_agent(fetch.user_agent.clone())
            .build()
            .map_err(|e| BackendError::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, BackendError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BackendError::Http(format!("GET {url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Http(format!("GET {url} returned {status}")));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| BackendError::Http(format!("Reading body of {url}: {e}")))?;
        Ok(body.to_vec())
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode encoded image bytes into RGBA pixels.
fn decode_bytes(bytes: &[u8]) -> Result<PixelBuffer, BackendError> {
    let img = image::load_from_memory(bytes).map_err(|e| BackendError::Decode(e.to_string()))?;
    Ok(PixelBuffer::try_from(img.to_rgba8())?)
}

/// Decode on the blocking pool so large images do not stall the async runtime.
async fn decode_off_thread(bytes: Arc<[u8]>) -> Result<PixelBuffer, BackendError> {
    tokio::task::spawn_blocking(move || decode_bytes(&bytes))
        .await
        .map_err(|e| BackendError::Decode(format!("decode task failed: {e}")))?
}

/// Encode pixels in the requested format.
fn encode(
    buffer: &PixelBuffer,
    format: ImageFormat,
    quality: Quality,
) -> Result<Vec<u8>, BackendError> {
    let (width, height) = buffer.dimensions();
    let mut bytes = Vec::new();
    let result = match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgba8(buffer.to_rgba_image()).to_rgb8();
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut bytes, quality.percent())
                .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
        }
        ImageFormat::Png => image::codecs::png::PngEncoder::new(&mut bytes).write_image(
            &buffer.to_rgba8(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
        ImageFormat::Webp => image::codecs::webp::WebPEncoder::new_lossless(&mut bytes)
            .write_image(&buffer.to_rgba8(), width, height, ExtendedColorType::Rgba8),
        ImageFormat::Bmp => image::codecs::bmp::BmpEncoder::new(&mut bytes).write_image(
            &buffer.to_rgba8(),
            width,
            height,
            ExtendedColorType::Rgba8,
        ),
    };
    result.map_err(|e| BackendError::Encode(format!("{format} encode failed: {e}")))?;
    Ok(bytes)
}

/// `data:<mime>;base64,<payload>`.
pub fn data_url(mime: &str, data: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(data);
    format!("data:{mime};base64,{payload}")
}

#[async_trait]
impl Acquire for RustBackend {
    async fn acquire(&self, source: &Source) -> Result<PixelBuffer, BackendError> {
        match source {
            Source::File(path) => {
                let bytes = tokio::fs::read(path).await?;
                decode_off_thread(bytes.into()).await
            }
            Source::Url(url) => {
                let bytes = self.fetch(url).await?;
                decode_off_thread(bytes.into()).await
            }
            Source::Encoded(bytes) => decode_off_thread(Arc::clone(bytes)).await,
            Source::Pixels(buffer) => Ok(PixelBuffer::clone(buffer)),
        }
    }
}

impl Produce for RustBackend {
    fn produce(
        &self,
        buffer: &PixelBuffer,
        options: &OutputOptions,
    ) -> Result<Output, BackendError> {
        match options.kind {
            OutputKind::Surface => Ok(Output::Pixels(buffer.clone())),
            OutputKind::Bytes => Ok(Output::Encoded {
                mime: options.format.mime(),
                data: encode(buffer, options.format, options.quality)?,
            }),
            OutputKind::DataUrl => {
                let data = encode(buffer, options.format, options.quality)?;
                Ok(Output::DataUrl(data_url(options.format.mime(), &data)))
            }
        }
    }
}
