//! Request orchestration: validate, share the decoded source, crop, average,
//! produce.
//!
//! ```text
//! DownscaleRequest
//!   │ validate ──────────────► ArgumentError (no cache access, no I/O)
//!   ▼
//! SourceCache::lookup_or_reserve
//!   ├─ Ready      → use it
//!   ├─ Pending    → await the in-flight acquisition
//!   └─ Reserved   → spawn Acquire::acquire, resolve/fail the entry, await it
//!   ▼
//! scale_pixels (crop + box filter, blocking pool)
//!   ▼
//! Produce::produce (blocking pool) ──► Output
//! ```
//!
//! Acquisition runs in its own task, so dropping a request future while the
//! source is loading detaches that request only: the acquisition still
//! completes and every other waiter still gets the buffer.

use crate::cache::{CacheStats, Lookup, SourceCache};
use crate::config::{CacheConfig, Config, OutputConfig};
use crate::error::{ArgumentError, DownscaleError};
use crate::imaging::{
    Acquire, BackendError, CropOffset, ImageFormat, Output, OutputKind, OutputOptions,
    PixelBuffer, Produce, Quality, RustBackend, scale_pixels,
};
use crate::source::Source;
use crate::timing::Timing;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-request options.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DownscaleOptions {
    /// Crop origin override; `None` centres the crop horizontally.
    pub source_x: Option<u32>,
    /// Crop origin override; `None` centres the crop vertically.
    pub source_y: Option<u32>,
    pub output: OutputKind,
    pub format: ImageFormat,
    pub quality: Quality,
    /// Log a per-phase timing table when the request finishes.
    pub debug: bool,
}

impl DownscaleOptions {
    /// Options whose encoding defaults come from the `[output]` config section.
    pub fn from_output_config(output: &OutputConfig) -> Self {
        Self {
            format: output.format,
            quality: output.quality,
            ..Self::default()
        }
    }

    pub fn crop_offset(&self) -> CropOffset {
        CropOffset {
            x: self.source_x,
            y: self.source_y,
        }
    }

    pub fn output_options(&self) -> OutputOptions {
        OutputOptions {
            kind: self.output,
            format: self.format,
            quality: self.quality,
        }
    }

    /// Apply one `key=value` option.
    fn apply(&mut self, arg: &str) -> Result<(), ArgumentError> {
        let invalid = || ArgumentError::InvalidOption(arg.to_string());
        let (key, value) = arg.split_once('=').ok_or_else(invalid)?;
        let value = value.trim();
        match key.trim() {
            "source_x" | "sourceX" => self.source_x = Some(value.parse().map_err(|_| invalid())?),
            "source_y" | "sourceY" => self.source_y = Some(value.parse().map_err(|_| invalid())?),
            "format" | "imageType" => self.format = value.parse().map_err(|_| invalid())?,
            "quality" => self.quality = Quality::new(value.parse().map_err(|_| invalid())?),
            "output" => self.output = value.parse().map_err(|_| invalid())?,
            "debug" => self.debug = value.parse().map_err(|_| invalid())?,
            _ => return Err(invalid()),
        }
        Ok(())
    }
}

/// One downscale request: source, target size and options.
#[derive(Debug, Clone)]
pub struct DownscaleRequest {
    pub source: Source,
    pub dest_width: u32,
    pub dest_height: u32,
    pub options: DownscaleOptions,
}

impl DownscaleRequest {
    pub fn new(source: impl Into<Source>, dest_width: u32, dest_height: u32) -> Self {
        Self {
            source: source.into(),
            dest_width,
            dest_height,
            options: DownscaleOptions::default(),
        }
    }

    pub fn with_options(mut self, options: DownscaleOptions) -> Self {
        self.options = options;
        self
    }

    pub fn source_x(mut self, x: u32) -> Self {
        self.options.source_x = Some(x);
        self
    }

    pub fn source_y(mut self, y: u32) -> Self {
        self.options.source_y = Some(y);
        self
    }

    pub fn output(mut self, kind: OutputKind) -> Self {
        self.options.output = kind;
        self
    }

    pub fn format(mut self, format: ImageFormat) -> Self {
        self.options.format = format;
        self
    }

    pub fn quality(mut self, quality: f32) -> Self {
        self.options.quality = Quality::new(quality);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.options.debug = debug;
        self
    }

    /// Parse a textual request: `SOURCE WIDTH HEIGHT [key=value ...]`.
    ///
    /// ```
    /// use boxscale::downscale::DownscaleRequest;
    ///
    /// let req = DownscaleRequest::from_args(&["cat.jpg", "200", "100", "format=png"]).unwrap();
    /// assert_eq!((req.dest_width, req.dest_height), (200, 100));
    ///
    /// let err = DownscaleRequest::from_args(&["cat.jpg", "200"]).unwrap_err();
    /// assert_eq!(err.to_string(), "3 arguments required, but only 2 present.");
    /// ```
    pub fn from_args(args: &[&str]) -> Result<Self, ArgumentError> {
        Self::parse_with(args, DownscaleOptions::default())
    }

    /// Like [`from_args`](Self::from_args), starting from `defaults` instead
    /// of the stock options.
    pub fn parse_with(args: &[&str], defaults: DownscaleOptions) -> Result<Self, ArgumentError> {
        let [source, width, height, rest @ ..] = args else {
            return Err(ArgumentError::MissingArguments(args.len()));
        };
        let source = Source::parse(source)?;
        let dest_width = parse_dimension(width, "Second", ArgumentError::WidthNotNumeric)?;
        let dest_height = parse_dimension(height, "Third", ArgumentError::HeightNotNumeric)?;

        let mut options = defaults;
        for arg in rest {
            options.apply(arg)?;
        }

        Ok(Self {
            source,
            dest_width,
            dest_height,
            options,
        })
    }

    /// Check the request shape without touching the source.
    pub fn validate(&self) -> Result<(), ArgumentError> {
        if self.dest_width == 0 || self.dest_height == 0 {
            return Err(ArgumentError::ZeroDimension {
                width: self.dest_width,
                height: self.dest_height,
            });
        }
        self.source.validate()
    }
}

/// Parse a destination dimension. Text that is a number but not a `u32`
/// (fractional, negative, too large) gets its own error.
fn parse_dimension(
    text: &str,
    argument: &'static str,
    not_numeric: ArgumentError,
) -> Result<u32, ArgumentError> {
    let text = text.trim();
    match text.parse::<u32>() {
        Ok(value) => Ok(value),
        Err(_) if text.parse::<f64>().is_ok_and(f64::is_finite) => {
            Err(ArgumentError::NotWholeNumber {
                argument,
                value: text.to_string(),
            })
        }
        Err(_) => Err(not_numeric),
    }
}

/// Downscale context: one decoded-source cache shared by every request, plus
/// the acquisition and production collaborators.
///
/// Independent instances do not share anything.
pub struct Downscaler {
    cache: SourceCache,
    acquirer: Arc<dyn Acquire>,
    producer: Arc<dyn Produce>,
    defaults: DownscaleOptions,
}

impl Downscaler {
    pub fn new(
        acquirer: Arc<dyn Acquire>,
        producer: Arc<dyn Produce>,
        cache: &CacheConfig,
    ) -> Self {
        Self {
            cache: SourceCache::with_capacity(cache.capacity()),
            acquirer,
            producer,
            defaults: DownscaleOptions::default(),
        }
    }

    /// Downscaler backed by [`RustBackend`] for both roles.
    pub fn with_config(config: &Config) -> Result<Self, BackendError> {
        let backend = Arc::new(RustBackend::with_fetch_config(&config.fetch)?);
        Ok(Self::new(backend.clone(), backend, &config.cache)
            .with_defaults(DownscaleOptions::from_output_config(&config.output)))
    }

    /// Options used for textual requests that do not override them.
    pub fn with_defaults(mut self, defaults: DownscaleOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> DownscaleOptions {
        self.defaults
    }

    pub fn cache(&self) -> &SourceCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Run one request to completion.
    pub async fn downscale(&self, request: DownscaleRequest) -> Result<Output, DownscaleError> {
        request.validate()?;
        let DownscaleRequest {
            source,
            dest_width,
            dest_height,
            options,
        } = request;
        let mut timing = Timing::new(options.debug, source.describe(), dest_width, dest_height);
        debug!(source = %source.describe(), dest_width, dest_height, "downscale");

        let pixels = self.source_pixels(&source, &mut timing).await?;

        let offset = options.crop_offset();
        let scaled = tokio::task::spawn_blocking(move || {
            scale_pixels(&pixels, dest_width, dest_height, offset)
        })
        .await?;
        timing.mark("DOWNSCALE");

        let producer = Arc::clone(&self.producer);
        let output_options = options.output_options();
        let output = tokio::task::spawn_blocking(move || producer.produce(&scaled, &output_options))
            .await?
            .map_err(DownscaleError::Production)?;
        timing.mark("PRODUCE RESULT");
        debug!(kind = ?output.kind(), bytes = output.byte_len(), "result produced");

        timing.finish();
        Ok(output)
    }

    /// Parse a textual request with this downscaler's defaults and run it.
    pub async fn downscale_args(&self, args: &[&str]) -> Result<Output, DownscaleError> {
        let request = DownscaleRequest::parse_with(args, self.defaults)?;
        self.downscale(request).await
    }

    /// Run many requests concurrently. Results come back in input order.
    pub async fn downscale_all(
        &self,
        requests: Vec<DownscaleRequest>,
    ) -> Vec<Result<Output, DownscaleError>> {
        join_all(requests.into_iter().map(|r| self.downscale(r))).await
    }

    /// Decoded pixels of `source`, acquiring them at most once per key.
    async fn source_pixels(
        &self,
        source: &Source,
        timing: &mut Timing,
    ) -> Result<Arc<PixelBuffer>, DownscaleError> {
        let key = source.key();
        match self.cache.lookup_or_reserve(&key) {
            Lookup::Ready(pixels) => {
                timing.mark("CACHE");
                Ok(pixels)
            }
            Lookup::Pending(subscription) => {
                let pixels = subscription.await?;
                timing.mark("PENDING CACHE");
                Ok(pixels)
            }
            Lookup::Reserved(reservation) => {
                let owner = reservation.subscribe();
                let acquirer = Arc::clone(&self.acquirer);
                let source = source.clone();
                tokio::spawn(async move {
                    match acquirer.acquire(&source).await {
                        Ok(pixels) => {
                            reservation.resolve(pixels);
                        }
                        Err(e) => {
                            warn!(source = %source.describe(), error = %e, "acquisition failed");
                            reservation.fail(e.to_string());
                        }
                    }
                });
                let pixels = owner.await?;
                timing.mark("ACQUIRE");
                Ok(pixels)
            }
        }
    }
}
