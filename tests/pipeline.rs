//! End-to-end downscaling through the public API with the real backend.

use async_trait::async_trait;
use boxscale::config::{Config, OutputConfig};
use boxscale::downscale::{DownscaleRequest, Downscaler};
use boxscale::error::DownscaleError;
use boxscale::imaging::{
    Acquire, BackendError, ImageFormat, Output, OutputKind, PixelBuffer, RustBackend,
};
use boxscale::source::Source;
use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Real backend that counts acquisitions.
struct CountingBackend {
    inner: RustBackend,
    acquisitions: AtomicUsize,
}

impl CountingBackend {
    fn new() -> Self {
        Self {
            inner: RustBackend::new(),
            acquisitions: AtomicUsize::new(0),
        }
    }

    fn count(&self) -> usize {
        self.acquisitions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Acquire for CountingBackend {
    async fn acquire(&self, source: &Source) -> Result<PixelBuffer, BackendError> {
        self.acquisitions.fetch_add(1, Ordering::SeqCst);
        self.inner.acquire(source).await
    }
}

fn write_png(dir: &Path, name: &str, image: &RgbaImage) -> PathBuf {
    let path = dir.join(name);
    image.save(&path).unwrap();
    path
}

fn gradient_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 255 / width) as u8, (y * 255 / height) as u8, 128, 255])
    });
    write_png(dir, name, &image)
}

fn counting_downscaler() -> (Arc<CountingBackend>, Downscaler) {
    let backend = Arc::new(CountingBackend::new());
    let downscaler = Downscaler::new(
        backend.clone(),
        Arc::new(RustBackend::new()),
        &Default::default(),
    );
    (backend, downscaler)
}

#[tokio::test]
async fn file_to_png_bytes() {
    let tmp = TempDir::new().unwrap();
    let path = gradient_png(tmp.path(), "wide.png", 40, 20);
    let downscaler = Downscaler::with_config(&Config::default()).unwrap();

    let out = downscaler
        .downscale(
            DownscaleRequest::new(path, 10, 10)
                .output(OutputKind::Bytes)
                .format(ImageFormat::Png),
        )
        .await
        .unwrap();

    let Output::Encoded { mime, data } = out else {
        panic!("expected encoded bytes");
    };
    assert_eq!(mime, "image/png");
    let decoded = image::load_from_memory(&data).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (10, 10));
}

#[tokio::test]
async fn uniform_image_stays_uniform() {
    let tmp = TempDir::new().unwrap();
    let image = RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255]));
    let path = write_png(tmp.path(), "flat.png", &image);
    let (_, downscaler) = counting_downscaler();

    let out = downscaler
        .downscale(DownscaleRequest::new(path, 2, 2).output(OutputKind::Surface))
        .await
        .unwrap();

    let Output::Pixels(pixels) = out else {
        panic!("expected pixels");
    };
    assert_eq!(pixels.dimensions(), (2, 2));
    assert!(pixels.pixels().iter().all(|&px| px == [10, 20, 30, 255]));
}

#[tokio::test]
async fn repeated_source_is_decoded_once() {
    let tmp = TempDir::new().unwrap();
    let path = gradient_png(tmp.path(), "shared.png", 64, 48);
    let (backend, downscaler) = counting_downscaler();

    let requests = [(32, 24), (16, 16), (8, 4), (1, 1), (64, 48)]
        .into_iter()
        .map(|(w, h)| DownscaleRequest::new(path.clone(), w, h).output(OutputKind::Surface))
        .collect();
    let results = downscaler.downscale_all(requests).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(backend.count(), 1);
    assert_eq!(downscaler.cache_stats().misses, 1);
}

#[tokio::test]
async fn default_output_is_jpeg_data_url() {
    let tmp = TempDir::new().unwrap();
    let path = gradient_png(tmp.path(), "photo.png", 30, 30);
    let downscaler = Downscaler::with_config(&Config::default()).unwrap();

    let out = downscaler
        .downscale(DownscaleRequest::new(path, 15, 15))
        .await
        .unwrap();

    let Output::DataUrl(url) = out else {
        panic!("expected data URL");
    };
    assert!(url.starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn missing_file_fails_and_is_retried() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("later.png");
    let (backend, downscaler) = counting_downscaler();

    let err = downscaler
        .downscale(DownscaleRequest::new(path.clone(), 4, 4))
        .await
        .unwrap_err();
    assert!(matches!(err, DownscaleError::Acquisition(_)));

    gradient_png(tmp.path(), "later.png", 8, 8);
    downscaler
        .downscale(DownscaleRequest::new(path, 4, 4))
        .await
        .unwrap();
    assert_eq!(backend.count(), 2);
}

#[tokio::test]
async fn textual_request_uses_config_defaults() {
    let tmp = TempDir::new().unwrap();
    let path = gradient_png(tmp.path(), "cfg.png", 20, 20);
    let config = Config {
        output: OutputConfig {
            format: ImageFormat::Png,
            ..OutputConfig::default()
        },
        ..Config::default()
    };
    let downscaler = Downscaler::with_config(&config).unwrap();

    let path_arg = path.to_string_lossy().into_owned();
    let out = downscaler
        .downscale_args(&[path_arg.as_str(), "5", "5", "output=bytes"])
        .await
        .unwrap();
    assert!(matches!(out, Output::Encoded { mime: "image/png", .. }));
}

#[tokio::test]
async fn short_textual_request_is_an_argument_error() {
    let (backend, downscaler) = counting_downscaler();

    let err = downscaler.downscale_args(&["a.png", "10"]).await.unwrap_err();
    assert_eq!(err.to_string(), "3 arguments required, but only 2 present.");
    assert_eq!(backend.count(), 0);
    assert!(downscaler.cache().is_empty());
}
