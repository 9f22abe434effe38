//! Shared test utilities for the boxscale test suite.
//!
//! Provides synthetic pixel fixtures and encoded-image builders so unit tests
//! can exercise the pipeline without shipping binary fixture files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let src = checkerboard(4, 4, 1);
//! let png = encode_png(&src);
//! let tmp = write_png_fixture(&src, "board.png");
//! ```

use crate::imaging::PixelBuffer;
use image::ImageEncoder;
use std::path::PathBuf;
use tempfile::TempDir;

// =========================================================================
// Pixel fixtures
// =========================================================================

/// Black/white checkerboard with square cells of `cell` pixels.
///
/// The top-left cell is black. Alpha is fully opaque.
pub fn checkerboard(width: u32, height: u32, cell: u32) -> PixelBuffer {
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let white = ((x / cell) + (y / cell)) % 2 == 1;
            pixels.push(if white {
                [255, 255, 255, 255]
            } else {
                [0, 0, 0, 255]
            });
        }
    }
    PixelBuffer::new(width, height, pixels).unwrap()
}

/// Buffer where every pixel is distinct: red follows x, green follows y.
pub fn gradient(width: u32, height: u32) -> PixelBuffer {
    let mut pixels = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            pixels.push([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255]);
        }
    }
    PixelBuffer::new(width, height, pixels).unwrap()
}

// =========================================================================
// Encoded fixtures
// =========================================================================

/// Encode a buffer as PNG bytes (lossless, so decoded pixels match exactly).
pub fn encode_png(buffer: &PixelBuffer) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut bytes)
        .write_image(
            &buffer.to_rgba8(),
            buffer.width(),
            buffer.height(),
            image::ExtendedColorType::Rgba8,
        )
        .unwrap();
    bytes
}

/// Write a buffer as a PNG into a fresh temp directory.
///
/// Returns the directory guard (keep it alive) and the file path.
pub fn write_png_fixture(buffer: &PixelBuffer, name: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join(name);
    std::fs::write(&path, encode_png(buffer)).unwrap();
    (tmp, path)
}
