//! In-memory RGBA pixel storage.
//!
//! [`PixelBuffer`] is the value every stage of the pipeline passes around:
//! acquisition produces one, the downsampler reads one and produces another,
//! and result production consumes the last. Buffers are immutable once built,
//! so a decoded source can be shared between concurrent requests behind an
//! `Arc` without any locking on the pixel data.

use image::RgbaImage;
use thiserror::Error;

/// One pixel: red, green, blue, alpha, 8 bits each, in that order.
pub type Rgba = [u8; 4];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PixelBufferError {
    #[error("pixel count mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("pixel buffer must be at least 1x1")]
    Empty,
}

/// A `width × height` grid of RGBA pixels in row-major order.
///
/// The constructors enforce `pixels.len() == width * height` and reject
/// zero-sized buffers; there is no way to mutate a buffer after that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, pixels: Vec<Rgba>) -> Result<Self, PixelBufferError> {
        if width == 0 || height == 0 {
            return Err(PixelBufferError::Empty);
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(PixelBufferError::LengthMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build from interleaved `RGBARGBA...` bytes.
    pub fn from_rgba8(width: u32, height: u32, bytes: &[u8]) -> Result<Self, PixelBufferError> {
        if bytes.len() % 4 != 0 {
            return Err(PixelBufferError::LengthMismatch {
                expected: width as usize * height as usize * 4,
                actual: bytes.len(),
            });
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|px| [px[0], px[1], px[2], px[3]])
            .collect();
        Self::new(width, height, pixels)
    }

    /// A buffer where every pixel has the same value.
    pub fn filled(width: u32, height: u32, pixel: Rgba) -> Result<Self, PixelBufferError> {
        Self::new(width, height, vec![pixel; width as usize * height as usize])
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    /// Pixel at column `x`, row `y`. Panics when out of bounds, like slice indexing.
    pub fn get(&self, x: u32, y: u32) -> Rgba {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// One row of pixels.
    pub fn row(&self, y: u32) -> &[Rgba] {
        let start = y as usize * self.width as usize;
        &self.pixels[start..start + self.width as usize]
    }

    /// Interleaved `RGBARGBA...` bytes.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels.iter().flatten().copied().collect()
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        // Dimensions and length are guaranteed consistent by construction.
        RgbaImage::from_fn(self.width, self.height, |x, y| image::Rgba(self.get(x, y)))
    }
}

impl TryFrom<RgbaImage> for PixelBuffer {
    type Error = PixelBufferError;

    fn try_from(img: RgbaImage) -> Result<Self, Self::Error> {
        let (width, height) = img.dimensions();
        Self::from_rgba8(width, height, img.as_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_length_mismatch() {
        let err = PixelBuffer::new(2, 2, vec![[0; 4]; 3]).unwrap_err();
        assert_eq!(
            err,
            PixelBufferError::LengthMismatch {
                expected: 4,
                actual: 3
            }
        );
    }

    #[test]
    fn new_rejects_zero_dimensions() {
        assert_eq!(
            PixelBuffer::new(0, 5, Vec::new()).unwrap_err(),
            PixelBufferError::Empty
        );
        assert_eq!(
            PixelBuffer::new(5, 0, Vec::new()).unwrap_err(),
            PixelBufferError::Empty
        );
    }

    #[test]
    fn from_rgba8_keeps_channel_order() {
        let buf = PixelBuffer::from_rgba8(2, 1, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(buf.get(0, 0), [1, 2, 3, 4]);
        assert_eq!(buf.get(1, 0), [5, 6, 7, 8]);
        assert_eq!(buf.to_rgba8(), vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn from_rgba8_rejects_partial_pixel() {
        assert!(PixelBuffer::from_rgba8(1, 1, &[1, 2, 3]).is_err());
    }

    #[test]
    fn row_slices_by_width() {
        let buf = PixelBuffer::new(2, 2, vec![[0; 4], [1; 4], [2; 4], [3; 4]]).unwrap();
        assert_eq!(buf.row(1), &[[2; 4], [3; 4]]);
    }

    #[test]
    fn rgba_image_conversion_preserves_pixels() {
        let buf = PixelBuffer::new(2, 1, vec![[10, 20, 30, 40], [50, 60, 70, 80]]).unwrap();
        let img = buf.to_rgba_image();
        assert_eq!(img.get_pixel(1, 0).0, [50, 60, 70, 80]);

        let back = PixelBuffer::try_from(img).unwrap();
        assert_eq!(back, buf);
    }
}
