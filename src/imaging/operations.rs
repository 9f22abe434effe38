//! High-level pixel operations.
//!
//! These functions combine the crop calculation with the downsampler. They
//! take a decoded buffer and request geometry and return the scaled pixels;
//! no I/O happens here.

use super::calculations::{CropOffset, CropRect, calculate_crop};
use super::downsample::downsample;
use super::pixels::PixelBuffer;

/// Geometry of one scale operation, computed but not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalePlan {
    pub crop: CropRect,
    pub dest_width: u32,
    pub dest_height: u32,
}

/// Plan a scale operation without executing it.
///
/// Useful for testing crop selection and for reporting what a request did.
pub fn plan_scale(
    source: (u32, u32),
    dest_width: u32,
    dest_height: u32,
    offset: CropOffset,
) -> ScalePlan {
    ScalePlan {
        crop: calculate_crop(source, (dest_width, dest_height), offset),
        dest_width,
        dest_height,
    }
}

/// Crop `source` to the destination aspect ratio, then box-filter it down to
/// `dest_width × dest_height`.
pub fn scale_pixels(
    source: &PixelBuffer,
    dest_width: u32,
    dest_height: u32,
    offset: CropOffset,
) -> PixelBuffer {
    let plan = plan_scale(source.dimensions(), dest_width, dest_height, offset);
    downsample(source, plan.crop, plan.dest_width, plan.dest_height)
}
