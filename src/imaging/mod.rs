//! Pixel-level imaging: buffers, crop geometry, box-filter resampling, and
//! the collaborator seams for decoding and encoding.
//!
//! | Operation | Where |
//! |---|---|
//! | **Pixel storage** | [`PixelBuffer`] (RGBA, immutable) |
//! | **Crop to aspect** | [`calculate_crop`] |
//! | **Box-filter resample** | [`downsample`] (rows in parallel via rayon) |
//! | **Decode / fetch** | [`Acquire`] → [`RustBackend`] (`image`, `reqwest`) |
//! | **Encode** | [`Produce`] → [`RustBackend`] (`image`, `base64`) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for crop geometry (unit testable)
//! - **Downsample**: The box filter itself
//! - **Parameters**: Output format, quality, and kind
//! - **Backend**: [`Acquire`] / [`Produce`] traits + [`RustBackend`]
//! - **Operations**: Crop + downsample combined

pub mod backend;
mod calculations;
mod downsample;
pub mod operations;
mod params;
mod pixels;
pub mod rust_backend;

pub use backend::{Acquire, BackendError, Output, Produce};
pub use calculations::{CropOffset, CropRect, calculate_crop, round_half_up};
pub use downsample::downsample;
pub use operations::{ScalePlan, plan_scale, scale_pixels};
pub use params::{ImageFormat, OutputKind, OutputOptions, Quality};
pub use pixels::{PixelBuffer, PixelBufferError, Rgba};
pub use rust_backend::RustBackend;
