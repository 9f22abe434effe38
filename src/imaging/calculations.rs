//! Pure calculation functions for crop geometry.
//!
//! All functions here are pure and testable without any I/O or images.

/// Round half up: `trunc(value + 0.5)`.
///
/// Only meaningful for non-negative inputs, which is all the downsampler
/// ever feeds it (scale ratios and channel averages).
#[inline]
pub fn round_half_up(value: f64) -> u32 {
    (value + 0.5) as u32
}

/// Region of a source buffer selected for resampling.
///
/// Always contained in the source it was computed for:
/// `x + width <= source_width` and `y + height <= source_height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    /// The whole of a `width × height` source.
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    /// Whether this rectangle lies inside a source of the given size.
    pub fn fits_within(&self, source_width: u32, source_height: u32) -> bool {
        self.width > 0
            && self.height > 0
            && self.x as u64 + self.width as u64 <= source_width as u64
            && self.y as u64 + self.height as u64 <= source_height as u64
    }
}

/// Explicit crop offset overrides. `None` centres the crop on that axis.
///
/// `Some(0)` is an explicit offset, not "unset": it pins the crop to the left
/// or top edge. Callers that treat zero as "centre" must map it to `None`
/// themselves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CropOffset {
    pub x: Option<u32>,
    pub y: Option<u32>,
}

/// Calculate the crop rectangle that matches the destination aspect ratio.
///
/// The crop keeps as much of the source as possible: if the destination is
/// wider than the source, the full width is kept and the height is reduced;
/// otherwise the full height is kept and the width is reduced. Dimensions are
/// floored so the rectangle never exceeds the source.
///
/// Offsets default to centring. An explicit offset is used as given, clamped
/// so the rectangle stays inside the source.
///
/// # Arguments
/// * `source` - Source dimensions (width, height), both non-zero
/// * `dest` - Destination dimensions (width, height), both non-zero
/// * `offset` - Optional offset overrides
///
/// # Examples
/// ```
/// # use boxscale::imaging::{CropOffset, CropRect, calculate_crop};
/// // 2:1 landscape to a square → centred 500x500
/// let crop = calculate_crop((1000, 500), (200, 200), CropOffset::default());
/// assert_eq!(crop, CropRect { x: 250, y: 0, width: 500, height: 500 });
/// ```
pub fn calculate_crop(source: (u32, u32), dest: (u32, u32), offset: CropOffset) -> CropRect {
    let (src_w, src_h) = source;
    let (dst_w, dst_h) = dest;

    let dest_ratio = dst_w as f64 / dst_h as f64;
    let source_ratio = src_w as f64 / src_h as f64;

    let (crop_w, crop_h) = if dest_ratio > source_ratio {
        // Destination is wider: keep full width, trim height
        (src_w, (src_w as f64 / dest_ratio) as u32)
    } else {
        // Destination is taller (or equal): keep full height, trim width
        ((src_h as f64 * dest_ratio) as u32, src_h)
    };
    let crop_w = crop_w.clamp(1, src_w);
    let crop_h = crop_h.clamp(1, src_h);

    let slack_x = src_w - crop_w;
    let slack_y = src_h - crop_h;

    CropRect {
        x: offset.x.map_or(slack_x / 2, |x| x.min(slack_x)),
        y: offset.y.map_or(slack_y / 2, |y| y.min(slack_y)),
        width: crop_w,
        height: crop_h,
    }
}
