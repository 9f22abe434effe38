//! Box-filter downsampling.
//!
//! Each destination pixel is the average of a rectangular window of source
//! pixels rather than a single point sample, which keeps fine detail (text,
//! foliage, fabric) from turning into moiré when the scale ratio is large.
//!
//! ```text
//!   crop region (9x6)                 destination (3x2)
//!   ┌───┬───┬───┐
//!   │ a │ b │ c │   each 3x3 block    ┌───┬───┬───┐
//!   ├───┼───┼───┤   is averaged  ──▶  │ a │ b │ c │
//!   │ d │ e │ f │   per channel       │ d │ e │ f │
//!   └───┴───┴───┘                     └───┴───┴───┘
//! ```
//!
//! The window size comes straight from the scale factor:
//! `range = round(crop / dest)` per axis. When the destination is more than
//! twice the crop size the window rounds to zero and is treated as a single
//! pixel, so upscaling degrades to nearest-neighbour instead of failing.
//!
//! Destination rows are independent, so they are computed in parallel on the
//! rayon pool. The output is identical to a sequential pass.

use super::calculations::{CropRect, round_half_up};
use super::pixels::{PixelBuffer, Rgba};
use rayon::prelude::*;

/// Sampling geometry shared by every destination pixel.
#[derive(Debug, Clone, Copy)]
struct Window {
    scale_x: f64,
    scale_y: f64,
    range_x: u32,
    range_y: u32,
}

impl Window {
    fn new(crop: CropRect, dest_width: u32, dest_height: u32) -> Self {
        let scale_x = dest_width as f64 / crop.width as f64;
        let scale_y = dest_height as f64 / crop.height as f64;
        Self {
            scale_x,
            scale_y,
            // A zero window only happens when upscaling; sample the anchor alone.
            range_x: round_half_up(1.0 / scale_x).max(1),
            range_y: round_half_up(1.0 / scale_y).max(1),
        }
    }

    fn area(&self) -> u64 {
        self.range_x as u64 * self.range_y as u64
    }
}

/// Downsample the `crop` region of `source` to `dest_width × dest_height`.
///
/// `crop` must lie inside `source` (see [`CropRect::fits_within`]);
/// [`calculate_crop`](super::calculate_crop) always produces such a rectangle.
/// A window may read source pixels just past the crop edge; a window that
/// would leave the source reuses its last column or row.
///
/// # Panics
/// Panics if `dest_width` or `dest_height` is zero.
pub fn downsample(
    source: &PixelBuffer,
    crop: CropRect,
    dest_width: u32,
    dest_height: u32,
) -> PixelBuffer {
    assert!(
        dest_width > 0 && dest_height > 0,
        "destination must be at least 1x1"
    );
    debug_assert!(
        crop.fits_within(source.width(), source.height()),
        "crop {crop:?} escapes {}x{} source",
        source.width(),
        source.height()
    );

    let window = Window::new(crop, dest_width, dest_height);
    let last_col = source.width() - 1;
    let last_row = source.height() - 1;

    let mut pixels: Vec<Rgba> = vec![[0; 4]; dest_width as usize * dest_height as usize];
    pixels
        .par_chunks_mut(dest_width as usize)
        .enumerate()
        .for_each(|(dest_row, out_row)| {
            let anchor_row = crop.y + round_half_up(dest_row as f64 / window.scale_y);
            for (dest_col, out) in out_row.iter_mut().enumerate() {
                let anchor_col = crop.x + round_half_up(dest_col as f64 / window.scale_x);
                *out = average_window(source, anchor_col, anchor_row, window, last_col, last_row);
            }
        });

    // Length is dest_width * dest_height by construction.
    match PixelBuffer::new(dest_width, dest_height, pixels) {
        Ok(buffer) => buffer,
        Err(e) => unreachable!("downsample produced an invalid buffer: {e}"),
    }
}

/// Average each channel over the window anchored at `(col, row)`.
#[inline]
fn average_window(
    source: &PixelBuffer,
    col: u32,
    row: u32,
    window: Window,
    last_col: u32,
    last_row: u32,
) -> Rgba {
    let mut sums = [0u64; 4];
    for dy in 0..window.range_y {
        let y = (row + dy).min(last_row);
        let src_row = source.row(y);
        for dx in 0..window.range_x {
            let x = (col + dx).min(last_col);
            let px = src_row[x as usize];
            for (sum, channel) in sums.iter_mut().zip(px) {
                *sum += channel as u64;
            }
        }
    }

    let area = window.area() as f64;
    sums.map(|sum| round_half_up(sum as f64 / area).min(255) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{checkerboard, gradient};

    fn full(buf: &PixelBuffer) -> CropRect {
        CropRect::full(buf.width(), buf.height())
    }

    // =========================================================================
    // Averaging behaviour
    // =========================================================================

    #[test]
    fn same_size_is_identity() {
        let src = gradient(7, 5);
        let out = downsample(&src, full(&src), 7, 5);
        assert_eq!(out, src);
    }

    #[test]
    fn same_size_as_crop_copies_crop_region() {
        let src = gradient(10, 8);
        let crop = CropRect {
            x: 3,
            y: 2,
            width: 4,
            height: 5,
        };
        let out = downsample(&src, crop, 4, 5);
        for y in 0..5 {
            for x in 0..4 {
                assert_eq!(out.get(x, y), src.get(x + 3, y + 2));
            }
        }
    }

    #[test]
    fn uniform_color_stays_uniform() {
        let color = [12, 200, 99, 180];
        let src = PixelBuffer::filled(4, 4, color).unwrap();
        let out = downsample(&src, full(&src), 2, 2);
        assert_eq!(out.dimensions(), (2, 2));
        assert!(out.pixels().iter().all(|&px| px == color));
    }

    #[test]
    fn black_and_white_window_averages_to_midpoint() {
        // Every 2x2 window holds two black and two white pixels: 510 / 4 = 127.5 → 128
        let src = checkerboard(4, 4, 1);
        let out = downsample(&src, full(&src), 2, 2);
        assert!(out.pixels().iter().all(|&px| px == [128, 128, 128, 255]));
    }

    #[test]
    fn aligned_blocks_keep_their_colors() {
        // 2x2 blocks line up with the 2x2 window, so each output pixel is one block
        let src = checkerboard(4, 4, 2);
        let out = downsample(&src, full(&src), 2, 2);
        assert_eq!(out.get(0, 0), [0, 0, 0, 255]);
        assert_eq!(out.get(1, 0), [255, 255, 255, 255]);
        assert_eq!(out.get(0, 1), [255, 255, 255, 255]);
        assert_eq!(out.get(1, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn saturated_input_never_overflows() {
        let src = PixelBuffer::filled(9, 9, [255; 4]).unwrap();
        let out = downsample(&src, full(&src), 2, 2);
        assert!(out.pixels().iter().all(|&px| px == [255; 4]));
    }

    #[test]
    fn channels_are_averaged_independently() {
        let src = PixelBuffer::new(
            2,
            1,
            vec![[10, 0, 255, 0], [20, 255, 0, 255]],
        )
        .unwrap();
        let out = downsample(&src, full(&src), 1, 1);
        // (10+20)/2 = 15, 255/2 = 127.5 → 128 for the other three
        assert_eq!(out.get(0, 0), [15, 128, 128, 128]);
    }

    #[test]
    fn crop_offset_selects_region() {
        // Left half black, right half white; crop the right half only
        let mut pixels = Vec::new();
        for _y in 0..4 {
            for x in 0..8 {
                pixels.push(if x < 4 { [0, 0, 0, 255] } else { [255; 4] });
            }
        }
        let src = PixelBuffer::new(8, 4, pixels).unwrap();
        let crop = CropRect {
            x: 4,
            y: 0,
            width: 4,
            height: 4,
        };
        let out = downsample(&src, crop, 2, 2);
        assert!(out.pixels().iter().all(|&px| px == [255; 4]));
    }

    // =========================================================================
    // Edge cases
    // =========================================================================

    #[test]
    fn non_integer_ratio_stays_in_bounds() {
        // 10 → 4 gives a 3-wide window whose last anchor sits at column 8;
        // the window is clamped to the source edge instead of wrapping
        let src = gradient(10, 10);
        let out = downsample(&src, full(&src), 4, 4);
        assert_eq!(out.dimensions(), (4, 4));
    }

    #[test]
    fn window_repeats_last_source_column() {
        // Column x holds grey level 10x; windows start at 0, 3, 5, 8
        let mut pixels = Vec::new();
        for _y in 0..10 {
            for x in 0..10u8 {
                pixels.push([x * 10, x * 10, x * 10, 255]);
            }
        }
        let src = PixelBuffer::new(10, 10, pixels).unwrap();
        let out = downsample(&src, full(&src), 4, 4);
        // Last window covers columns 8, 9, 9: (80 + 90 + 90) / 3 = 86.67 → 87
        let expected: [Rgba; 4] = [
            [10, 10, 10, 255],
            [40, 40, 40, 255],
            [60, 60, 60, 255],
            [87, 87, 87, 255],
        ];
        assert_eq!(out.row(0), &expected);
        assert_eq!(out.row(3), &expected);
    }

    #[test]
    fn window_reads_source_past_crop_edge() {
        // Black for x < 15, white from 15; centred crop is columns 5..15
        let mut pixels = Vec::new();
        for _y in 0..10 {
            for x in 0..20 {
                pixels.push(if x < 15 { [0, 0, 0, 255] } else { [255; 4] });
            }
        }
        let src = PixelBuffer::new(20, 10, pixels).unwrap();
        let crop = CropRect {
            x: 5,
            y: 0,
            width: 10,
            height: 10,
        };
        let out = downsample(&src, crop, 4, 4);
        // Last window covers columns 13, 14, 15: 255 / 3 = 85
        let black = [0, 0, 0, 255];
        let expected: [Rgba; 4] = [black, black, black, [85, 85, 85, 255]];
        assert_eq!(out.row(0), &expected);
    }

    #[test]
    fn upscaling_is_nearest_neighbour() {
        let src = PixelBuffer::new(2, 1, vec![[1; 4], [2; 4]]).unwrap();
        let out = downsample(&src, full(&src), 8, 1);
        assert_eq!(out.dimensions(), (8, 1));
        assert_eq!(out.get(0, 0), [1; 4]);
        assert_eq!(out.get(7, 0), [2; 4]);
    }

    #[test]
    fn single_pixel_destination_averages_whole_crop() {
        let src = PixelBuffer::new(2, 2, vec![[0; 4], [100; 4], [200; 4], [40; 4]]).unwrap();
        let out = downsample(&src, full(&src), 1, 1);
        // 340 / 4 = 85
        assert_eq!(out.get(0, 0), [85; 4]);
    }

    #[test]
    fn parallel_rows_match_row_by_row_result() {
        let src = gradient(64, 48);
        let whole = downsample(&src, full(&src), 16, 12);
        for row in 0..12 {
            let crop = CropRect {
                x: 0,
                y: row * 4,
                width: 64,
                height: 4,
            };
            let strip = downsample(&src, crop, 16, 1);
            assert_eq!(strip.row(0), whole.row(row), "row {row}");
        }
    }
}
