//! Gradient lookup tables, sampling and ordered dithering.
//!
//! A gradient's stops are baked on the host into a 130-entry table stored
//! right after the gradient payload. Entry 0 holds the color used below
//! offset 0, entries 1..=128 are the ramp, and entry 129 holds the color
//! used from offset 1 upwards. Each entry is a pair of colors, start and end
//! of its slice of the ramp, so the fragment stage only ever does one
//! two-quad fetch and one `mix`.

use image::GrayImage;

use crate::allocator::{GpuBlockWriter, GpuCacheAddress, GpuCacheBuilder};
use crate::error::{Error, Result};
use crate::fetch::{fetch_2, CacheTexture};
use crate::layout::{GRADIENT_DATA_SIZE, GRADIENT_ENTRIES, VECS_PER_GRADIENT};
use crate::records::{GradientPrimitive, GradientStop, PrimitiveGeometry};
use crate::types::ColorF;

const FIRST_STOP: usize = 0;
const TABLE_BEGIN: usize = 1;
const TABLE_END: usize = GRADIENT_ENTRIES + 1;
const LAST_STOP: usize = GRADIENT_DATA_SIZE - 1;

/// The 8×8 ordered dither (Bayer) matrix, values 0..64.
pub const DITHER_MATRIX: [u8; 64] = [
    0, 48, 12, 60, 3, 51, 15, 63, //
    32, 16, 44, 28, 35, 19, 47, 31, //
    8, 56, 4, 52, 11, 59, 7, 55, //
    40, 24, 36, 20, 43, 27, 39, 23, //
    2, 50, 14, 62, 1, 49, 13, 61, //
    34, 18, 46, 30, 33, 17, 45, 29, //
    10, 58, 6, 54, 9, 57, 5, 53, //
    42, 26, 38, 22, 41, 25, 37, 21,
];

#[derive(Copy, Clone, Debug, Default)]
struct GradientDataEntry {
    start_color: ColorF,
    end_color: ColorF,
}

/// Builds the 130-entry color table for a set of stops.
#[derive(Debug)]
pub struct GradientGpuBlockBuilder<'a> {
    stops: &'a [GradientStop],
}

impl<'a> GradientGpuBlockBuilder<'a> {
    /// A builder over `stops`, which must be sorted by offset.
    ///
    /// # Errors
    ///
    /// [`Error::NotEnoughStops`] for fewer than two stops.
    pub fn new(stops: &'a [GradientStop]) -> Result<Self> {
        if stops.len() < 2 {
            return Err(Error::NotEnoughStops(stops.len()));
        }
        Ok(Self { stops })
    }

    /// Table entry that `offset` starts at.
    #[expect(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn get_index(offset: f32) -> usize {
        (offset.clamp(0.0, 1.0) * GRADIENT_ENTRIES as f32 + TABLE_BEGIN as f32).round() as usize
    }

    /// Ramp linearly from `start_color` to `end_color` across
    /// `start_idx..end_idx`.
    #[expect(clippy::cast_precision_loss)]
    fn fill_colors(
        start_idx: usize,
        end_idx: usize,
        start_color: ColorF,
        end_color: ColorF,
        entries: &mut [GradientDataEntry],
    ) {
        let steps = (end_idx - start_idx) as f32;
        for (i, entry) in entries[start_idx..end_idx].iter_mut().enumerate() {
            entry.start_color = start_color.mix(end_color, i as f32 / steps);
            entry.end_color = start_color.mix(end_color, (i + 1) as f32 / steps);
        }
    }

    fn entries(&self, reverse: bool) -> [GradientDataEntry; GRADIENT_DATA_SIZE] {
        let mut entries = [GradientDataEntry::default(); GRADIENT_DATA_SIZE];
        let premultiplied = |stop: &GradientStop| stop.color.premultiplied();

        if reverse {
            let mut cur_color = premultiplied(&self.stops[0]);
            Self::fill_colors(LAST_STOP, LAST_STOP + 1, cur_color, cur_color, &mut entries);
            let mut cur_idx = TABLE_END;
            for next in self.stops {
                let next_color = premultiplied(next);
                let next_idx = Self::get_index(1.0 - next.offset);
                if next_idx < cur_idx {
                    Self::fill_colors(next_idx, cur_idx, next_color, cur_color, &mut entries);
                    cur_idx = next_idx;
                }
                cur_color = next_color;
            }
            if cur_idx > TABLE_BEGIN {
                Self::fill_colors(TABLE_BEGIN, cur_idx, cur_color, cur_color, &mut entries);
            }
            Self::fill_colors(FIRST_STOP, FIRST_STOP + 1, cur_color, cur_color, &mut entries);
        } else {
            let mut cur_color = premultiplied(&self.stops[0]);
            Self::fill_colors(FIRST_STOP, FIRST_STOP + 1, cur_color, cur_color, &mut entries);
            let mut cur_idx = TABLE_BEGIN;
            for next in self.stops {
                let next_color = premultiplied(next);
                let next_idx = Self::get_index(next.offset);
                if next_idx > cur_idx {
                    Self::fill_colors(cur_idx, next_idx, cur_color, next_color, &mut entries);
                    cur_idx = next_idx;
                }
                cur_color = next_color;
            }
            if cur_idx < TABLE_END {
                Self::fill_colors(cur_idx, TABLE_END, cur_color, cur_color, &mut entries);
            }
            Self::fill_colors(LAST_STOP, LAST_STOP + 1, cur_color, cur_color, &mut entries);
        }
        entries
    }

    /// Write the table, start and end color per entry. With `reverse` the
    /// table runs from the last stop to the first.
    pub fn build(&self, reverse: bool, writer: &mut GpuBlockWriter<'_>) {
        for entry in self.entries(reverse) {
            writer.push_quad(entry.start_color);
            writer.push_quad(entry.end_color);
        }
    }
}

/// Pack a linear gradient: header, payload, then its color table.
///
/// The table lives at `address.specific() + VECS_PER_GRADIENT`.
///
/// # Errors
///
/// Fails for fewer than two stops or a full cache.
pub fn push_gradient(
    cache: &mut GpuCacheBuilder,
    geometry: &PrimitiveGeometry,
    gradient: &GradientPrimitive,
    stops: &[GradientStop],
    reverse: bool,
) -> Result<GpuCacheAddress> {
    let table = GradientGpuBlockBuilder::new(stops)?;
    cache.push_block(|w| {
        w.push(geometry);
        w.push(gradient);
        table.build(reverse, w);
    })
}

/// Address of the color table of a gradient whose payload is at
/// `specific_prim_address`.
#[must_use]
#[expect(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub fn table_address(specific_prim_address: i32) -> i32 {
    specific_prim_address.wrapping_add(VECS_PER_GRADIENT as i32)
}

/// Look up the gradient color at `offset`.
///
/// With `repeat` the offset wraps into `[0, 1)`; otherwise offsets below 0
/// and from 1 up take the end colors.
#[must_use]
#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn sample_gradient(cache: &CacheTexture, address: i32, offset: f32, repeat: bool) -> ColorF {
    let x = if repeat { offset - offset.floor() } else { offset };
    let x = 1.0 + x * GRADIENT_ENTRIES as f32;
    // Clamped while still a float, so the cast stays in range.
    let entry = x.floor().clamp(0.0, (GRADIENT_ENTRIES + 1) as f32) as i32;
    let [start, end] = fetch_2(cache, address.wrapping_add(2 * entry));
    ColorF::from_quad(start).mix(ColorF::from_quad(end), x - x.floor())
}

/// The dither pattern as an 8×8 R8 texture holding raw matrix values.
#[must_use]
pub fn dither_texture() -> GrayImage {
    GrayImage::from_fn(8, 8, |x, y| image::Luma([DITHER_MATRIX[(y * 8 + x) as usize]]))
}

/// Noise added to each color channel at a fragment position.
#[must_use]
pub fn dither_noise(frag_coord: (u32, u32)) -> f32 {
    let m = DITHER_MATRIX[((frag_coord.1 & 7) * 8 + (frag_coord.0 & 7)) as usize];
    let normalized = (f32::from(m) + 0.5) / 64.0;
    (normalized - 0.5) / 256.0
}

/// Add ordered-dither noise to the color channels. Alpha is untouched.
#[must_use]
pub fn dither(color: ColorF, frag_coord: (u32, u32)) -> ColorF {
    let noise = dither_noise(frag_coord);
    ColorF::new(color.r + noise, color.g + noise, color.b + noise, color.a)
}
