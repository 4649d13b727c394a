//! Pixel transforms
//!
//! The geometric pass (`flipgridx`) runs first as a buffer-to-buffer copy,
//! then `replace` and `hueshift` run together in a single pass over the
//! pixels. This order does not depend on the order of the path.

use std::collections::HashMap;

use image::RgbaImage;

use super::ops::{ImageOpChain, ImageOperation, Rgb};
use crate::error::Error;

/// A chain reduced to the work it actually does.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformPlan {
    /// Total hue rotation in degrees, wrapped into `[0, 360)`.
    pub hue_shift: f64,
    /// Color substitutions; later pairs override earlier ones.
    pub replace: HashMap<Rgb, Rgb>,
    /// Tile width of the last `flipgridx`.
    pub flip_tile_width: Option<u32>,
}

impl TransformPlan {
    /// Fold a chain into a plan.
    pub fn from_chain(chain: &ImageOpChain) -> Self {
        let mut plan = Self::default();

        for op in chain.operations() {
            match op {
                ImageOperation::HueShift(degrees) => plan.hue_shift += degrees,
                ImageOperation::Replace(pairs) => plan.replace.extend(pairs.iter().copied()),
                ImageOperation::FlipGridX(width) => plan.flip_tile_width = Some(*width),
                ImageOperation::Unsupported { .. } => {}
            }
        }

        plan.hue_shift = plan.hue_shift.rem_euclid(360.0);
        plan
    }

    /// Whether applying the plan would leave every pixel unchanged.
    pub fn is_identity(&self) -> bool {
        self.hue_shift.abs() < f64::EPSILON
            && self.replace.is_empty()
            && self.flip_tile_width.is_none()
    }
}

/// Apply `chain` to `base`. `path` is only used in log messages.
pub fn apply_chain(base: &RgbaImage, chain: &ImageOpChain, path: &str) -> RgbaImage {
    let plan = TransformPlan::from_chain(chain);

    let mut image = match plan.flip_tile_width {
        Some(tile_width) => flip_grid_x(base, tile_width, path),
        None => base.clone(),
    };

    apply_pixel_ops(&mut image, &plan);
    image
}

/// Mirror each `tile_width` wide column of tiles in place.
///
/// Columns past the last whole tile are copied unchanged.
pub fn flip_grid_x(base: &RgbaImage, tile_width: u32, path: &str) -> RgbaImage {
    let mut flipped = base.clone();
    if tile_width == 0 {
        return flipped;
    }

    let width = base.width();
    if width % tile_width != 0 {
        tracing::warn!(
            "{}",
            Error::TileDimensionMismatch {
                width,
                tile_width,
                path: path.to_string(),
            }
        );
    }

    let tiles = width / tile_width;
    for y in 0..base.height() {
        for tile in 0..tiles {
            let left = tile * tile_width;
            for x in 0..tile_width {
                let source = base.get_pixel(left + tile_width - 1 - x, y);
                flipped.put_pixel(left + x, y, *source);
            }
        }
    }

    flipped
}

fn apply_pixel_ops(image: &mut RgbaImage, plan: &TransformPlan) {
    let shift_hue = plan.hue_shift.abs() >= f64::EPSILON;
    if !shift_hue && plan.replace.is_empty() {
        return;
    }

    for pixel in image.pixels_mut() {
        let mut rgb = [pixel[0], pixel[1], pixel[2]];

        if let Some(to) = plan.replace.get(&rgb) {
            rgb = *to;
        }

        if shift_hue {
            let (h, s, v) = rgb_to_hsv(rgb);
            rgb = hsv_to_rgb(((h + plan.hue_shift).rem_euclid(360.0), s, v));
        }

        pixel[0] = rgb[0];
        pixel[1] = rgb[1];
        pixel[2] = rgb[2];
    }
}

/// RGB to HSV; hue in degrees `[0, 360)`, saturation and value in `[0, 1]`.
pub fn rgb_to_hsv([r, g, b]: Rgb) -> (f64, f64, f64) {
    let r = f64::from(r) / 255.0;
    let g = f64::from(g) / 255.0;
    let b = f64::from(b) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let h = if delta <= 0.0 {
        0.0
    } else if r >= g && r >= b {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if g >= b {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let s = if max <= 0.0 { 0.0 } else { delta / max };
    (h.rem_euclid(360.0), s, max)
}

/// HSV back to RGB, rounding each channel to the nearest integer.
pub fn hsv_to_rgb((h, s, v): (f64, f64, f64)) -> Rgb {
    let c = v * s;
    let sector = h.rem_euclid(360.0) / 60.0;
    let x = c * (1.0 - (sector.rem_euclid(2.0) - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match sector as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    let channel = |value: f64| ((value + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    [channel(r), channel(g), channel(b)]
}
