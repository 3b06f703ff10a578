//! Palette reduction ("dithering"): each algorithm walks a true-colour
//! [`RgbaBitmap`](crate::graphics::bitmap::rgb::RgbaBitmap) in row-major order, replaces every
//! pixel with its nearest colour in a given [`Palette`], and (except [`nearest`]) diffuses the
//! resulting error to neighbouring, not-yet-visited pixels.

mod atkinson;
mod floyd_steinberg;
mod ordered;

pub use atkinson::atkinson;
pub use floyd_steinberg::floyd_steinberg;
pub use ordered::{ordered_4x4, ordered_8x8};

use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::color::{from_rgb32, to_rgb32};
use crate::graphics::palette::{NearestColorMetric, Palette};

/// Replaces every pixel of `bitmap` with its nearest colour in `palette`, with no error
/// diffusion or thresholding.
pub fn nearest(bitmap: &mut RgbaBitmap, palette: &Palette, metric: NearestColorMetric) {
	for pixel in bitmap.pixels_mut() {
		*pixel = snap(*pixel, palette, metric);
	}
}

fn snap(color: u32, palette: &Palette, metric: NearestColorMetric) -> u32 {
	palette.nearest_color(color, metric).unwrap_or(color)
}

/// The result of snapping a pixel to its nearest palette colour: the replacement colour, and the
/// signed per-channel residual (`original - replacement`) to diffuse to later pixels.
pub(crate) struct Snapped {
	pub color: u32,
	pub error: (i32, i32, i32),
}

pub(crate) fn snap_and_diff(original: u32, palette: &Palette, metric: NearestColorMetric) -> Snapped {
	let replacement = snap(original, palette, metric);
	let (or, og, ob) = from_rgb32(original);
	let (rr, rg, rb) = from_rgb32(replacement);
	Snapped { color: replacement, error: (or as i32 - rr as i32, og as i32 - rg as i32, ob as i32 - rb as i32) }
}

pub(crate) fn clamp_channel(value: i32) -> u8 {
	value.clamp(0, 255) as u8
}

/// Adds a fraction (`weight`) of `error` to the pixel at `(x, y)`, clamped per channel. A no-op
/// if `(x, y)` lies outside the bitmap's clip region (handles edge/corner pixels uniformly).
pub(crate) fn add_error(bitmap: &mut RgbaBitmap, x: i32, y: i32, error: (i32, i32, i32), weight: f32) {
	if let Some(color) = bitmap.get_pixel(x, y) {
		let (r, g, b) = from_rgb32(color);
		let r = clamp_channel(r as i32 + (error.0 as f32 * weight).round() as i32);
		let g = clamp_channel(g as i32 + (error.1 as f32 * weight).round() as i32);
		let b = clamp_channel(b as i32 + (error.2 as f32 * weight).round() as i32);
		bitmap.set_pixel(x, y, to_rgb32(r, g, b));
	}
}
