//! Palette construction and colour-quantization algorithms. Each quantizer takes a true-colour
//! [`RgbaBitmap`](crate::graphics::bitmap::rgb::RgbaBitmap) and returns a [`Palette`] that best
//! represents its colours; none of them mutate the source bitmap (see [`crate::dither`] for that).

mod kmeans;
mod median_cut;
mod random;
mod uniform;

pub use kmeans::quantize_kmeans;
pub use median_cut::quantize_median_cut;
pub use random::quantize_random;
pub use uniform::quantize_uniform;

use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::color::from_rgb32;
use crate::graphics::palette::{Palette, MAX_COLORS};

/// Builds a palette for `bitmap`: if it has 256 or fewer distinct colours, the palette holds
/// exactly those colours; otherwise falls back to [`quantize_uniform`] with 256 entries.
pub fn make_palette(bitmap: &RgbaBitmap) -> Palette {
	let mut sorted = rgb_values(bitmap);
	sorted.sort_unstable();
	sorted.dedup();

	if sorted.len() <= MAX_COLORS {
		let mut palette = Palette::with_capacity(sorted.len());
		for color in sorted {
			palette.add(color).expect("deduped colour count already checked against MAX_COLORS");
		}
		palette
	} else {
		quantize_uniform(bitmap, MAX_COLORS)
	}
}

/// Extracts every pixel's 24-bit RGB value (alpha discarded), in row-major order.
pub(crate) fn rgb_values(bitmap: &RgbaBitmap) -> Vec<u32> {
	bitmap
		.pixels()
		.iter()
		.map(|&pixel| {
			let (r, g, b) = from_rgb32(pixel);
			crate::graphics::color::to_rgb32(r, g, b)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graphics::color::to_rgb32;

	#[test]
	fn make_palette_keeps_exact_colours_under_the_limit() {
		let mut bitmap = RgbaBitmap::new(4, 1).unwrap();
		let colors = [to_rgb32(0, 0, 0), to_rgb32(255, 0, 0), to_rgb32(0, 0, 0), to_rgb32(0, 255, 0)];
		bitmap.pixels_mut().copy_from_slice(&colors);

		let palette = make_palette(&bitmap);
		assert_eq!(palette.len(), 3);
	}

	#[test]
	fn make_palette_falls_back_to_uniform_quantization_above_256_colours() {
		let mut bitmap = RgbaBitmap::new(512, 1).unwrap();
		for (x, pixel) in bitmap.pixels_mut().iter_mut().enumerate() {
			*pixel = to_rgb32((x % 256) as u8, ((x * 2) % 256) as u8, ((x * 3) % 256) as u8);
		}

		let palette = make_palette(&bitmap);
		assert_eq!(palette.len(), MAX_COLORS);
	}
}
