use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::palette::Palette;
use crate::quantize::rgb_values;

/// Copies all pixels, sorts them by 24-bit value, and picks `k` evenly spaced samples.
pub fn quantize_uniform(bitmap: &RgbaBitmap, k: usize) -> Palette {
	let mut values = rgb_values(bitmap);
	values.sort_unstable();

	let mut palette = Palette::with_capacity(k);
	if values.is_empty() || k == 0 {
		return palette;
	}

	for i in 0..k {
		let sample_index = if k == 1 { 0 } else { (i * (values.len() - 1)) / (k - 1) };
		palette.add(values[sample_index.min(values.len() - 1)]).expect("k is bounded by the palette's caller");
	}
	palette
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graphics::color::to_rgb32;

	#[test]
	fn picks_evenly_spaced_samples() {
		let mut bitmap = RgbaBitmap::new(256, 1).unwrap();
		for (x, pixel) in bitmap.pixels_mut().iter_mut().enumerate() {
			*pixel = to_rgb32(x as u8, x as u8, x as u8);
		}

		let palette = quantize_uniform(&bitmap, 4);
		assert_eq!(palette.len(), 4);
		assert_eq!(palette.get(0), Some(to_rgb32(0, 0, 0)));
		assert_eq!(palette.get(3), Some(to_rgb32(255, 255, 255)));
	}
}
