use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::palette::Palette;
use crate::utils::rnd_value;

/// Picks `k` random pixels from `bitmap` as the palette.
pub fn quantize_random(bitmap: &RgbaBitmap, k: usize) -> Palette {
	let pixels = bitmap.pixels();
	let mut palette = Palette::with_capacity(k);
	if pixels.is_empty() {
		return palette;
	}
	for _ in 0..k {
		let index = rnd_value(0, pixels.len() - 1);
		let (r, g, b) = crate::graphics::color::from_rgb32(pixels[index]);
		palette.add(crate::graphics::color::to_rgb32(r, g, b)).expect("k is bounded by the palette's caller");
	}
	palette
}
