use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::color::{from_rgb32, to_rgb32};
use crate::graphics::palette::{NearestColorMetric, Palette};

use super::{clamp_channel, snap};

const BAYER_4X4: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

const BAYER_8X8: [[u8; 8]; 8] = [
	[0, 48, 12, 60, 3, 51, 15, 63],
	[32, 16, 44, 28, 35, 19, 47, 31],
	[8, 56, 4, 52, 11, 59, 7, 55],
	[40, 24, 36, 20, 43, 27, 39, 23],
	[2, 50, 14, 62, 1, 49, 13, 61],
	[34, 18, 46, 30, 33, 17, 45, 29],
	[10, 58, 6, 54, 9, 57, 5, 53],
	[42, 26, 38, 22, 41, 25, 37, 21],
];

/// Ordered (Bayer) dithering with a 4x4 threshold matrix (`D=4`, `F=17`).
pub fn ordered_4x4(bitmap: &mut RgbaBitmap, palette: &Palette, metric: NearestColorMetric) {
	apply(bitmap, palette, metric, 4, 17, |x, y| BAYER_4X4[y % 4][x % 4] as i32 + 1);
}

/// Ordered (Bayer) dithering with an 8x8 threshold matrix (`D=8`, `F=65`).
pub fn ordered_8x8(bitmap: &mut RgbaBitmap, palette: &Palette, metric: NearestColorMetric) {
	apply(bitmap, palette, metric, 8, 65, |x, y| BAYER_8X8[y % 8][x % 8] as i32 + 1);
}

fn apply(
	bitmap: &mut RgbaBitmap,
	palette: &Palette,
	metric: NearestColorMetric,
	_dimension: u32,
	threshold_factor: i32,
	threshold_at: impl Fn(usize, usize) -> i32,
) {
	let width = bitmap.width() as i32;
	let height = bitmap.height() as i32;

	for y in 0..height {
		for x in 0..width {
			let original = bitmap.get_pixel(x, y).unwrap();
			let (r, g, b) = from_rgb32(original);
			let t = threshold_at(x as usize, y as usize);

			let adjust = |channel: u8| -> u8 {
				let c = channel as i32;
				clamp_channel(c + (c * t) / threshold_factor - threshold_factor / 2)
			};

			let thresholded = to_rgb32(adjust(r), adjust(g), adjust(b));
			bitmap.set_pixel(x, y, snap(thresholded, palette, metric));
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graphics::color::to_rgb32;

	#[test]
	fn ordered_4x4_leaves_every_pixel_in_the_palette() {
		let mut bitmap = RgbaBitmap::new(8, 8).unwrap();
		for (i, pixel) in bitmap.pixels_mut().iter_mut().enumerate() {
			*pixel = to_rgb32((i * 17) as u8, (i * 31) as u8, (i * 53) as u8);
		}

		let mut palette = Palette::new();
		palette.add(to_rgb32(0, 0, 0)).unwrap();
		palette.add(to_rgb32(255, 255, 255)).unwrap();

		ordered_4x4(&mut bitmap, &palette, NearestColorMetric::EuclideanSquared);

		for &pixel in bitmap.pixels() {
			assert!(palette.iter().any(|c| c == pixel));
		}
	}

	#[test]
	fn ordered_8x8_leaves_every_pixel_in_the_palette() {
		let mut bitmap = RgbaBitmap::new(8, 8).unwrap();
		for (i, pixel) in bitmap.pixels_mut().iter_mut().enumerate() {
			*pixel = to_rgb32((i * 17) as u8, (i * 31) as u8, (i * 53) as u8);
		}

		let mut palette = Palette::new();
		palette.add(to_rgb32(0, 0, 0)).unwrap();
		palette.add(to_rgb32(255, 255, 255)).unwrap();

		ordered_8x8(&mut bitmap, &palette, NearestColorMetric::EuclideanSquared);

		for &pixel in bitmap.pixels() {
			assert!(palette.iter().any(|c| c == pixel));
		}
	}
}
