use crate::dither::{add_error, snap_and_diff};
use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::palette::{NearestColorMetric, Palette};

/// Atkinson error diffusion: distributes 1/8 of the error to each of six neighbours
/// (`x+1,y`; `x+2,y`; `x-1,y+1`; `x,y+1`; `x+1,y+1`; `x,y+2`). The remaining 2/8 is discarded,
/// which is what gives Atkinson dithering its characteristic higher-contrast look.
pub fn atkinson(bitmap: &mut RgbaBitmap, palette: &Palette, metric: NearestColorMetric) {
	let width = bitmap.width() as i32;
	let height = bitmap.height() as i32;

	for y in 0..height {
		for x in 0..width {
			let original = bitmap.get_pixel(x, y).unwrap();
			let snapped = snap_and_diff(original, palette, metric);
			bitmap.set_pixel(x, y, snapped.color);

			for &(dx, dy) in &[(1, 0), (2, 0), (-1, 1), (0, 1), (1, 1), (0, 2)] {
				add_error(bitmap, x + dx, y + dy, snapped.error, 1.0 / 8.0);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graphics::color::to_rgb32;

	#[test]
	fn every_pixel_ends_up_in_the_palette() {
		let mut bitmap = RgbaBitmap::new(8, 8).unwrap();
		for (i, pixel) in bitmap.pixels_mut().iter_mut().enumerate() {
			*pixel = to_rgb32((i * 3) as u8, (i * 5) as u8, (i * 7) as u8);
		}

		let mut palette = Palette::new();
		palette.add(to_rgb32(0, 0, 0)).unwrap();
		palette.add(to_rgb32(255, 255, 255)).unwrap();

		atkinson(&mut bitmap, &palette, NearestColorMetric::EuclideanSquared);

		for &pixel in bitmap.pixels() {
			assert!(palette.iter().any(|c| c == pixel));
		}
	}
}
