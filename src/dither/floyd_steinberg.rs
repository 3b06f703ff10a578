use crate::dither::{add_error, snap_and_diff};
use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::palette::{NearestColorMetric, Palette};

/// Floyd-Steinberg error diffusion: distributes the quantization error to `(x+1,y)` 7/16,
/// `(x-1,y+1)` 3/16, `(x,y+1)` 5/16, and `(x+1,y+1)` 1/16.
pub fn floyd_steinberg(bitmap: &mut RgbaBitmap, palette: &Palette, metric: NearestColorMetric) {
	let width = bitmap.width() as i32;
	let height = bitmap.height() as i32;

	for y in 0..height {
		for x in 0..width {
			let original = bitmap.get_pixel(x, y).unwrap();
			let snapped = snap_and_diff(original, palette, metric);
			bitmap.set_pixel(x, y, snapped.color);

			add_error(bitmap, x + 1, y, snapped.error, 7.0 / 16.0);
			add_error(bitmap, x - 1, y + 1, snapped.error, 3.0 / 16.0);
			add_error(bitmap, x, y + 1, snapped.error, 5.0 / 16.0);
			add_error(bitmap, x + 1, y + 1, snapped.error, 1.0 / 16.0);
		}
	}
}
