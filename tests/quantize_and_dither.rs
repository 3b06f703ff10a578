use rasterkit::prelude::*;

fn photographic_gradient(width: u32, height: u32) -> RgbaBitmap {
	let mut bitmap = RgbaBitmap::new(width, height).unwrap();
	for y in 0..height {
		for x in 0..width {
			let r = ((x * 255) / width.max(1)) as u8;
			let g = ((y * 255) / height.max(1)) as u8;
			let b = (((x * 7 + y * 13) % 256) as u8).wrapping_add(1);
			bitmap.set_pixel(x as i32, y as i32, to_rgb32(r, g, b));
		}
	}
	bitmap
}

#[test]
fn every_quantizer_stays_within_the_requested_color_budget() {
	let bitmap = photographic_gradient(64, 48);

	for palette in [
		quantize_uniform(&bitmap, 32),
		quantize_random(&bitmap, 32),
		quantize_median_cut(&bitmap, 32),
		quantize_kmeans(&bitmap, 32),
	] {
		assert!(palette.len() <= 32);
		assert!(!palette.is_empty());
	}
}

#[test]
fn make_palette_prefers_exact_colors_for_small_images() {
	let mut bitmap = RgbaBitmap::new(2, 2).unwrap();
	bitmap.set_pixel(0, 0, to_rgb32(10, 20, 30));
	bitmap.set_pixel(1, 0, to_rgb32(40, 50, 60));
	bitmap.set_pixel(0, 1, to_rgb32(10, 20, 30));
	bitmap.set_pixel(1, 1, to_rgb32(70, 80, 90));

	let palette = make_palette(&bitmap);
	assert_eq!(palette.len(), 3);
}

#[test]
fn every_dither_strategy_leaves_pixels_exactly_in_the_palette() {
	let source = photographic_gradient(32, 32);
	let palette = quantize_median_cut(&source, 16);

    type DitherFn = fn(&mut RgbaBitmap, &Palette, NearestColorMetric);
	let strategies: [DitherFn; 5] = [nearest, floyd_steinberg, atkinson, ordered_4x4, ordered_8x8];

	for strategy in strategies {
		let mut working = source.clone();
		strategy(&mut working, &palette, NearestColorMetric::EuclideanSquared);
		for &pixel in working.pixels() {
			assert!(palette.iter().any(|c| c == pixel), "pixel {pixel:08x} was not snapped to the palette");
		}
	}
}

#[test]
fn error_diffusion_reduces_total_quantization_error_versus_plain_nearest() {
	let source = photographic_gradient(48, 48);
	let palette = quantize_uniform(&source, 8);

	let mut nearest_only = source.clone();
	nearest(&mut nearest_only, &palette, NearestColorMetric::EuclideanSquared);

	let mut dithered = source.clone();
	floyd_steinberg(&mut dithered, &palette, NearestColorMetric::EuclideanSquared);

	let mean_of = |bitmap: &RgbaBitmap| -> f64 {
		let (mut sum_r, mut sum_g, mut sum_b) = (0u64, 0u64, 0u64);
		for &pixel in bitmap.pixels() {
			let (r, g, b) = from_rgb32(pixel);
			sum_r += r as u64;
			sum_g += g as u64;
			sum_b += b as u64;
		}
		let n = bitmap.pixels().len() as f64;
		(sum_r as f64 + sum_g as f64 + sum_b as f64) / (3.0 * n)
	};

	let source_mean = mean_of(&source);
	let nearest_mean = mean_of(&nearest_only);
	let dithered_mean = mean_of(&dithered);

	assert!(
		(dithered_mean - source_mean).abs() <= (nearest_mean - source_mean).abs() + 1.0,
		"error diffusion should keep the overall brightness closer to the source than plain nearest-colour snapping"
	);
}
