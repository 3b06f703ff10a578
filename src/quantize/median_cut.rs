use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::color::{from_rgb32, to_rgb32};
use crate::graphics::palette::Palette;
use crate::quantize::rgb_values;

/// Recursive median-cut quantization. `k` must be a power of two in `2..=256`.
pub fn quantize_median_cut(bitmap: &RgbaBitmap, k: usize) -> Palette {
	assert!(k.is_power_of_two() && (2..=256).contains(&k), "median-cut budget must be a power of two between 2 and 256");

	let values = rgb_values(bitmap);
	let mut palette = Palette::with_capacity(k);
	for color in split(values, k) {
		palette.add(color).expect("k is bounded by the caller to MAX_COLORS");
	}
	palette
}

fn split(mut slice: Vec<u32>, budget: usize) -> Vec<u32> {
	if budget == 1 || slice.len() <= 1 {
		return vec![channelwise_mean(&slice)];
	}

	let channel = widest_channel(&slice);
	slice.sort_unstable_by_key(|&color| channel.extract(color));

	let midpoint = slice.len() / 2;
	let (low, high) = slice.split_at(midpoint);

	let mut result = split(low.to_vec(), budget / 2);
	result.extend(split(high.to_vec(), budget / 2));
	result
}

#[derive(Copy, Clone)]
enum Channel {
	Red,
	Green,
	Blue,
}

impl Channel {
	fn extract(&self, color: u32) -> u8 {
		let (r, g, b) = from_rgb32(color);
		match self {
			Channel::Red => r,
			Channel::Green => g,
			Channel::Blue => b,
		}
	}
}

fn widest_channel(slice: &[u32]) -> Channel {
	let (mut r_min, mut r_max) = (255u8, 0u8);
	let (mut g_min, mut g_max) = (255u8, 0u8);
	let (mut b_min, mut b_max) = (255u8, 0u8);
	for &color in slice {
		let (r, g, b) = from_rgb32(color);
		r_min = r_min.min(r);
		r_max = r_max.max(r);
		g_min = g_min.min(g);
		g_max = g_max.max(g);
		b_min = b_min.min(b);
		b_max = b_max.max(b);
	}
	let r_range = r_max - r_min;
	let g_range = g_max - g_min;
	let b_range = b_max - b_min;
	if r_range >= g_range && r_range >= b_range {
		Channel::Red
	} else if g_range >= b_range {
		Channel::Green
	} else {
		Channel::Blue
	}
}

fn channelwise_mean(slice: &[u32]) -> u32 {
	if slice.is_empty() {
		return 0xff000000;
	}
	let (mut r_sum, mut g_sum, mut b_sum) = (0u64, 0u64, 0u64);
	for &color in slice {
		let (r, g, b) = from_rgb32(color);
		r_sum += r as u64;
		g_sum += g as u64;
		b_sum += b as u64;
	}
	let n = slice.len() as u64;
	to_rgb32((r_sum / n) as u8, (g_sum / n) as u8, (b_sum / n) as u8)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_a_gradient_near_its_quartile_points() {
		let mut bitmap = RgbaBitmap::new(256, 1).unwrap();
		for (x, pixel) in bitmap.pixels_mut().iter_mut().enumerate() {
			*pixel = to_rgb32(x as u8, x as u8, x as u8);
		}

		let palette = quantize_median_cut(&bitmap, 2);
		assert_eq!(palette.len(), 2);

		let mut grays: Vec<u8> = palette.iter().map(|c| from_rgb32(c).0).collect();
		grays.sort_unstable();
		assert!(grays[0] < 96 && grays[0] > 32, "expected roughly the 25th percentile, got {}", grays[0]);
		assert!(grays[1] < 224 && grays[1] > 160, "expected roughly the 75th percentile, got {}", grays[1]);
		for &color in palette.iter().collect::<Vec<_>>().iter() {
			let (r, g, b) = from_rgb32(color);
			assert_eq!(r, g);
			assert_eq!(g, b);
		}
	}
}
