use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::color::{from_rgb32, to_rgb32};
use crate::graphics::palette::{NearestColorMetric, Palette};
use crate::quantize::rgb_values;

const MAX_ITERATIONS: usize = 128;

/// K-means quantization: seeds `k` centroids from evenly-spaced entries of the sorted pixel
/// array, then iterates assignment/update until convergence or 128 iterations. Empty clusters are
/// dropped and the remaining centroids are returned sorted by cluster size, descending.
pub fn quantize_kmeans(bitmap: &RgbaBitmap, k: usize) -> Palette {
	let mut values = rgb_values(bitmap);
	values.sort_unstable();

	if values.is_empty() {
		return Palette::new();
	}

	let mut centroids: Vec<u32> = (0..k)
		.map(|i| {
			let index = if k == 1 { 0 } else { (i * (values.len() - 1)) / (k - 1) };
			values[index.min(values.len() - 1)]
		})
		.collect();

	let mut assignments = vec![0usize; values.len()];

	for _ in 0..MAX_ITERATIONS {
		let mut changed = 0usize;
		for (pixel_index, &color) in values.iter().enumerate() {
			let nearest = nearest_centroid(color, &centroids);
			if assignments[pixel_index] != nearest {
				assignments[pixel_index] = nearest;
				changed += 1;
			}
		}

		if changed == 0 {
			break;
		}

		let mut sums = vec![(0u64, 0u64, 0u64, 0u64); centroids.len()];
		for (&color, &cluster) in values.iter().zip(assignments.iter()) {
			let (r, g, b) = from_rgb32(color);
			sums[cluster].0 += r as u64;
			sums[cluster].1 += g as u64;
			sums[cluster].2 += b as u64;
			sums[cluster].3 += 1;
		}
		for (centroid, &(r_sum, g_sum, b_sum, count)) in centroids.iter_mut().zip(sums.iter()) {
			if count > 0 {
				*centroid = to_rgb32((r_sum / count) as u8, (g_sum / count) as u8, (b_sum / count) as u8);
			}
		}
	}

	let mut counts = vec![0usize; centroids.len()];
	for &cluster in &assignments {
		counts[cluster] += 1;
	}

	let mut order: Vec<usize> = (0..centroids.len()).filter(|&i| counts[i] > 0).collect();
	order.sort_unstable_by_key(|&i| std::cmp::Reverse(counts[i]));

	let mut palette = Palette::with_capacity(order.len());
	for i in order {
		palette.add(centroids[i]).expect("cluster count is bounded by k, which is bounded by the caller");
	}
	palette
}

fn nearest_centroid(color: u32, centroids: &[u32]) -> usize {
	centroids
		.iter()
		.enumerate()
		.min_by(|(_, &a), (_, &b)| {
			NearestColorMetric::EuclideanSquared
				.distance(color, a)
				.partial_cmp(&NearestColorMetric::EuclideanSquared.distance(color, b))
				.unwrap_or(std::cmp::Ordering::Equal)
		})
		.map(|(index, _)| index)
		.unwrap_or(0)
}
