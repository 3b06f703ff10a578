//! The palette object: a growable list of 24-bit colours shared between bitmaps.
//!
//! The original carried a fixed `[RGBA; 256]` array and manual `retain`/`release` reference
//! counting. Here a [`Palette`] is a plain, growable `Vec<u32>` and sharing between bitmaps is
//! expressed with [`PaletteHandle`] (`Rc<RefCell<Palette>>`): cloning the handle is the retain,
//! dropping the last clone is the release, and Rust's own drop glue does the bookkeeping that
//! the original did by hand.

use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::rc::Rc;

use thiserror::Error;

use crate::graphics::color::from_rgb32;

/// Shared, ref-counted handle to a [`Palette`]. Cloning a handle is the "retain" operation;
/// the palette is freed when the last handle is dropped.
pub type PaletteHandle = Rc<RefCell<Palette>>;

#[derive(Error, Debug)]
pub enum PaletteError {
	#[error("palette already has the maximum of {max} colours")]
	Full { max: usize },

	#[error("palette has no entry at index {0}")]
	IndexOutOfBounds(usize),

	#[error("malformed palette file at line {line}: {message}")]
	InvalidFormat { line: usize, message: String },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// The maximum number of colours a paletted image format in this crate can address.
pub const MAX_COLORS: usize = 256;

/// The nearest-colour distance metric used by [`Palette::nearest_index`] and every dithering
/// routine in [`crate::dither`]. The original selected one of these with a compile-time switch;
/// here it is an explicit value threaded through every call so the metric stays consistent
/// between the palette's own lookup and the reduction algorithms, as required.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum NearestColorMetric {
	/// Sum of squared per-channel differences.
	#[default]
	EuclideanSquared,
	/// A red-mean weighted distance that approximates human perceptual error.
	Perceptual,
}

impl NearestColorMetric {
	/// Computes the distance between two 24-bit RGB colours (alpha ignored) under this metric.
	/// Larger is farther; the value has no particular unit and is only meaningful for comparison.
	pub fn distance(&self, a: u32, b: u32) -> f64 {
		let (r1, g1, b1) = from_rgb32(a);
		let (r2, g2, b2) = from_rgb32(b);
		let dr = r1 as f64 - r2 as f64;
		let dg = g1 as f64 - g2 as f64;
		let db = b1 as f64 - b2 as f64;
		match self {
			NearestColorMetric::EuclideanSquared => dr * dr + dg * dg + db * db,
			NearestColorMetric::Perceptual => {
				let rmean = (r1 as f64 + r2 as f64) / 2.0;
				((512.0 + rmean) * dr * dr) / 256.0 + 4.0 * dg * dg + ((767.0 - rmean) * db * db) / 256.0
			}
		}
	}
}

/// A growable palette of 24-bit colours (alpha is discarded on insert). Capacity grows the way
/// `Vec` already grows: amortized doubling, which is exactly the behaviour the original
/// hand-rolled for its `retain`/`release`-managed array.
#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct Palette {
	colors: Vec<u32>,
}

impl Palette {
	/// Creates an empty palette.
	pub fn new() -> Self {
		Palette { colors: Vec::new() }
	}

	/// Creates an empty palette with room for `capacity` colours without reallocating.
	pub fn with_capacity(capacity: usize) -> Self {
		Palette { colors: Vec::with_capacity(capacity) }
	}

	/// Wraps this palette in a new, single-owner [`PaletteHandle`] (refcount starts at 1, per
	/// the original's lifecycle rules).
	pub fn into_handle(self) -> PaletteHandle {
		Rc::new(RefCell::new(self))
	}

	/// The number of colours currently in the palette.
	#[inline]
	pub fn len(&self) -> usize {
		self.colors.len()
	}

	#[inline]
	pub fn is_empty(&self) -> bool {
		self.colors.is_empty()
	}

	/// Returns the 24-bit colour (alpha forced to `0xFF`) at `index`, or `None` if out of range.
	#[inline]
	pub fn get(&self, index: usize) -> Option<u32> {
		self.colors.get(index).copied()
	}

	/// Overwrites the colour at `index`. Alpha bits of `color` are discarded.
	pub fn set(&mut self, index: usize, color: u32) -> Result<(), PaletteError> {
		let slot = self.colors.get_mut(index).ok_or(PaletteError::IndexOutOfBounds(index))?;
		*slot = color | 0xff000000;
		Ok(())
	}

	/// Appends a colour, returning its index. Alpha bits of `color` are discarded.
	pub fn add(&mut self, color: u32) -> Result<usize, PaletteError> {
		if self.colors.len() >= MAX_COLORS {
			return Err(PaletteError::Full { max: MAX_COLORS });
		}
		self.colors.push(color | 0xff000000);
		Ok(self.colors.len() - 1)
	}

	pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
		self.colors.iter().copied()
	}

	/// Finds the index of the colour in this palette nearest to `color` under `metric`.
	/// Linear scan, as in the original; the palette's practical maximum of 256 entries makes
	/// this cheap enough that a spatial index would be over-engineering.
	pub fn nearest_index(&self, color: u32, metric: NearestColorMetric) -> Option<usize> {
		self.colors
			.iter()
			.enumerate()
			.min_by(|(_, &a), (_, &b)| {
				metric
					.distance(color, a)
					.partial_cmp(&metric.distance(color, b))
					.unwrap_or(std::cmp::Ordering::Equal)
			})
			.map(|(index, _)| index)
	}

	/// Finds the colour in this palette nearest to `color` under `metric`.
	pub fn nearest_color(&self, color: u32, metric: NearestColorMetric) -> Option<u32> {
		self.nearest_index(color, metric).and_then(|index| self.get(index))
	}

	/// Reads a JASC-PAL (Paint Shop Pro) palette file.
	pub fn load_jasc_pal<R: BufRead>(reader: &mut R) -> Result<Palette, PaletteError> {
		let mut lines = reader.lines();
		let header = read_line(&mut lines, 1)?;
		if header.trim() != "JASC-PAL" {
			return Err(PaletteError::InvalidFormat { line: 1, message: "missing JASC-PAL signature".into() });
		}
		let _version = read_line(&mut lines, 2)?;
		let count: usize = read_line(&mut lines, 3)?
			.trim()
			.parse()
			.map_err(|_| PaletteError::InvalidFormat { line: 3, message: "expected colour count".into() })?;

		let mut palette = Palette::with_capacity(count);
		for i in 0..count {
			let line_no = i + 4;
			let line = read_line(&mut lines, line_no)?;
			let mut parts = line.split_whitespace();
			let (r, g, b) = parse_triple(&mut parts, line_no)?;
			palette.add(crate::graphics::color::to_rgb32(r, g, b))?;
		}
		Ok(palette)
	}

	/// Writes a JASC-PAL (Paint Shop Pro) palette file.
	pub fn save_jasc_pal<W: Write>(&self, writer: &mut W) -> Result<(), PaletteError> {
		writeln!(writer, "JASC-PAL")?;
		writeln!(writer, "0100")?;
		writeln!(writer, "{}", self.colors.len())?;
		for &color in &self.colors {
			let (r, g, b) = from_rgb32(color);
			writeln!(writer, "{r} {g} {b}")?;
		}
		Ok(())
	}

	/// Reads a GIMP palette file (`.gpl`).
	pub fn load_gimp_gpl<R: BufRead>(reader: &mut R) -> Result<Palette, PaletteError> {
		let mut palette = Palette::new();
		for (i, line) in reader.lines().enumerate() {
			let line_no = i + 1;
			let line = line?;
			let trimmed = line.trim();
			if line_no == 1 {
				if trimmed != "GPL Palette" {
					return Err(PaletteError::InvalidFormat { line: 1, message: "missing GPL Palette signature".into() });
				}
				continue;
			}
			if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("Name:") || trimmed.starts_with("Columns:") {
				continue;
			}
			let mut parts = trimmed.split_whitespace();
			let (r, g, b) = parse_triple(&mut parts, line_no)?;
			palette.add(crate::graphics::color::to_rgb32(r, g, b))?;
		}
		Ok(palette)
	}

	/// Reads a bm-text palette: one `#RRGGBB` or `RRGGBB` hex colour per line.
	pub fn load_bm_text<R: BufRead>(reader: &mut R) -> Result<Palette, PaletteError> {
		let mut palette = Palette::new();
		for (i, line) in reader.lines().enumerate() {
			let line_no = i + 1;
			let line = line?;
			let trimmed = line.trim();
			if trimmed.is_empty() {
				continue;
			}
			let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);
			if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
				continue;
			}
			let value = u32::from_str_radix(hex, 16)
				.map_err(|_| PaletteError::InvalidFormat { line: line_no, message: "invalid hex colour".into() })?;
			palette.add(value | 0xff000000)?;
		}
		Ok(palette)
	}

	/// Reads a Paint.NET palette file (`.txt`): one `AARRGGBB` hex colour per line, `;` comments.
	pub fn load_paintnet<R: BufRead>(reader: &mut R) -> Result<Palette, PaletteError> {
		let mut palette = Palette::new();
		for (i, line) in reader.lines().enumerate() {
			let line_no = i + 1;
			let line = line?;
			let trimmed = line.trim();
			if trimmed.is_empty() || trimmed.starts_with(';') {
				continue;
			}
			if trimmed.len() != 8 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
				return Err(PaletteError::InvalidFormat { line: line_no, message: "expected 8 hex digits (AARRGGBB)".into() });
			}
			let value = u32::from_str_radix(trimmed, 16)
				.map_err(|_| PaletteError::InvalidFormat { line: line_no, message: "invalid hex colour".into() })?;
			palette.add(value)?;
		}
		Ok(palette)
	}
}

fn read_line(lines: &mut std::io::Lines<impl BufRead>, line_no: usize) -> Result<String, PaletteError> {
	lines
		.next()
		.ok_or(PaletteError::InvalidFormat { line: line_no, message: "unexpected end of file".into() })?
		.map_err(PaletteError::from)
}

fn parse_triple<'a>(parts: &mut impl Iterator<Item = &'a str>, line_no: usize) -> Result<(u8, u8, u8), PaletteError> {
	let err = || PaletteError::InvalidFormat { line: line_no, message: "expected three colour components".into() };
	let r: u8 = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
	let g: u8 = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
	let b: u8 = parts.next().ok_or_else(err)?.parse().map_err(|_| err())?;
	Ok((r, g, b))
}
