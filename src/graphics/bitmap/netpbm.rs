//! Netpbm (PBM/PGM/PPM) reader/writer, formats P1 through P6.

use std::io::{Read, Write};

use byteorder::WriteBytesExt;
use thiserror::Error;

use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::color::to_argb32;

#[derive(Error, Debug)]
pub enum NetpbmError {
	#[error("not a Netpbm file (bad magic number)")]
	BadSignature,

	#[error("unsupported max-value: {0} (only up to 255 is supported)")]
	UnsupportedMaxValue(u32),

	#[error("unexpected end of input while reading token")]
	UnexpectedEof,

	#[error("malformed token: {0}")]
	MalformedToken(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// The three file extensions a Netpbm writer can target, each with an ASCII and binary variant.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum NetpbmKind {
	Pbm,
	Pgm,
	Ppm,
}

/// Options controlling Netpbm output. Replaces the original's compile-time ASCII/binary flag.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct NetpbmSaveOptions {
	pub binary: bool,
}

impl Default for NetpbmSaveOptions {
	fn default() -> Self {
		NetpbmSaveOptions { binary: true }
	}
}

struct TokenReader<'a, R: Read> {
	reader: &'a mut R,
	peeked: Option<u8>,
}

impl<'a, R: Read> TokenReader<'a, R> {
	fn new(reader: &'a mut R) -> Self {
		TokenReader { reader, peeked: None }
	}

	fn next_byte(&mut self) -> Result<Option<u8>, NetpbmError> {
		if let Some(byte) = self.peeked.take() {
			return Ok(Some(byte));
		}
		let mut buffer = [0u8; 1];
		match self.reader.read_exact(&mut buffer) {
			Ok(()) => Ok(Some(buffer[0])),
			Err(error) if error.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
			Err(error) => Err(error.into()),
		}
	}

	fn skip_whitespace_and_comments(&mut self) -> Result<(), NetpbmError> {
		loop {
			match self.next_byte()? {
				Some(b) if b.is_ascii_whitespace() => continue,
				Some(b'#') => {
					while let Some(b) = self.next_byte()? {
						if b == b'\n' {
							break;
						}
					}
				}
				Some(b) => {
					self.peeked = Some(b);
					return Ok(());
				}
				None => return Ok(()),
			}
		}
	}

	fn read_token(&mut self) -> Result<String, NetpbmError> {
		self.skip_whitespace_and_comments()?;
		let mut token = String::new();
		loop {
			match self.next_byte()? {
				Some(b) if b.is_ascii_whitespace() => {
					if token.is_empty() {
						continue;
					}
					break;
				}
				Some(b) => token.push(b as char),
				None => break,
			}
		}
		if token.is_empty() {
			return Err(NetpbmError::UnexpectedEof);
		}
		Ok(token)
	}

	fn read_u32_token(&mut self) -> Result<u32, NetpbmError> {
		let token = self.read_token()?;
		token.parse().map_err(|_| NetpbmError::MalformedToken(token))
	}

	/// Consumes exactly one whitespace byte, as required right after the header of a binary format.
	fn consume_single_whitespace(&mut self) -> Result<(), NetpbmError> {
		self.next_byte()?;
		Ok(())
	}

	fn read_exact_bytes(&mut self, count: usize) -> Result<Vec<u8>, NetpbmError> {
		let mut buffer = vec![0u8; count];
		if let Some(first) = self.peeked.take() {
			buffer[0] = first;
			self.reader.read_exact(&mut buffer[1..])?;
		} else {
			self.reader.read_exact(&mut buffer)?;
		}
		Ok(buffer)
	}
}

/// Reads any Netpbm (P1-P6) image, scaling sample values into full 0..255 range.
pub fn load<R: Read>(reader: &mut R) -> Result<RgbaBitmap, NetpbmError> {
	let mut tokens = TokenReader::new(reader);
	let magic = tokens.read_token()?;
	if magic.len() != 2 || !magic.starts_with('P') {
		return Err(NetpbmError::BadSignature);
	}
	let kind = magic.as_bytes()[1];
	if !(b'1'..=b'6').contains(&kind) {
		return Err(NetpbmError::BadSignature);
	}

	let width = tokens.read_u32_token()?;
	let height = tokens.read_u32_token()?;
	let max_value = if matches!(kind, b'1' | b'4') { 1 } else { tokens.read_u32_token()? };
	if max_value > 255 {
		return Err(NetpbmError::UnsupportedMaxValue(max_value));
	}

	let mut bitmap = RgbaBitmap::new(width, height).map_err(|_| NetpbmError::MalformedToken("invalid dimensions".into()))?;

	match kind {
		b'1' => {
			for y in 0..height {
				for x in 0..width {
					let token = tokens.read_token()?;
					let v = if token == "1" { 0 } else { 255 };
					bitmap.set_pixel(x as i32, y as i32, to_argb32(255, v, v, v));
				}
			}
		}
		b'2' => {
			for y in 0..height {
				for x in 0..width {
					let value = tokens.read_u32_token()?;
					let v = scale_sample(value, max_value);
					bitmap.set_pixel(x as i32, y as i32, to_argb32(255, v, v, v));
				}
			}
		}
		b'3' => {
			for y in 0..height {
				for x in 0..width {
					let r = scale_sample(tokens.read_u32_token()?, max_value);
					let g = scale_sample(tokens.read_u32_token()?, max_value);
					let b = scale_sample(tokens.read_u32_token()?, max_value);
					bitmap.set_pixel(x as i32, y as i32, to_argb32(255, r, g, b));
				}
			}
		}
		b'4' => {
			tokens.consume_single_whitespace()?;
			let row_bytes = width.div_ceil(8) as usize;
			for y in 0..height {
				let row = tokens.read_exact_bytes(row_bytes)?;
				for x in 0..width {
					let byte = row[(x / 8) as usize];
					let bit = 7 - (x % 8);
					let v = if (byte >> bit) & 1 == 1 { 0 } else { 255 };
					bitmap.set_pixel(x as i32, y as i32, to_argb32(255, v, v, v));
				}
			}
		}
		b'5' => {
			tokens.consume_single_whitespace()?;
			let row = tokens.read_exact_bytes((width * height) as usize)?;
			for (i, &sample) in row.iter().enumerate() {
				let v = scale_sample(sample as u32, max_value);
				bitmap.set_pixel((i as u32 % width) as i32, (i as u32 / width) as i32, to_argb32(255, v, v, v));
			}
		}
		b'6' => {
			tokens.consume_single_whitespace()?;
			let data = tokens.read_exact_bytes((width * height * 3) as usize)?;
			for i in 0..(width * height) as usize {
				let r = scale_sample(data[i * 3] as u32, max_value);
				let g = scale_sample(data[i * 3 + 1] as u32, max_value);
				let b = scale_sample(data[i * 3 + 2] as u32, max_value);
				bitmap.set_pixel((i as u32 % width) as i32, (i as u32 / width) as i32, to_argb32(255, r, g, b));
			}
		}
		_ => unreachable!(),
	}

	Ok(bitmap)
}

fn scale_sample(value: u32, max_value: u32) -> u8 {
	if max_value == 0 {
		return 0;
	}
	((value * 255) / max_value) as u8
}

/// Writes `bitmap` in the given Netpbm `kind`, ASCII or binary per `options`.
pub fn save<W: Write>(bitmap: &RgbaBitmap, kind: NetpbmKind, options: NetpbmSaveOptions, writer: &mut W) -> Result<(), NetpbmError> {
	let width = bitmap.width();
	let height = bitmap.height();

	match (kind, options.binary) {
		(NetpbmKind::Pbm, false) => {
			writeln!(writer, "P1")?;
			writeln!(writer, "{width} {height}")?;
			for y in 0..height {
				let bits: Vec<&str> = (0..width)
					.map(|x| if is_black(bitmap.get_pixel(x as i32, y as i32).unwrap_or(0)) { "1" } else { "0" })
					.collect();
				writeln!(writer, "{}", bits.join(" "))?;
			}
		}
		(NetpbmKind::Pbm, true) => {
			writeln!(writer, "P4")?;
			writeln!(writer, "{width} {height}")?;
			for y in 0..height {
				let mut byte = 0u8;
				let mut bits_in_byte = 0;
				for x in 0..width {
					byte <<= 1;
					if is_black(bitmap.get_pixel(x as i32, y as i32).unwrap_or(0)) {
						byte |= 1;
					}
					bits_in_byte += 1;
					if bits_in_byte == 8 {
						writer.write_u8(byte)?;
						byte = 0;
						bits_in_byte = 0;
					}
				}
				if bits_in_byte > 0 {
					byte <<= 8 - bits_in_byte;
					writer.write_u8(byte)?;
				}
			}
		}
		(NetpbmKind::Pgm, false) => {
			writeln!(writer, "P2")?;
			writeln!(writer, "{width} {height}")?;
			writeln!(writer, "255")?;
			for y in 0..height {
				let row: Vec<String> = (0..width).map(|x| gray_of(bitmap, x, y).to_string()).collect();
				writeln!(writer, "{}", row.join(" "))?;
			}
		}
		(NetpbmKind::Pgm, true) => {
			writeln!(writer, "P5")?;
			writeln!(writer, "{width} {height}")?;
			writeln!(writer, "255")?;
			for y in 0..height {
				for x in 0..width {
					writer.write_u8(gray_of(bitmap, x, y))?;
				}
			}
		}
		(NetpbmKind::Ppm, false) => {
			writeln!(writer, "P3")?;
			writeln!(writer, "{width} {height}")?;
			writeln!(writer, "255")?;
			for y in 0..height {
				let row: Vec<String> = (0..width)
					.map(|x| {
						let (_, r, g, b) = crate::graphics::color::from_argb32(bitmap.get_pixel(x as i32, y as i32).unwrap_or(0));
						format!("{r} {g} {b}")
					})
					.collect();
				writeln!(writer, "{}", row.join("  "))?;
			}
		}
		(NetpbmKind::Ppm, true) => {
			writeln!(writer, "P6")?;
			writeln!(writer, "{width} {height}")?;
			writeln!(writer, "255")?;
			for y in 0..height {
				for x in 0..width {
					let (_, r, g, b) = crate::graphics::color::from_argb32(bitmap.get_pixel(x as i32, y as i32).unwrap_or(0));
					writer.write_all(&[r, g, b])?;
				}
			}
		}
	}

	Ok(())
}

fn is_black(color: u32) -> bool {
	let (_, r, g, b) = crate::graphics::color::from_argb32(color);
	(r as u32 + g as u32 + b as u32) < 384
}

fn gray_of(bitmap: &RgbaBitmap, x: u32, y: u32) -> u8 {
	let (_, _, g, _) = crate::graphics::color::from_argb32(crate::graphics::color::graypixel(bitmap.get_pixel(x as i32, y as i32).unwrap_or(0)));
	g
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;

	#[test]
	fn round_trips_p6_binary_ppm() {
		let mut bitmap = RgbaBitmap::new(3, 2).unwrap();
		for (i, pixel) in bitmap.pixels_mut().iter_mut().enumerate() {
			*pixel = to_argb32(255, (i * 40) as u8, (i * 10) as u8, (i * 5) as u8);
		}

		let mut buffer = Vec::new();
		save(&bitmap, NetpbmKind::Ppm, NetpbmSaveOptions { binary: true }, &mut buffer).unwrap();
		let loaded = load(&mut Cursor::new(buffer)).unwrap();
		assert_eq!(loaded.pixels(), bitmap.pixels());
	}

	#[test]
	fn round_trips_p3_ascii_ppm() {
		let mut bitmap = RgbaBitmap::new(2, 2).unwrap();
		bitmap.pixels_mut().copy_from_slice(&[to_argb32(255, 1, 2, 3), to_argb32(255, 250, 251, 252), to_argb32(255, 0, 0, 0), to_argb32(255, 255, 255, 255)]);

		let mut buffer = Vec::new();
		save(&bitmap, NetpbmKind::Ppm, NetpbmSaveOptions { binary: false }, &mut buffer).unwrap();
		let loaded = load(&mut Cursor::new(buffer)).unwrap();
		assert_eq!(loaded.pixels(), bitmap.pixels());
	}

	#[test]
	fn reads_p1_ascii_bitmap_with_comments() {
		let text = "P1\n# a comment\n2 2\n0 1\n1 0\n";
		let loaded = load(&mut Cursor::new(text.as_bytes())).unwrap();
		assert_eq!(loaded.get_pixel(0, 0), Some(to_argb32(255, 255, 255, 255)));
		assert_eq!(loaded.get_pixel(1, 0), Some(to_argb32(255, 0, 0, 0)));
	}

	#[test]
	fn rejects_bad_magic() {
		assert!(matches!(load(&mut Cursor::new(b"XX 2 2 255")), Err(NetpbmError::BadSignature)));
	}
}
