//! TGA reader/writer. Reads 8/15/16/24/32 bpp, paletted or true-colour, raw or RLE; writer always
//! emits 24 bpp, optionally RLE-encoded.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::color::to_argb32;

#[derive(Error, Debug)]
pub enum TgaError {
	#[error("unrecognized TGA header (image type {image_type}, map type {map_type}, bpp {bpp})")]
	NotATga { image_type: u8, map_type: u8, bpp: u8 },

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Options controlling TGA output. Replaces the original's compile-time `TGA_SAVE_RLE` flag.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TgaSaveOptions {
	pub rle: bool,
}

impl Default for TgaSaveOptions {
	fn default() -> Self {
		TgaSaveOptions { rle: true }
	}
}

struct TgaHeader {
	id_length: u8,
	map_type: u8,
	image_type: u8,
	map_first_index: u16,
	map_length: u16,
	map_entry_size: u8,
	width: u16,
	height: u16,
	bpp: u8,
	descriptor: u8,
}

fn read_header<R: Read>(reader: &mut R) -> Result<TgaHeader, TgaError> {
	let id_length = reader.read_u8()?;
	let map_type = reader.read_u8()?;
	let image_type = reader.read_u8()?;
	let map_first_index = reader.read_u16::<LittleEndian>()?;
	let map_length = reader.read_u16::<LittleEndian>()?;
	let map_entry_size = reader.read_u8()?;
	let _xorig = reader.read_u16::<LittleEndian>()?;
	let _yorig = reader.read_u16::<LittleEndian>()?;
	let width = reader.read_u16::<LittleEndian>()?;
	let height = reader.read_u16::<LittleEndian>()?;
	let bpp = reader.read_u8()?;
	let descriptor = reader.read_u8()?;
	Ok(TgaHeader { id_length, map_type, image_type, map_first_index, map_length, map_entry_size, width, height, bpp, descriptor })
}

fn header_looks_valid(header: &TgaHeader) -> bool {
	let map_type_ok = matches!(header.map_type, 0 | 1);
	let image_type_ok = matches!(header.image_type, 0 | 1 | 2 | 3 | 9 | 10 | 11);
	let bpp_ok = if header.map_type == 1 {
		matches!(header.map_entry_size, 8 | 15 | 16 | 24 | 32)
	} else {
		matches!(header.bpp, 8 | 15 | 16 | 24 | 32)
	};
	map_type_ok && image_type_ok && bpp_ok
}

/// Reads the 18-byte TGA header from the current position and reports whether it passes the
/// format's heuristic acceptance test, without consuming any pixel data. Exposed standalone so
/// callers who dispatch by extension (rather than by magic-byte sniffing) can opt into the
/// heuristic explicitly instead of inheriting [`crate::graphics::bitmap::sniff_format`]'s fallthrough.
pub fn looks_like_tga<R: Read + Seek>(reader: &mut R) -> std::io::Result<bool> {
	let start = reader.stream_position()?;
	let result = match read_header(reader) {
		Ok(header) => header_looks_valid(&header),
		Err(_) => false,
	};
	reader.seek(SeekFrom::Start(start))?;
	Ok(result)
}

fn decode_channel_from_u16(value: u16, shift: u32) -> u8 {
	(((value >> shift) & 0x1f) << 3) as u8
}

fn decode_entry(bytes: &[u8], entry_size: u8) -> u32 {
	match entry_size {
		15 | 16 => {
			let value = u16::from_le_bytes([bytes[0], bytes[1]]);
			to_argb32(255, decode_channel_from_u16(value, 10), decode_channel_from_u16(value, 5), decode_channel_from_u16(value, 0))
		}
		24 => to_argb32(255, bytes[2], bytes[1], bytes[0]),
		32 => to_argb32(bytes[3], bytes[2], bytes[1], bytes[0]),
		_ => 0xff000000,
	}
}

/// Reads a TGA image.
pub fn load<R: Read + Seek>(reader: &mut R) -> Result<RgbaBitmap, TgaError> {
	let header = read_header(reader)?;
	if !header_looks_valid(&header) {
		return Err(TgaError::NotATga { image_type: header.image_type, map_type: header.map_type, bpp: header.bpp });
	}

	reader.seek(SeekFrom::Current(header.id_length as i64))?;

	let color_map = if header.map_type == 1 {
		let entry_bytes = (header.map_entry_size as usize).div_ceil(8);
		let mut map = Vec::with_capacity(header.map_length as usize);
		for _ in 0..header.map_length {
			let mut entry = vec![0u8; entry_bytes];
			reader.read_exact(&mut entry)?;
			map.push(decode_entry(&entry, header.map_entry_size));
		}
		Some(map)
	} else {
		None
	};

	let width = header.width as u32;
	let height = header.height as u32;
	let rle = header.image_type & 0x08 != 0;
	let paletted = header.image_type & 0x07 == 1;
	let grayscale = header.image_type & 0x07 == 3;

	let entry_bytes = (header.bpp as usize).div_ceil(8);
	let mut pixels = Vec::with_capacity((width * height) as usize);

	let mut read_raw_pixel = |reader: &mut R| -> Result<u32, TgaError> {
		let mut bytes = vec![0u8; entry_bytes];
		reader.read_exact(&mut bytes)?;
		if paletted {
			let index = bytes[0] as usize - header.map_first_index as usize;
			Ok(color_map.as_ref().and_then(|m| m.get(index)).copied().unwrap_or(0xff000000))
		} else if grayscale {
			Ok(to_argb32(255, bytes[0], bytes[0], bytes[0]))
		} else {
			Ok(decode_entry(&bytes, header.bpp))
		}
	};

	if rle {
		while pixels.len() < (width * height) as usize {
			let control = reader.read_u8()?;
			let count = (control & 0x7f) as usize + 1;
			if control & 0x80 != 0 {
				let value = read_raw_pixel(reader)?;
				for _ in 0..count {
					pixels.push(value);
				}
			} else {
				for _ in 0..count {
					pixels.push(read_raw_pixel(reader)?);
				}
			}
		}
	} else {
		for _ in 0..(width * height) {
			pixels.push(read_raw_pixel(reader)?);
		}
	}

	let mut bitmap = RgbaBitmap::new(width, height).map_err(|_| TgaError::NotATga {
		image_type: header.image_type,
		map_type: header.map_type,
		bpp: header.bpp,
	})?;

	let top_down = header.descriptor & 0x20 != 0;
	for (i, &color) in pixels.iter().enumerate() {
		let row = i as u32 / width;
		let x = i as u32 % width;
		let y = if top_down { row } else { height - 1 - row };
		bitmap.set_pixel(x as i32, y as i32, color);
	}

	Ok(bitmap)
}

/// Writes `bitmap` as a 24 bpp TGA, bottom-up. RLE-encoded (image type 10) when `options.rle`,
/// otherwise raw (image type 2).
pub fn save<W: Write>(bitmap: &RgbaBitmap, writer: &mut W, options: TgaSaveOptions) -> Result<(), TgaError> {
	let width = bitmap.width();
	let height = bitmap.height();

	writer.write_u8(0)?;
	writer.write_u8(0)?;
	writer.write_u8(if options.rle { 10 } else { 2 })?;
	writer.write_u16::<LittleEndian>(0)?;
	writer.write_u16::<LittleEndian>(0)?;
	writer.write_u8(0)?;
	writer.write_u16::<LittleEndian>(0)?;
	writer.write_u16::<LittleEndian>(0)?;
	writer.write_u16::<LittleEndian>(width as u16)?;
	writer.write_u16::<LittleEndian>(height as u16)?;
	writer.write_u8(24)?;
	writer.write_u8(0)?;

	let mut pixels = Vec::with_capacity((width * height) as usize);
	for row in 0..height {
		let y = height - 1 - row;
		for x in 0..width {
			pixels.push(bitmap.get_pixel(x as i32, y as i32).unwrap_or(0));
		}
	}

	if !options.rle {
		for &pixel in &pixels {
			let (_, r, g, b) = crate::graphics::color::from_argb32(pixel);
			writer.write_all(&[b, g, r])?;
		}
		return Ok(());
	}

	let mut i = 0;
	while i < pixels.len() {
		let current = pixels[i];
		if i + 1 < pixels.len() && pixels[i + 1] == current {
			let mut run = 1usize;
			while i + run < pixels.len() && pixels[i + run] == current && run < 128 {
				run += 1;
			}
			writer.write_u8(0x80 | (run as u8 - 1))?;
			let (_, r, g, b) = crate::graphics::color::from_argb32(current);
			writer.write_all(&[b, g, r])?;
			i += run;
		} else {
			let start = i;
			let mut count = 1usize;
			i += 1;
			while i < pixels.len() && count < 128 {
				if i + 1 < pixels.len() && pixels[i] == pixels[i + 1] {
					break;
				}
				count += 1;
				i += 1;
			}
			writer.write_u8(count as u8 - 1)?;
			for &pixel in &pixels[start..start + count] {
				let (_, r, g, b) = crate::graphics::color::from_argb32(pixel);
				writer.write_all(&[b, g, r])?;
			}
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;

	#[test]
	fn bottom_up_write_puts_bottom_left_pixel_first() {
		let mut bitmap = RgbaBitmap::new(2, 2).unwrap();
		bitmap.set_pixel(0, 0, to_argb32(255, 10, 20, 30)); // top-left
		bitmap.set_pixel(1, 0, to_argb32(255, 40, 50, 60)); // top-right
		bitmap.set_pixel(0, 1, to_argb32(255, 70, 80, 90)); // bottom-left
		bitmap.set_pixel(1, 1, to_argb32(255, 11, 22, 33)); // bottom-right

		let mut buffer = Vec::new();
		save(&bitmap, &mut buffer, TgaSaveOptions { rle: false }).unwrap();

		let pixel_data = &buffer[18..];
		assert_eq!(&pixel_data[0..3], &[90, 80, 70]);
	}

	#[test]
	fn round_trips_without_rle() {
		let mut bitmap = RgbaBitmap::new(4, 3).unwrap();
		for (i, pixel) in bitmap.pixels_mut().iter_mut().enumerate() {
			*pixel = to_argb32(255, (i * 7) as u8, (i * 13) as u8, (i * 19) as u8);
		}

		let mut buffer = Vec::new();
		save(&bitmap, &mut buffer, TgaSaveOptions { rle: false }).unwrap();
		let loaded = load(&mut Cursor::new(buffer)).unwrap();
		assert_eq!(loaded.pixels(), bitmap.pixels());
	}

	#[test]
	fn round_trips_with_rle() {
		let mut bitmap = RgbaBitmap::new(6, 1).unwrap();
		let colors = [0xffff0000u32, 0xffff0000, 0xffff0000, 0xff00ff00, 0xff0000ff, 0xff0000ff];
		for (x, &color) in colors.iter().enumerate() {
			bitmap.set_pixel(x as i32, 0, color);
		}

		let mut buffer = Vec::new();
		save(&bitmap, &mut buffer, TgaSaveOptions::default()).unwrap();
		let loaded = load(&mut Cursor::new(buffer)).unwrap();
		assert_eq!(loaded.pixels(), bitmap.pixels());
	}
}
