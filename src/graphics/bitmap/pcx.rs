//! PCX reader/writer. Supports 8-bit single-plane (256-colour, trailing palette) and 8-bit
//! 3-plane (24-bit RGB) reading; writing is always single-plane, 256-colour.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::graphics::bitmap::indexed::IndexedBitmap;
use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::color::to_argb32;
use crate::graphics::palette::Palette;

const PCX_HEADER_SIZE: usize = 128;
const PCX_PALETTE_MARKER: u8 = 0x0c;

#[derive(Error, Debug)]
pub enum PcxError {
	#[error("not a PCX file (bad manufacturer byte)")]
	BadSignature,

	#[error("unsupported encoding: {0}")]
	UnsupportedEncoding(u8),

	#[error("unsupported plane/bpp configuration: {planes} planes at {bpp} bpp")]
	UnsupportedPlaneConfiguration { planes: u8, bpp: u8 },

	#[error("missing 256-colour palette marker at end of file")]
	MissingPaletteMarker,

	#[error("too many distinct colours ({0}) for a PCX palette")]
	TooManyColors(usize),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

struct PcxHeader {
	bpp: u8,
	planes: u8,
	width: u32,
	height: u32,
	bytes_per_line: u16,
}

fn read_header<R: Read>(reader: &mut R) -> Result<PcxHeader, PcxError> {
	let manufacturer = reader.read_u8()?;
	if manufacturer != 0x0a {
		return Err(PcxError::BadSignature);
	}
	let _version = reader.read_u8()?;
	let encoding = reader.read_u8()?;
	if encoding != 1 {
		return Err(PcxError::UnsupportedEncoding(encoding));
	}
	let bpp = reader.read_u8()?;
	let xmin = reader.read_u16::<LittleEndian>()?;
	let ymin = reader.read_u16::<LittleEndian>()?;
	let xmax = reader.read_u16::<LittleEndian>()?;
	let ymax = reader.read_u16::<LittleEndian>()?;
	let _dpi_x = reader.read_u16::<LittleEndian>()?;
	let _dpi_y = reader.read_u16::<LittleEndian>()?;
	let mut _embedded_palette = [0u8; 48];
	reader.read_exact(&mut _embedded_palette)?;
	let _reserved = reader.read_u8()?;
	let planes = reader.read_u8()?;
	let bytes_per_line = reader.read_u16::<LittleEndian>()?;
	let _palette_type = reader.read_u16::<LittleEndian>()?;
	let _screen_width = reader.read_u16::<LittleEndian>()?;
	let _screen_height = reader.read_u16::<LittleEndian>()?;
	let mut padding = [0u8; 54];
	reader.read_exact(&mut padding)?;

	if bpp != 8 || !matches!(planes, 1 | 3) {
		return Err(PcxError::UnsupportedPlaneConfiguration { planes, bpp });
	}

	Ok(PcxHeader { bpp, planes, width: (xmax - xmin) as u32 + 1, height: (ymax - ymin) as u32 + 1, bytes_per_line })
}

fn decode_scanline<R: Read>(reader: &mut R, bytes_per_line: usize) -> Result<Vec<u8>, PcxError> {
	let mut line = Vec::with_capacity(bytes_per_line);
	while line.len() < bytes_per_line {
		let byte = reader.read_u8()?;
		if byte & 0xc0 == 0xc0 {
			let run = (byte & 0x3f) as usize;
			let value = reader.read_u8()?;
			for _ in 0..run {
				line.push(value);
			}
		} else {
			line.push(byte);
		}
	}
	line.truncate(bytes_per_line);
	Ok(line)
}

/// Reads a PCX image as an [`IndexedBitmap`] with its embedded 256-colour palette. Fails if the
/// file is a 3-plane RGB PCX (use [`load_rgb`] for those).
pub fn load<R: Read + Seek>(reader: &mut R) -> Result<(IndexedBitmap, Palette), PcxError> {
	let header = read_header(reader)?;
	if header.planes != 1 {
		return Err(PcxError::UnsupportedPlaneConfiguration { planes: header.planes, bpp: header.bpp });
	}

	let mut bitmap = IndexedBitmap::new(header.width, header.height).map_err(|_| PcxError::UnsupportedPlaneConfiguration {
		planes: header.planes,
		bpp: header.bpp,
	})?;
	for y in 0..header.height {
		let line = decode_scanline(reader, header.bytes_per_line as usize)?;
		for x in 0..header.width {
			bitmap.set_pixel(x as i32, y as i32, line[x as usize]);
		}
	}

	let palette = read_trailing_palette(reader)?;
	Ok((bitmap, palette))
}

fn read_trailing_palette<R: Read + Seek>(reader: &mut R) -> Result<Palette, PcxError> {
	reader.seek(SeekFrom::End(-769))?;
	let marker = reader.read_u8()?;
	if marker != PCX_PALETTE_MARKER {
		return Err(PcxError::MissingPaletteMarker);
	}
	let mut palette = Palette::with_capacity(256);
	for _ in 0..256 {
		let r = reader.read_u8()?;
		let g = reader.read_u8()?;
		let b = reader.read_u8()?;
		palette.add(to_argb32(255, r, g, b)).map_err(|_| PcxError::TooManyColors(256))?;
	}
	Ok(palette)
}

/// Reads a 3-plane, 8-bit-per-plane PCX image directly as 24-bit RGB.
pub fn load_rgb<R: Read + Seek>(reader: &mut R) -> Result<RgbaBitmap, PcxError> {
	let header = read_header(reader)?;
	if header.planes != 3 {
		return Err(PcxError::UnsupportedPlaneConfiguration { planes: header.planes, bpp: header.bpp });
	}

	let mut bitmap = RgbaBitmap::new(header.width, header.height).map_err(|_| PcxError::UnsupportedPlaneConfiguration {
		planes: header.planes,
		bpp: header.bpp,
	})?;
	for y in 0..header.height {
		let r_plane = decode_scanline(reader, header.bytes_per_line as usize)?;
		let g_plane = decode_scanline(reader, header.bytes_per_line as usize)?;
		let b_plane = decode_scanline(reader, header.bytes_per_line as usize)?;
		for x in 0..header.width {
			let color = to_argb32(255, r_plane[x as usize], g_plane[x as usize], b_plane[x as usize]);
			bitmap.set_pixel(x as i32, y as i32, color);
		}
	}
	Ok(bitmap)
}

fn encode_scanline<W: Write>(writer: &mut W, line: &[u8]) -> Result<(), PcxError> {
	let mut i = 0;
	while i < line.len() {
		let value = line[i];
		let mut run = 1usize;
		while i + run < line.len() && line[i + run] == value && run < 63 {
			run += 1;
		}
		if run == 1 && value < 192 {
			writer.write_u8(value)?;
		} else {
			writer.write_u8(0xc0 | run as u8)?;
			writer.write_u8(value)?;
		}
		i += run;
	}
	Ok(())
}

/// Writes `bitmap` as a single-plane, 8 bpp, RLE-encoded PCX file using `palette`. Fails if the
/// palette has more than 256 entries.
pub fn save<W: Write>(bitmap: &IndexedBitmap, palette: &Palette, writer: &mut W) -> Result<(), PcxError> {
	if palette.len() > 256 {
		return Err(PcxError::TooManyColors(palette.len()));
	}

	let width = bitmap.width();
	let height = bitmap.height();
	let bytes_per_line = (width + (width % 2)) as u16;

	writer.write_u8(0x0a)?;
	writer.write_u8(5)?;
	writer.write_u8(1)?;
	writer.write_u8(8)?;
	writer.write_u16::<LittleEndian>(0)?;
	writer.write_u16::<LittleEndian>(0)?;
	writer.write_u16::<LittleEndian>(width as u16 - 1)?;
	writer.write_u16::<LittleEndian>(height as u16 - 1)?;
	writer.write_u16::<LittleEndian>(72)?;
	writer.write_u16::<LittleEndian>(72)?;
	writer.write_all(&[0u8; 48])?;
	writer.write_u8(0)?;
	writer.write_u8(1)?;
	writer.write_u16::<LittleEndian>(bytes_per_line)?;
	writer.write_u16::<LittleEndian>(1)?;
	writer.write_u16::<LittleEndian>(width as u16)?;
	writer.write_u16::<LittleEndian>(height as u16)?;
	writer.write_all(&[0u8; 54])?;

	let mut line = vec![0u8; bytes_per_line as usize];
	for y in 0..height {
		for x in 0..width {
			line[x as usize] = bitmap.get_pixel(x as i32, y as i32).unwrap_or(0);
		}
		for pad in &mut line[width as usize..] {
			*pad = 0;
		}
		encode_scanline(writer, &line)?;
	}

	writer.write_u8(PCX_PALETTE_MARKER)?;
	for i in 0..256 {
		let color = palette.get(i).unwrap_or(0xff000000);
		let (_, r, g, b) = crate::graphics::color::from_argb32(color);
		writer.write_all(&[r, g, b])?;
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;

	fn gradient_palette() -> Palette {
		let mut palette = Palette::new();
		palette.add(to_argb32(255, 0, 0, 0)).unwrap();
		palette.add(to_argb32(255, 255, 0, 0)).unwrap();
		palette.add(to_argb32(255, 0, 255, 0)).unwrap();
		palette
	}

	#[test]
	fn round_trips_a_short_rle_run() {
		let palette = gradient_palette();
		let mut bitmap = IndexedBitmap::new(10, 1).unwrap();
		let indices = [1u8, 1, 1, 1, 2, 2, 0, 0, 0, 0];
		for (x, &index) in indices.iter().enumerate() {
			bitmap.set_pixel(x as i32, 0, index);
		}

		let mut buffer = Vec::new();
		save(&bitmap, &palette, &mut buffer).unwrap();

		// four identical R-index pixels in a row encode as a 0xC4 run marker
		assert!(buffer.windows(2).any(|w| w[0] == 0xc4 && w[1] == 1));

		let (loaded, loaded_palette) = load(&mut Cursor::new(buffer)).unwrap();
		assert_eq!(loaded.pixels(), bitmap.pixels());
		assert_eq!(loaded_palette.len(), 256);
		for i in 0..3 {
			assert_eq!(loaded_palette.get(i), palette.get(i));
		}
	}

	#[test]
	fn round_trips_3plane_rgb() {
		let mut bitmap = RgbaBitmap::new(4, 2).unwrap();
		for (i, pixel) in bitmap.pixels_mut().iter_mut().enumerate() {
			*pixel = to_argb32(255, (i * 10) as u8, (i * 20) as u8, (i * 30) as u8);
		}

		let mut buffer = Vec::new();
		write_3plane(&bitmap, &mut buffer).unwrap();

		let loaded = load_rgb(&mut Cursor::new(buffer)).unwrap();
		assert_eq!(loaded.pixels(), bitmap.pixels());
	}

	fn write_3plane<W: Write>(bitmap: &RgbaBitmap, writer: &mut W) -> Result<(), PcxError> {
		let width = bitmap.width();
		let height = bitmap.height();
		let bytes_per_line = (width + (width % 2)) as u16;

		writer.write_u8(0x0a)?;
		writer.write_u8(5)?;
		writer.write_u8(1)?;
		writer.write_u8(8)?;
		writer.write_u16::<LittleEndian>(0)?;
		writer.write_u16::<LittleEndian>(0)?;
		writer.write_u16::<LittleEndian>(width as u16 - 1)?;
		writer.write_u16::<LittleEndian>(height as u16 - 1)?;
		writer.write_u16::<LittleEndian>(72)?;
		writer.write_u16::<LittleEndian>(72)?;
		writer.write_all(&[0u8; 48])?;
		writer.write_u8(0)?;
		writer.write_u8(3)?;
		writer.write_u16::<LittleEndian>(bytes_per_line)?;
		writer.write_u16::<LittleEndian>(1)?;
		writer.write_u16::<LittleEndian>(width as u16)?;
		writer.write_u16::<LittleEndian>(height as u16)?;
		writer.write_all(&[0u8; 54])?;

		for y in 0..height {
			for plane in 0..3 {
				let mut line = vec![0u8; bytes_per_line as usize];
				for x in 0..width {
					let (_, r, g, b) = crate::graphics::color::from_argb32(bitmap.get_pixel(x as i32, y as i32).unwrap());
					line[x as usize] = [r, g, b][plane];
				}
				encode_scanline(writer, &line)?;
			}
		}
		Ok(())
	}
}
