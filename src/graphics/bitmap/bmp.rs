//! BMP reader/writer: uncompressed and `BI_BITFIELDS` decode for 1/4/8/24/32 bpp; writer always
//! emits 24 bpp `BI_RGB`, bottom-up, 4-byte row padding.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::graphics::bitmap::indexed::IndexedBitmap;
use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::color::to_argb32;
use crate::graphics::palette::Palette;

const BMP_FILE_HEADER_SIZE: u32 = 14;
const BMP_DIB_HEADER_SIZE: u32 = 40;
const PIXELS_PER_METRE: i32 = 2835;

#[derive(Error, Debug)]
pub enum BmpError {
	#[error("not a BMP file (bad signature)")]
	BadSignature,

	#[error("unsupported bits-per-pixel: {0}")]
	UnsupportedBpp(u16),

	#[error("unsupported compression type: {0}")]
	UnsupportedCompression(u32),

	#[error("too many distinct colours ({0}) for a BMP palette")]
	TooManyColors(usize),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

struct BitfieldChannel {
	shift: u32,
	scale: f32,
}

impl BitfieldChannel {
	fn new(mask: u32) -> Self {
		if mask == 0 {
			return BitfieldChannel { shift: 0, scale: 0.0 };
		}
		let shift = mask.trailing_zeros();
		let max_value = mask >> shift;
		BitfieldChannel { shift, scale: 255.0 / max_value as f32 }
	}

}

/// The `Bitmap + optional Palette` result of a BMP decode.
pub struct BmpFile {
	pub bitmap: RgbaBitmap,
	pub palette: Option<Palette>,
}

/// Reads a BMP image. Accepts `bpp` of 1, 4, 8, 24 or 32, with `BI_RGB` or `BI_BITFIELDS`
/// compression.
pub fn load<R: Read + Seek>(reader: &mut R) -> Result<BmpFile, BmpError> {
	let mut signature = [0u8; 2];
	reader.read_exact(&mut signature)?;
	if &signature != b"BM" {
		return Err(BmpError::BadSignature);
	}

	let _file_size = reader.read_u32::<LittleEndian>()?;
	let _reserved1 = reader.read_u16::<LittleEndian>()?;
	let _reserved2 = reader.read_u16::<LittleEndian>()?;
	let pixel_data_offset = reader.read_u32::<LittleEndian>()?;

	let _dib_header_size = reader.read_u32::<LittleEndian>()?;
	let width = reader.read_i32::<LittleEndian>()?;
	let height = reader.read_i32::<LittleEndian>()?;
	let _planes = reader.read_u16::<LittleEndian>()?;
	let bpp = reader.read_u16::<LittleEndian>()?;
	let compression = reader.read_u32::<LittleEndian>()?;
	let _image_size = reader.read_u32::<LittleEndian>()?;
	let _h_res = reader.read_i32::<LittleEndian>()?;
	let _v_res = reader.read_i32::<LittleEndian>()?;
	let mut num_colors = reader.read_u32::<LittleEndian>()?;
	let _num_important_colors = reader.read_u32::<LittleEndian>()?;

	if !matches!(bpp, 1 | 4 | 8 | 24 | 32) {
		return Err(BmpError::UnsupportedBpp(bpp));
	}
	if compression != 0 && compression != 3 {
		return Err(BmpError::UnsupportedCompression(compression));
	}

	let width = width.unsigned_abs();
	let height = height.unsigned_abs();

	let (r_mask, g_mask, b_mask) = if bpp == 32 {
		if compression == 3 {
			(reader.read_u32::<LittleEndian>()?, reader.read_u32::<LittleEndian>()?, reader.read_u32::<LittleEndian>()?)
		} else {
			(0x00ff0000, 0x0000ff00, 0x000000ff)
		}
	} else {
		(0, 0, 0)
	};

	let palette = if bpp <= 8 {
		if num_colors == 0 {
			num_colors = 1 << bpp;
		}
		let mut palette = Palette::with_capacity(num_colors as usize);
		for _ in 0..num_colors {
			let b = reader.read_u8()?;
			let g = reader.read_u8()?;
			let r = reader.read_u8()?;
			let _reserved = reader.read_u8()?;
			palette.add(to_argb32(255, r, g, b)).map_err(|_| BmpError::TooManyColors(num_colors as usize))?;
		}
		Some(palette)
	} else {
		None
	};

	reader.seek(SeekFrom::Start(pixel_data_offset as u64))?;

	let row_size = ((width as usize * bpp as usize).div_ceil(8) + 3) & !3;
	let mut row_buffer = vec![0u8; row_size];

	let mut bitmap = RgbaBitmap::new(width, height).map_err(|_| BmpError::UnsupportedBpp(bpp))?;

	let r_channel = BitfieldChannel::new(r_mask);
	let g_channel = BitfieldChannel::new(g_mask);
	let b_channel = BitfieldChannel::new(b_mask);

	for row in 0..height {
		reader.read_exact(&mut row_buffer)?;
		let y = height - 1 - row;

		for x in 0..width {
			let color = match bpp {
				1 => {
					let byte = row_buffer[(x / 8) as usize];
					let bit = 7 - (x % 8);
					let index = (byte >> bit) & 0x01;
					palette_color(&palette, index as usize)
				}
				4 => {
					let byte = row_buffer[(x / 2) as usize];
					let index = if x % 2 == 0 { byte >> 4 } else { byte & 0x0f };
					palette_color(&palette, index as usize)
				}
				8 => {
					let index = row_buffer[x as usize];
					palette_color(&palette, index as usize)
				}
				24 => {
					let offset = x as usize * 3;
					let b = row_buffer[offset];
					let g = row_buffer[offset + 1];
					let r = row_buffer[offset + 2];
					to_argb32(255, r, g, b)
				}
				32 => {
					let offset = x as usize * 4;
					let pixel = u32::from_le_bytes([row_buffer[offset], row_buffer[offset + 1], row_buffer[offset + 2], row_buffer[offset + 3]]);
					let r = scale_channel(pixel, r_mask, &r_channel);
					let g = scale_channel(pixel, g_mask, &g_channel);
					let b = scale_channel(pixel, b_mask, &b_channel);
					to_argb32(255, r, g, b)
				}
				_ => unreachable!(),
			};
			bitmap.set_pixel(x as i32, y as i32, color);
		}
	}

	Ok(BmpFile { bitmap, palette })
}

fn scale_channel(pixel: u32, mask: u32, channel: &BitfieldChannel) -> u8 {
	if mask == 0 {
		return 0;
	}
	let raw = (pixel & mask) >> channel.shift;
	(raw as f32 * channel.scale) as u8
}

fn palette_color(palette: &Option<Palette>, index: usize) -> u32 {
	palette.as_ref().and_then(|p| p.get(index)).unwrap_or(0xff000000)
}

/// Writes `bitmap` as a 24 bpp `BI_RGB` BMP, bottom-up, with 4-byte row padding. Palette and
/// alpha are discarded.
pub fn save<W: Write>(bitmap: &RgbaBitmap, writer: &mut W) -> Result<(), BmpError> {
	let width = bitmap.width();
	let height = bitmap.height();
	let row_size = ((width as usize * 3) + 3) & !3;
	let padding = row_size - (width as usize * 3);
	let pixel_data_size = row_size * height as usize;

	writer.write_all(b"BM")?;
	writer.write_u32::<LittleEndian>(BMP_FILE_HEADER_SIZE + BMP_DIB_HEADER_SIZE + pixel_data_size as u32)?;
	writer.write_u16::<LittleEndian>(0)?;
	writer.write_u16::<LittleEndian>(0)?;
	writer.write_u32::<LittleEndian>(BMP_FILE_HEADER_SIZE + BMP_DIB_HEADER_SIZE)?;

	writer.write_u32::<LittleEndian>(BMP_DIB_HEADER_SIZE)?;
	writer.write_i32::<LittleEndian>(width as i32)?;
	writer.write_i32::<LittleEndian>(height as i32)?;
	writer.write_u16::<LittleEndian>(1)?;
	writer.write_u16::<LittleEndian>(24)?;
	writer.write_u32::<LittleEndian>(0)?;
	writer.write_u32::<LittleEndian>(pixel_data_size as u32)?;
	writer.write_i32::<LittleEndian>(PIXELS_PER_METRE)?;
	writer.write_i32::<LittleEndian>(PIXELS_PER_METRE)?;
	writer.write_u32::<LittleEndian>(0)?;
	writer.write_u32::<LittleEndian>(0)?;

	let padding_bytes = [0u8; 3];
	for row in 0..height {
		let y = height - 1 - row;
		for x in 0..width {
			let pixel = bitmap.get_pixel(x as i32, y as i32).unwrap_or(0);
			let (_, r, g, b) = crate::graphics::color::from_argb32(pixel);
			writer.write_all(&[b, g, r])?;
		}
		writer.write_all(&padding_bytes[..padding])?;
	}

	Ok(())
}

/// Converts a decoded BMP into an [`IndexedBitmap`] when it had 8 or fewer bits per pixel; used
/// by callers that want to keep the palette indices rather than the expanded true-colour copy.
pub fn into_indexed(file: BmpFile) -> Option<(IndexedBitmap, Palette)> {
	let palette = file.palette?;
	let mut indexed = IndexedBitmap::new(file.bitmap.width(), file.bitmap.height()).ok()?;
	for (dest, &color) in indexed.pixels_mut().iter_mut().zip(file.bitmap.pixels().iter()) {
		*dest = palette.nearest_index(color, crate::graphics::palette::NearestColorMetric::EuclideanSquared).unwrap_or(0) as u8;
	}
	Some((indexed, palette))
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;

	#[test]
	fn round_trips_a_solid_white_bitmap() {
		let mut bmp = RgbaBitmap::new(2, 2).unwrap();
		for pixel in bmp.pixels_mut().iter_mut() {
			*pixel = 0xffffffff;
		}

		let mut buffer = Vec::new();
		save(&bmp, &mut buffer).unwrap();

		let loaded = load(&mut Cursor::new(buffer)).unwrap();
		assert_eq!(loaded.bitmap.width(), 2);
		assert_eq!(loaded.bitmap.height(), 2);
		for &pixel in loaded.bitmap.pixels() {
			assert_eq!(pixel, 0xffffffff);
		}
	}

	#[test]
	fn rejects_bad_signature() {
		let data = [0u8; 54];
		assert!(matches!(load(&mut Cursor::new(data)), Err(BmpError::BadSignature)));
	}

	#[test]
	fn reads_8bpp_paletted() {
		let mut source = RgbaBitmap::new(4, 4).unwrap();
		for (i, pixel) in source.pixels_mut().iter_mut().enumerate() {
			*pixel = if i % 2 == 0 { 0xff000000 } else { 0xffffffff };
		}

		// build an 8bpp BI_RGB file manually, 2-colour palette, rows bottom-up
		let mut buffer = Vec::new();
		let width = 4u32;
		let height = 4u32;
		let row_size = (width as usize + 3) & !3;
		let palette_bytes = 2 * 4;
		let pixel_offset = BMP_FILE_HEADER_SIZE + BMP_DIB_HEADER_SIZE + palette_bytes as u32;

		buffer.extend_from_slice(b"BM");
		buffer.extend_from_slice(&(pixel_offset + (row_size * height as usize) as u32).to_le_bytes());
		buffer.extend_from_slice(&[0u8; 4]);
		buffer.extend_from_slice(&pixel_offset.to_le_bytes());
		buffer.extend_from_slice(&BMP_DIB_HEADER_SIZE.to_le_bytes());
		buffer.extend_from_slice(&(width as i32).to_le_bytes());
		buffer.extend_from_slice(&(height as i32).to_le_bytes());
		buffer.extend_from_slice(&1u16.to_le_bytes());
		buffer.extend_from_slice(&8u16.to_le_bytes());
		buffer.extend_from_slice(&0u32.to_le_bytes());
		buffer.extend_from_slice(&((row_size * height as usize) as u32).to_le_bytes());
		buffer.extend_from_slice(&[0u8; 8]);
		buffer.extend_from_slice(&2u32.to_le_bytes());
		buffer.extend_from_slice(&0u32.to_le_bytes());
		buffer.extend_from_slice(&[0, 0, 0, 0]); // black
		buffer.extend_from_slice(&[255, 255, 255, 0]); // white
		for row in 0..height {
			let y = height - 1 - row;
			for x in 0..width {
				let idx = if (y * width + x) % 2 == 0 { 0u8 } else { 1u8 };
				buffer.push(idx);
			}
			buffer.extend(std::iter::repeat(0u8).take(row_size - width as usize));
		}

		let loaded = load(&mut Cursor::new(buffer)).unwrap();
		assert_eq!(loaded.bitmap.pixels(), source.pixels());
		assert_eq!(loaded.palette.unwrap().len(), 2);
	}
}
