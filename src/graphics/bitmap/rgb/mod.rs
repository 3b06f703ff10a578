//! A [`Bitmap`] whose pixels are direct 32-bit ARGB colour values.

use std::fs::File;
use std::io::{BufReader, BufWriter, Seek};
use std::path::Path;

use byteorder::ReadBytesExt;

use crate::graphics::bitmap::dispatch::{save_format_for_extension, sniff_format, LoadFormat, SaveFormat};
use crate::graphics::bitmap::{bmp, gif, netpbm, pcx, tga, Bitmap, BitmapError};
use crate::graphics::color::to_argb32;
use crate::graphics::palette::Palette;

pub type RgbaBitmap = Bitmap<u32>;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RgbaPixelFormat {
	Argb,
	Rgba,
}

impl RgbaBitmap {
	/// Reads raw pixel bytes in the given channel order into a new bitmap of `width` x `height`.
	pub fn from_bytes<T: ReadBytesExt>(width: u32, height: u32, format: RgbaPixelFormat, reader: &mut T) -> Result<Self, BitmapError> {
		let mut bitmap = Self::new(width, height)?;
		for pixel in bitmap.pixels_mut().iter_mut() {
			*pixel = match format {
				RgbaPixelFormat::Rgba => {
					let r = reader.read_u8()?;
					let g = reader.read_u8()?;
					let b = reader.read_u8()?;
					let a = reader.read_u8()?;
					to_argb32(a, r, g, b)
				}
				RgbaPixelFormat::Argb => {
					let a = reader.read_u8()?;
					let r = reader.read_u8()?;
					let g = reader.read_u8()?;
					let b = reader.read_u8()?;
					to_argb32(a, r, g, b)
				}
			};
		}
		Ok(bitmap)
	}

	/// Loads a true-colour bitmap from `path`, sniffing its format from the file's magic bytes.
	/// Returns the palette alongside the pixels when the source format carries one (PCX, GIF), so
	/// callers that want to re-save losslessly in a paletted format still can.
	pub fn load_file(path: &Path) -> Result<(Self, Option<Palette>), BitmapError> {
		let file = File::open(path)?;
		let mut reader = BufReader::new(file);

		match sniff_format(&mut reader)? {
			LoadFormat::Bmp => {
				let file = bmp::load(&mut reader)?;
				Ok((file.bitmap, file.palette))
			}
			LoadFormat::Gif => {
				let (indexed, palette, _metadata) = gif::load(&mut reader)?;
				let bitmap = indexed.to_rgba(&palette);
				Ok((bitmap, Some(palette)))
			}
			LoadFormat::Pcx => match pcx::load_rgb(&mut reader) {
				Ok(bitmap) => Ok((bitmap, None)),
				Err(_) => {
					reader.rewind()?;
					let (indexed, palette) = pcx::load(&mut reader)?;
					Ok((indexed.to_rgba(&palette), Some(palette)))
				}
			},
			LoadFormat::Netpbm => Ok((netpbm::load(&mut reader)?, None)),
			LoadFormat::Tga => Ok((tga::load(&mut reader)?, None)),
		}
	}

	/// Saves this bitmap to `path`, choosing a codec from the file extension. GIF and PCX targets
	/// reduce to a palette first via [`gif::prepare_for_save`], since both are paletted formats.
	pub fn save_file(&self, path: &Path) -> Result<(), BitmapError> {
		let file = File::create(path)?;
		let mut writer = BufWriter::new(file);

		match save_format_for_extension(path)? {
			SaveFormat::Bmp => Ok(bmp::save(self, &mut writer)?),
			SaveFormat::Tga => Ok(tga::save(self, &mut writer, tga::TgaSaveOptions::default())?),
			SaveFormat::Netpbm(kind) => Ok(netpbm::save(self, kind, netpbm::NetpbmSaveOptions::default(), &mut writer)?),
			SaveFormat::Gif => {
				let (indexed, palette) = gif::prepare_for_save(self)?;
				Ok(gif::save(&indexed, &palette, &mut writer, gif::GifSaveOptions::default())?)
			}
			SaveFormat::Pcx => {
				let (indexed, palette) = gif::prepare_for_save(self)?;
				Ok(pcx::save(&indexed, &palette, &mut writer)?)
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn from_bytes_reads_argb_order() {
		let bytes: [u8; 4] = [255, 10, 20, 30];
		let bitmap = RgbaBitmap::from_bytes(1, 1, RgbaPixelFormat::Argb, &mut &bytes[..]).unwrap();
		assert_eq!(bitmap.get_pixel(0, 0), Some(to_argb32(255, 10, 20, 30)));
	}

	#[test]
	fn from_bytes_reads_rgba_order() {
		let bytes: [u8; 4] = [10, 20, 30, 255];
		let bitmap = RgbaBitmap::from_bytes(1, 1, RgbaPixelFormat::Rgba, &mut &bytes[..]).unwrap();
		assert_eq!(bitmap.get_pixel(0, 0), Some(to_argb32(255, 10, 20, 30)));
	}
}
