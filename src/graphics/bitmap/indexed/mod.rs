//! A [`Bitmap`] whose pixels are 8-bit palette indices rather than direct colour values.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::graphics::bitmap::dispatch::{save_format_for_extension, sniff_format, LoadFormat, SaveFormat};
use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::bitmap::{bmp, gif, pcx, Bitmap, BitmapError};
use crate::graphics::palette::Palette;

pub type IndexedBitmap = Bitmap<u8>;

impl IndexedBitmap {
	/// Loads an indexed bitmap from `path`, sniffing its format from the file's magic bytes.
	/// Only PCX and GIF carry a palette natively; a BMP is accepted only when it decodes to 8 bits
	/// per pixel or fewer.
	pub fn load_file(path: &Path) -> Result<(Self, Palette), BitmapError> {
		let file = File::open(path)?;
		let mut reader = BufReader::new(file);

		match sniff_format(&mut reader)? {
			LoadFormat::Pcx => Ok(pcx::load(&mut reader)?),
			LoadFormat::Gif => {
				let (bitmap, palette, _metadata) = gif::load(&mut reader)?;
				Ok((bitmap, palette))
			}
			LoadFormat::Bmp => {
				let file = bmp::load(&mut reader)?;
				bmp::into_indexed(file).ok_or_else(|| {
					BitmapError::UnknownFileType(String::from("BMP does not use a palette (more than 8 bits per pixel)"))
				})
			}
			other => Err(BitmapError::UnknownFileType(format!("{other:?} has no native palette representation"))),
		}
	}

	/// Saves this bitmap and `palette` to `path`, choosing a codec from the file extension.
	pub fn save_file(&self, palette: &Palette, path: &Path) -> Result<(), BitmapError> {
		let file = File::create(path)?;
		let mut writer = BufWriter::new(file);

		match save_format_for_extension(path)? {
			SaveFormat::Pcx => Ok(pcx::save(self, palette, &mut writer)?),
			SaveFormat::Gif => Ok(gif::save(self, palette, &mut writer, gif::GifSaveOptions::default())?),
			SaveFormat::Bmp => Ok(bmp::save(&self.to_rgba(palette), &mut writer)?),
			other => Err(BitmapError::UnknownFileType(format!("{other:?} has no indexed-pixel writer"))),
		}
	}

	/// Copies and converts the entire pixel data from this bitmap to a destination expecting
	/// 32-bit ARGB-format pixel data, using `palette` to resolve each index.
	pub fn copy_as_argb_to(&self, dest: &mut [u32], palette: &Palette) {
		for (&src, dest) in self.pixels().iter().zip(dest.iter_mut()) {
			*dest = palette.get(src as usize).unwrap_or(0xff000000);
		}
	}

	/// Makes an [`RgbaBitmap`] copy of this bitmap, resolving indices through `palette`.
	pub fn to_rgba(&self, palette: &Palette) -> RgbaBitmap {
		let mut output = RgbaBitmap::new(self.width(), self.height()).unwrap();
		self.copy_as_argb_to(output.pixels_mut(), palette);
		output
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graphics::color::to_argb32;

	#[test]
	fn copy_as_argb_resolves_every_index() {
		let mut bitmap = IndexedBitmap::new(2, 1).unwrap();
		bitmap.set_pixel(0, 0, 0);
		bitmap.set_pixel(1, 0, 1);

		let mut palette = Palette::new();
		palette.add(to_argb32(255, 10, 20, 30)).unwrap();
		palette.add(to_argb32(255, 40, 50, 60)).unwrap();

		let rgba = bitmap.to_rgba(&palette);
		assert_eq!(rgba.get_pixel(0, 0), Some(to_argb32(255, 10, 20, 30)));
		assert_eq!(rgba.get_pixel(1, 0), Some(to_argb32(255, 40, 50, 60)));
	}
}
