//! Magic-byte sniffing for load, and extension-based codec selection for save. Shared by
//! [`super::indexed::IndexedBitmap`] and [`super::rgb::RgbaBitmap`]'s `load_file`/`save_file`.

use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use super::BitmapError;
use crate::utils::io::StreamSize;

/// The codec a byte stream was sniffed as belonging to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoadFormat {
	Bmp,
	Gif,
	Pcx,
	Netpbm,
	Tga,
}

/// Reads up to 4 magic bytes (restoring the stream position afterward) and identifies the format.
/// Falls back to the TGA heuristic ([`super::tga::looks_like_tga`]) when nothing else matches,
/// since TGA files carry no magic number.
pub fn sniff_format<R: Read + Seek>(reader: &mut R) -> Result<LoadFormat, BitmapError> {
	if reader.stream_size()? == 0 {
		return Err(BitmapError::UnknownFileType(String::from("empty file")));
	}

	let start = reader.stream_position()?;
	let mut header = [0u8; 4];
	let bytes_read = read_up_to(reader, &mut header)?;
	reader.seek(SeekFrom::Start(start))?;

	if bytes_read >= 2 && &header[0..2] == b"BM" {
		return Ok(LoadFormat::Bmp);
	}
	if bytes_read >= 3 && &header[0..3] == b"GIF" {
		return Ok(LoadFormat::Gif);
	}
	if bytes_read >= 1 && header[0] == 0x0a {
		return Ok(LoadFormat::Pcx);
	}
	if bytes_read >= 2 && header[0] == b'P' && (b'1'..=b'6').contains(&header[1]) {
		return Ok(LoadFormat::Netpbm);
	}

	if super::tga::looks_like_tga(reader)? {
		return Ok(LoadFormat::Tga);
	}

	Err(BitmapError::UnknownFileType(String::from("unrecognized magic bytes and not a valid TGA header")))
}

fn read_up_to<R: Read>(reader: &mut R, buffer: &mut [u8]) -> std::io::Result<usize> {
	let mut total = 0;
	while total < buffer.len() {
		match reader.read(&mut buffer[total..]) {
			Ok(0) => break,
			Ok(n) => total += n,
			Err(ref error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
			Err(error) => return Err(error),
		}
	}
	Ok(total)
}

/// The codec an output file extension selects. `png`/`jpg`/`jpeg` are recognized but unsupported
/// (those encoders are external collaborators, not implemented by this crate's codec core);
/// anything else unrecognized falls back to BMP.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SaveFormat {
	Bmp,
	Gif,
	Pcx,
	Netpbm(super::netpbm::NetpbmKind),
	Tga,
}

pub fn save_format_for_extension(path: &Path) -> Result<SaveFormat, BitmapError> {
	let extension = path.extension().and_then(|ext| ext.to_str()).map(|ext| ext.to_ascii_lowercase());

	Ok(match extension.as_deref() {
		Some("bmp") => SaveFormat::Bmp,
		Some("gif") => SaveFormat::Gif,
		Some("pcx") => SaveFormat::Pcx,
		Some("tga") => SaveFormat::Tga,
		Some("pbm") => SaveFormat::Netpbm(super::netpbm::NetpbmKind::Pbm),
		Some("pgm") => SaveFormat::Netpbm(super::netpbm::NetpbmKind::Pgm),
		Some("ppm") => SaveFormat::Netpbm(super::netpbm::NetpbmKind::Ppm),
		Some("png") | Some("jpg") | Some("jpeg") => {
			return Err(BitmapError::UnsupportedFormat(extension.unwrap()));
		}
		_ => SaveFormat::Bmp,
	})
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;
	use std::path::Path;

	use super::*;

	#[test]
	fn sniffs_bmp_and_gif_magic_bytes() {
		assert_eq!(sniff_format(&mut Cursor::new(b"BM\x00\x00")).unwrap(), LoadFormat::Bmp);
		assert_eq!(sniff_format(&mut Cursor::new(b"GIF89a")).unwrap(), LoadFormat::Gif);
	}

	#[test]
	fn sniffs_pcx_and_netpbm_magic_bytes() {
		assert_eq!(sniff_format(&mut Cursor::new(&[0x0a, 5, 1, 1])).unwrap(), LoadFormat::Pcx);
		assert_eq!(sniff_format(&mut Cursor::new(b"P6 1 1")).unwrap(), LoadFormat::Netpbm);
	}

	#[test]
	fn rejects_an_empty_stream() {
		assert!(matches!(sniff_format(&mut Cursor::new(&[])), Err(BitmapError::UnknownFileType(_))));
	}

	#[test]
	fn extension_dispatch_maps_known_extensions() {
		assert_eq!(save_format_for_extension(Path::new("x.bmp")).unwrap(), SaveFormat::Bmp);
		assert_eq!(save_format_for_extension(Path::new("x.PPM")).unwrap(), SaveFormat::Netpbm(super::super::netpbm::NetpbmKind::Ppm));
		assert_eq!(save_format_for_extension(Path::new("x.unknown")).unwrap(), SaveFormat::Bmp);
	}

	#[test]
	fn extension_dispatch_rejects_png_and_jpeg() {
		assert!(matches!(save_format_for_extension(Path::new("x.png")), Err(BitmapError::UnsupportedFormat(_))));
		assert!(matches!(save_format_for_extension(Path::new("x.jpeg")), Err(BitmapError::UnsupportedFormat(_))));
	}
}
