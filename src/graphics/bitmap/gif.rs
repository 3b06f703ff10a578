//! GIF89a decoding and encoding: global/local colour tables, the Graphic Control, Comment and
//! Application extension blocks, 4-pass interlacing, and transparency via the GCE transparent
//! colour index. A decoded stream is composited onto a single canvas sized from the Logical
//! Screen Descriptor: every Image Descriptor plots its pixels onto that canvas at its own
//! `(left, top)` offset, and a preceding Graphic Control Extension's disposal method 2 restores
//! its image rectangle to the screen's background colour once that image has been plotted. This
//! library has no animation timeline, so that is the full extent of disposal handling; a decoded
//! multi-image GIF yields whatever single picture results from playing every frame onto the
//! canvas in sequence.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;

use crate::graphics::bitmap::indexed::IndexedBitmap;
use crate::graphics::bitmap::rgb::RgbaBitmap;
use crate::graphics::color::to_rgb32;
use crate::graphics::palette::Palette;
use crate::math::rect::Rect;
use crate::utils::lzwgif::{lzw_decode, lzw_encode, LzwError};

const GIF_TRAILER: u8 = 0x3b;
const EXTENSION_INTRODUCER: u8 = 0x21;
const IMAGE_DESCRIPTOR_SEPARATOR: u8 = 0x2c;

const EXT_GRAPHIC_CONTROL: u8 = 0xf9;
const EXT_PLAIN_TEXT: u8 = 0x01;
const EXT_APPLICATION: u8 = 0xff;
const EXT_COMMENT: u8 = 0xfe;

#[derive(Error, Debug)]
pub enum GifError {
	#[error("bad or unsupported GIF file: {0}")]
	BadFile(String),

	#[error("GIF palette data error")]
	BadPalette(#[from] crate::graphics::palette::PaletteError),

	#[error("unknown extension block introducer: {0:#04x}")]
	UnknownExtension(u8),

	#[error("LZW encoding/decoding error")]
	Lzw(#[from] LzwError),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Options controlling GIF output. `transparent_background` marks colour index 0 of the output
/// palette as transparent via a Graphic Control Extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct GifSaveOptions {
	pub transparent_background: bool,
}

/// Ancillary text captured from a decoded GIF's Comment and Application extension blocks. Neither
/// is acted on beyond being surfaced here; this is a static-image decoder, not an animation player.
#[derive(Debug, Clone, Default)]
pub struct GifMetadata {
	pub comments: Vec<String>,
	pub application_identifiers: Vec<String>,
	/// The palette index flagged as fully transparent by the frame's Graphic Control Extension.
	pub transparent_color_index: Option<u8>,
}

fn bits_for_colors(num_colors: usize) -> u8 {
	let mut bits = 1u32;
	while (1usize << bits) < num_colors && bits < 8 {
		bits += 1;
	}
	(bits - 1) as u8
}

fn read_sub_blocks<R: Read>(reader: &mut R) -> Result<Vec<u8>, GifError> {
	let mut data = Vec::new();
	loop {
		let count = reader.read_u8()?;
		if count == 0 {
			break;
		}
		let mut chunk = vec![0u8; count as usize];
		reader.read_exact(&mut chunk)?;
		data.extend_from_slice(&chunk);
	}
	Ok(data)
}

fn load_palette<R: Read>(reader: &mut R, bits: u8) -> Result<Palette, GifError> {
	let num_colors = 1usize << (bits as usize + 1);
	let mut palette = Palette::with_capacity(num_colors);
	for _ in 0..num_colors {
		let r = reader.read_u8()?;
		let g = reader.read_u8()?;
		let b = reader.read_u8()?;
		palette.add(to_rgb32(r, g, b))?;
	}
	Ok(palette)
}

fn save_palette<W: Write>(palette: &Palette, writer: &mut W) -> Result<(), GifError> {
	let bits = bits_for_colors(palette.len().max(2));
	let table_size = 1usize << (bits as usize + 1);
	for i in 0..table_size {
		let color = palette.get(i).unwrap_or(0);
		let (r, g, b) = crate::graphics::color::from_rgb32(color);
		writer.write_u8(r)?;
		writer.write_u8(g)?;
		writer.write_u8(b)?;
	}
	Ok(())
}

#[derive(Debug, Copy, Clone, Default)]
struct GraphicControl {
	disposal_method: u8,
	transparent_color_index: Option<u8>,
}

fn read_graphic_control<R: Read>(reader: &mut R) -> Result<GraphicControl, GifError> {
	let _block_size = reader.read_u8()?;
	let flags = reader.read_u8()?;
	let _delay = reader.read_u16::<LittleEndian>()?;
	let transparent_index = reader.read_u8()?;
	let _terminator = reader.read_u8()?;

	let disposal_method = (flags >> 2) & 0b111;
	let has_transparency = flags & 0b1 != 0;
	Ok(GraphicControl {
		disposal_method,
		transparent_color_index: if has_transparency { Some(transparent_index) } else { None },
	})
}

/// Returns the scanline `y` belongs to in the interlaced source order, given the GIF 4-pass
/// interlace scheme (every 8th row starting at 0, then at 4, then every 4th starting at 2, then
/// every other row starting at 1).
fn interlace_row_order(height: u32) -> Vec<u32> {
	let mut order = Vec::with_capacity(height as usize);
	for y in (0..height).step_by(8) {
		order.push(y);
	}
	for y in (4..height).step_by(8) {
		order.push(y);
	}
	for y in (2..height).step_by(4) {
		order.push(y);
	}
	for y in (1..height).step_by(2) {
		order.push(y);
	}
	order
}

struct ImageDescriptor {
	x: u16,
	y: u16,
	width: u16,
	height: u16,
	flags: u8,
}

impl ImageDescriptor {
	fn has_local_color_table(&self) -> bool {
		self.flags & 0b1000_0000 != 0
	}
	fn is_interlaced(&self) -> bool {
		self.flags & 0b0100_0000 != 0
	}
	fn local_color_table_bits(&self) -> u8 {
		self.flags & 0b111
	}

	fn read<R: Read>(reader: &mut R) -> Result<Self, GifError> {
		Ok(ImageDescriptor {
			x: reader.read_u16::<LittleEndian>()?,
			y: reader.read_u16::<LittleEndian>()?,
			width: reader.read_u16::<LittleEndian>()?,
			height: reader.read_u16::<LittleEndian>()?,
			flags: reader.read_u8()?,
		})
	}

	fn write<W: Write>(&self, writer: &mut W) -> Result<(), GifError> {
		writer.write_u16::<LittleEndian>(self.x)?;
		writer.write_u16::<LittleEndian>(self.y)?;
		writer.write_u16::<LittleEndian>(self.width)?;
		writer.write_u16::<LittleEndian>(self.height)?;
		writer.write_u8(self.flags)?;
		Ok(())
	}
}

/// Decodes a GIF stream onto a single canvas sized from the Logical Screen Descriptor, returning
/// the composited indexed pixels, the palette that last applied to them (the most recent local
/// table, or the global table if no image carried its own), and any ancillary text.
pub fn load<R: Read>(reader: &mut R) -> Result<(IndexedBitmap, Palette, GifMetadata), GifError> {
	let mut signature = [0u8; 6];
	reader.read_exact(&mut signature)?;
	if &signature[0..3] != b"GIF" || (&signature[3..6] != b"89a" && &signature[3..6] != b"87a") {
		return Err(GifError::BadFile(String::from("missing GIF signature")));
	}

	let screen_width = reader.read_u16::<LittleEndian>()?;
	let screen_height = reader.read_u16::<LittleEndian>()?;
	let screen_flags = reader.read_u8()?;
	let background_index = reader.read_u8()?;
	let _aspect_ratio = reader.read_u8()?;

	let has_global_table = screen_flags & 0b1000_0000 != 0;
	let global_table_bits = screen_flags & 0b111;

	let mut global_palette: Option<Palette> = None;
	if has_global_table {
		global_palette = Some(load_palette(reader, global_table_bits)?);
	}

	let mut canvas =
		IndexedBitmap::new(screen_width as u32, screen_height as u32).map_err(|e| GifError::BadFile(e.to_string()))?;
	canvas.set_pen_color(background_index);
	canvas.clear(canvas.pen_color());

	let mut metadata = GifMetadata::default();
	let mut current_gce: Option<GraphicControl> = None;
	let mut palette = global_palette.clone();
	let mut frame_count = 0usize;

	loop {
		let marker = reader.read_u8()?;
		match marker {
			GIF_TRAILER => break,
			IMAGE_DESCRIPTOR_SEPARATOR => {
				let descriptor = ImageDescriptor::read(reader)?;
				let local_palette =
					if descriptor.has_local_color_table() { Some(load_palette(reader, descriptor.local_color_table_bits())?) } else { None };
				let frame_palette = local_palette.or_else(|| global_palette.clone()).ok_or_else(|| {
					GifError::BadFile(String::from("image has no local or global colour table"))
				})?;

				decode_image_data(reader, &mut canvas, &descriptor)?;
				frame_count += 1;

				if let Some(gce) = current_gce {
					metadata.transparent_color_index = gce.transparent_color_index;
					if gce.disposal_method == 2 {
						let image_rect = Rect {
							x: descriptor.x as i32,
							y: descriptor.y as i32,
							width: descriptor.width as u32,
							height: descriptor.height as u32,
						};
						canvas.fill_rect(&image_rect, background_index);
					}
				}

				palette = Some(frame_palette);
				current_gce = None;
			}
			EXTENSION_INTRODUCER => {
				let label = reader.read_u8()?;
				match label {
					EXT_GRAPHIC_CONTROL => current_gce = Some(read_graphic_control(reader)?),
					EXT_PLAIN_TEXT => {
						let _block_size = reader.read_u8()?;
						let mut fixed = [0u8; 12];
						reader.read_exact(&mut fixed)?;
						read_sub_blocks(reader)?;
					}
					EXT_APPLICATION => {
						let _block_size = reader.read_u8()?;
						let mut identifier = [0u8; 8];
						reader.read_exact(&mut identifier)?;
						let mut authentication_code = [0u8; 3];
						reader.read_exact(&mut authentication_code)?;
						let _data = read_sub_blocks(reader)?;
						metadata.application_identifiers.push(String::from_utf8_lossy(&identifier).into_owned());
					}
					EXT_COMMENT => {
						let data = read_sub_blocks(reader)?;
						metadata.comments.push(String::from_utf8_lossy(&data).into_owned());
					}
					other => return Err(GifError::UnknownExtension(other)),
				}
			}
			other => return Err(GifError::BadFile(format!("unexpected block introducer byte {:#04x}", other))),
		}
	}

	if frame_count == 0 {
		return Err(GifError::BadFile(String::from("no image data found")));
	}
	let palette = palette.ok_or_else(|| GifError::BadFile(String::from("no colour table available")))?;

	Ok((canvas, palette, metadata))
}

/// Decodes one image descriptor's LZW pixel data and plots it onto `canvas` at `(descriptor.x,
/// descriptor.y)`, honoring the descriptor's own interlacing flag independently of the canvas.
fn decode_image_data<R: Read>(reader: &mut R, canvas: &mut IndexedBitmap, descriptor: &ImageDescriptor) -> Result<(), GifError> {
	let mut decoded = Vec::new();
	lzw_decode(reader, &mut decoded)?;

	let width = descriptor.width as u32;
	let height = descriptor.height as u32;
	let left = descriptor.x as i32;
	let top = descriptor.y as i32;

	if descriptor.is_interlaced() {
		let mut offset = 0usize;
		for y in interlace_row_order(height) {
			let row_end = offset + width as usize;
			if row_end > decoded.len() {
				break;
			}
			plot_row(canvas, &decoded[offset..row_end], left, top, y);
			offset = row_end;
		}
	} else {
		for y in 0..height {
			let row_start = (y * width) as usize;
			let row_end = row_start + width as usize;
			if row_end > decoded.len() {
				break;
			}
			plot_row(canvas, &decoded[row_start..row_end], left, top, y);
		}
	}

	Ok(())
}

fn plot_row(canvas: &mut IndexedBitmap, row: &[u8], left: i32, top: i32, y: u32) {
	for (x, &value) in row.iter().enumerate() {
		canvas.set_pixel(left + x as i32, top + y as i32, value);
	}
}

/// Encodes `bitmap` (and its paired `palette`) as a single-frame GIF89a stream.
pub fn save<W: Write>(bitmap: &IndexedBitmap, palette: &Palette, writer: &mut W, options: GifSaveOptions) -> Result<(), GifError> {
	let bits = bits_for_colors(palette.len().max(2));

	writer.write_all(b"GIF89a")?;
	writer.write_u16::<LittleEndian>(bitmap.width() as u16)?;
	writer.write_u16::<LittleEndian>(bitmap.height() as u16)?;
	let screen_flags = 0b1000_0000 | (bits << 4) | bits;
	writer.write_u8(screen_flags)?;
	writer.write_u8(0)?;
	writer.write_u8(0)?;

	save_palette(palette, writer)?;

	if options.transparent_background {
		writer.write_u8(EXTENSION_INTRODUCER)?;
		writer.write_u8(EXT_GRAPHIC_CONTROL)?;
		writer.write_u8(4)?;
		writer.write_u8(0b0000_1001)?; // disposal: do not dispose (0), transparency flag set
		writer.write_u16::<LittleEndian>(0)?;
		writer.write_u8(0)?;
		writer.write_u8(0)?;
	}

	writer.write_u8(IMAGE_DESCRIPTOR_SEPARATOR)?;
	let descriptor = ImageDescriptor { x: 0, y: 0, width: bitmap.width() as u16, height: bitmap.height() as u16, flags: 0 };
	descriptor.write(writer)?;

	let min_code_size = (bits + 1).max(2) as usize;
	let mut source = std::io::Cursor::new(bitmap.pixels());
	lzw_encode(&mut source, writer, min_code_size)?;

	writer.write_u8(GIF_TRAILER)?;
	Ok(())
}

/// Builds a GIF-ready indexed bitmap and palette from true-colour pixels: reuses the bitmap's
/// attached palette when present, otherwise quantizes one with [`crate::quantize::make_palette`]
/// and reduces colours with [`crate::dither::floyd_steinberg`].
pub fn prepare_for_save(bitmap: &RgbaBitmap) -> Result<(IndexedBitmap, Palette), GifError> {
	let palette = match bitmap.palette() {
		Some(handle) => handle.borrow().clone(),
		None => crate::quantize::make_palette(bitmap),
	};

	let mut reduced = bitmap.clone();
	if bitmap.palette().is_none() {
		crate::dither::floyd_steinberg(&mut reduced, &palette, crate::graphics::palette::NearestColorMetric::EuclideanSquared);
	}

	let mut indexed = IndexedBitmap::new(reduced.width(), reduced.height()).map_err(|e| GifError::BadFile(e.to_string()))?;
	for (dest, &color) in indexed.pixels_mut().iter_mut().zip(reduced.pixels().iter()) {
		*dest = palette.nearest_index(color, crate::graphics::palette::NearestColorMetric::EuclideanSquared).unwrap_or(0) as u8;
	}

	Ok((indexed, palette))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::graphics::color::from_rgb32;
	use std::io::Cursor;

	fn small_palette() -> Palette {
		let mut palette = Palette::new();
		palette.add(to_rgb32(0, 0, 0)).unwrap();
		palette.add(to_rgb32(255, 255, 255)).unwrap();
		palette
	}

	/// Hand-assembles a GIF stream with a 4-entry global palette (black, white, red, blue) and a
	/// 4x4 logical screen, so individual tests can control the background index and feed in their
	/// own sequence of image descriptors and graphic control extensions.
	struct RawGifBuilder {
		bytes: Vec<u8>,
	}

	impl RawGifBuilder {
		fn new(background_index: u8) -> Self {
			let mut bytes = Vec::new();
			bytes.extend_from_slice(b"GIF89a");
			bytes.extend_from_slice(&4u16.to_le_bytes());
			bytes.extend_from_slice(&4u16.to_le_bytes());
			bytes.push(0b1000_0001); // global table present, 2 bits -> 4 entries
			bytes.push(background_index);
			bytes.push(0);
			for (r, g, b) in [(0, 0, 0), (255, 255, 255), (255, 0, 0), (0, 0, 255)] {
				bytes.push(r);
				bytes.push(g);
				bytes.push(b);
			}
			RawGifBuilder { bytes }
		}

		fn graphic_control(mut self, disposal_method: u8) -> Self {
			self.bytes.push(EXTENSION_INTRODUCER);
			self.bytes.push(EXT_GRAPHIC_CONTROL);
			self.bytes.push(4);
			self.bytes.push(disposal_method << 2);
			self.bytes.extend_from_slice(&0u16.to_le_bytes());
			self.bytes.push(0);
			self.bytes.push(0);
			self
		}

		fn image(mut self, x: u16, y: u16, width: u16, height: u16, index: u8) -> Self {
			self.bytes.push(IMAGE_DESCRIPTOR_SEPARATOR);
			let descriptor = ImageDescriptor { x, y, width, height, flags: 0 };
			descriptor.write(&mut self.bytes).unwrap();
			let pixels = vec![index; width as usize * height as usize];
			lzw_encode(&mut Cursor::new(pixels), &mut self.bytes, 2).unwrap();
			self
		}

		fn finish(mut self) -> Vec<u8> {
			self.bytes.push(GIF_TRAILER);
			self.bytes
		}
	}

	#[test]
	fn round_trips_a_checkerboard() {
		let mut bitmap = IndexedBitmap::new(4, 4).unwrap();
		for y in 0..4 {
			for x in 0..4 {
				bitmap.set_pixel(x, y, ((x + y) % 2) as u8);
			}
		}
		let palette = small_palette();

		let mut bytes = Vec::new();
		save(&bitmap, &palette, &mut bytes, GifSaveOptions::default()).unwrap();

		let (decoded, decoded_palette, _metadata) = load(&mut Cursor::new(bytes)).unwrap();
		assert_eq!(decoded.width(), 4);
		assert_eq!(decoded.height(), 4);
		assert_eq!(decoded.pixels(), bitmap.pixels());
		assert_eq!(decoded_palette.len(), palette.len());
	}

	#[test]
	fn rejects_bad_signature() {
		let mut bytes = Vec::new();
		bytes.extend_from_slice(b"PNG89a");
		let result = load(&mut Cursor::new(bytes));
		assert!(matches!(result, Err(GifError::BadFile(_))));
	}

	#[test]
	fn interlace_row_order_covers_every_row_once() {
		let mut order = interlace_row_order(8);
		order.sort_unstable();
		assert_eq!(order, (0..8).collect::<Vec<_>>());
	}

	#[test]
	fn canvas_starts_at_the_background_index_outside_every_image_rect() {
		let bytes = RawGifBuilder::new(2).image(1, 1, 2, 2, 1).finish();

		let (canvas, _palette, _metadata) = load(&mut Cursor::new(bytes)).unwrap();
		assert_eq!(canvas.get_pixel(0, 0), Some(2));
		assert_eq!(canvas.get_pixel(3, 3), Some(2));
		assert_eq!(canvas.get_pixel(1, 1), Some(1));
		assert_eq!(canvas.get_pixel(2, 2), Some(1));
	}

	#[test]
	fn composites_every_image_descriptor_onto_the_same_canvas() {
		let bytes = RawGifBuilder::new(0).image(0, 0, 4, 4, 0).image(1, 1, 2, 2, 1).finish();

		let (canvas, _palette, _metadata) = load(&mut Cursor::new(bytes)).unwrap();
		// corner belongs only to the first (full-canvas) image
		assert_eq!(canvas.get_pixel(0, 0), Some(0));
		assert_eq!(canvas.get_pixel(3, 3), Some(0));
		// interior belongs to the second image, plotted on top at its own offset
		assert_eq!(canvas.get_pixel(1, 1), Some(1));
		assert_eq!(canvas.get_pixel(2, 2), Some(1));
	}

	#[test]
	fn disposal_method_two_restores_only_its_own_image_rect_to_background() {
		let bytes = RawGifBuilder::new(2)
			.image(0, 0, 4, 4, 3)
			.graphic_control(2)
			.image(1, 1, 2, 2, 1)
			.finish();

		let (canvas, _palette, _metadata) = load(&mut Cursor::new(bytes)).unwrap();
		// the disposed image's own rect reverts to the background index, not its own pixel value
		assert_eq!(canvas.get_pixel(1, 1), Some(2));
		assert_eq!(canvas.get_pixel(2, 2), Some(2));
		// everything outside that rect is untouched by the disposal, still the first image's color
		assert_eq!(canvas.get_pixel(0, 0), Some(3));
		assert_eq!(canvas.get_pixel(3, 3), Some(3));
	}

	#[test]
	fn prepare_for_save_builds_a_usable_palette() {
		let mut bitmap = RgbaBitmap::new(4, 4).unwrap();
		for (i, pixel) in bitmap.pixels_mut().iter_mut().enumerate() {
			*pixel = if i % 2 == 0 { to_rgb32(0, 0, 0) } else { to_rgb32(255, 255, 255) };
		}

		let (indexed, palette) = prepare_for_save(&bitmap).unwrap();
		assert_eq!(indexed.width(), 4);
		assert!(palette.len() <= 256);
		for &index in indexed.pixels() {
			let color = palette.get(index as usize).unwrap();
			let (r, _, _) = from_rgb32(color);
			assert!(r == 0 || r == 255);
		}
	}
}
