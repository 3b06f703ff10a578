//! LZW compression/decompression as used by the GIF image format.
//!
//! This is not general-purpose LZW: codes are packed least-significant-bit-first into a stream
//! that GIF further wraps into length-prefixed sub-blocks of at most 255 bytes (terminated by a
//! zero-length block), code width starts at `minimum_code_size + 1` bits and grows as the
//! dictionary fills, and two reserved codes — a clear code and an end-of-information code — sit
//! just above the literal byte codes. `minimum_code_size` must be between 2 and 8 inclusive.

use std::io::ErrorKind;

use byteorder::{ReadBytesExt, WriteBytesExt};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LzwError {
	#[error("unsupported LZW minimum code size: {0} (must be 2..=8)")]
	UnsupportedMinCodeSize(usize),

	#[error("malformed LZW code stream: {0}")]
	BadStream(String),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

const MAX_CODE_BITS: u32 = 12;
const DICTIONARY_CAPACITY: usize = 1 << MAX_CODE_BITS;
const MAX_SUB_BLOCK_LEN: usize = 255;

fn valid_min_code_size(bits: usize) -> bool {
	(2..=8).contains(&bits)
}

#[inline]
fn max_code_for_width(width: u32) -> u16 {
	((1u32 << width) - 1) as u16
}

/// Packs fixed- (but changing-) width codes into a byte stream, least-significant-bit first.
struct BitWriter {
	accumulator: u32,
	bits_held: u32,
	out: Vec<u8>,
}

impl BitWriter {
	fn new() -> Self {
		BitWriter { accumulator: 0, bits_held: 0, out: Vec::new() }
	}

	fn push(&mut self, code: u16, width: u32) {
		self.accumulator |= (code as u32) << self.bits_held;
		self.bits_held += width;
		while self.bits_held >= 8 {
			self.out.push((self.accumulator & 0xff) as u8);
			self.accumulator >>= 8;
			self.bits_held -= 8;
		}
	}

	/// Drains any partial byte and returns the packed stream, consuming this writer.
	fn into_bytes(mut self) -> Vec<u8> {
		if self.bits_held > 0 {
			self.out.push((self.accumulator & 0xff) as u8);
		}
		self.out
	}
}

/// The inverse of [`BitWriter`]: pulls fixed-width codes out of a byte slice.
struct BitReader<'a> {
	data: &'a [u8],
	pos: usize,
	accumulator: u32,
	bits_held: u32,
}

impl<'a> BitReader<'a> {
	fn new(data: &'a [u8]) -> Self {
		BitReader { data, pos: 0, accumulator: 0, bits_held: 0 }
	}

	fn pull(&mut self, width: u32) -> Option<u16> {
		while self.bits_held < width {
			if self.pos >= self.data.len() {
				return None;
			}
			self.accumulator |= (self.data[self.pos] as u32) << self.bits_held;
			self.pos += 1;
			self.bits_held += 8;
		}
		let value = (self.accumulator & ((1u32 << width) - 1)) as u16;
		self.accumulator >>= width;
		self.bits_held -= width;
		Some(value)
	}
}

fn write_data_sub_blocks<W: WriteBytesExt>(writer: &mut W, data: &[u8]) -> Result<(), LzwError> {
	for chunk in data.chunks(MAX_SUB_BLOCK_LEN) {
		writer.write_u8(chunk.len() as u8)?;
		writer.write_all(chunk)?;
	}
	writer.write_u8(0)?;
	Ok(())
}

fn read_data_sub_blocks<R: ReadBytesExt>(reader: &mut R) -> Result<Vec<u8>, LzwError> {
	let mut data = Vec::new();
	loop {
		let len = reader.read_u8()?;
		if len == 0 {
			break;
		}
		let mut chunk = vec![0u8; len as usize];
		reader.read_exact(&mut chunk)?;
		data.append(&mut chunk);
	}
	Ok(data)
}

fn try_read_byte<R: ReadBytesExt>(src: &mut R) -> Result<Option<u8>, LzwError> {
	match src.read_u8() {
		Ok(byte) => Ok(Some(byte)),
		Err(ref error) if error.kind() == ErrorKind::UnexpectedEof => Ok(None),
		Err(error) => Err(LzwError::Io(error)),
	}
}

/// Encodes the bytes read from `src`, writing the GIF sub-block-chunked LZW stream to `dest`.
/// `min_code_size` (2..=8) is written as the leading byte, matching GIF's per-image convention.
pub fn lzw_encode<S, D>(src: &mut S, dest: &mut D, min_code_size: usize) -> Result<(), LzwError>
where
	S: ReadBytesExt,
	D: WriteBytesExt,
{
	if !valid_min_code_size(min_code_size) {
		return Err(LzwError::UnsupportedMinCodeSize(min_code_size));
	}

	let literal_count = 1u16 << min_code_size;
	let clear_code = literal_count;
	let end_code = clear_code + 1;

	dest.write_u8(min_code_size as u8)?;

	let mut bits = BitWriter::new();
	let mut code_width = min_code_size as u32 + 1;
	bits.push(clear_code, code_width);

	// maps (code of the string seen so far, next byte) to the code assigned to their concatenation
	let mut transitions: std::collections::HashMap<(u16, u8), u16> = std::collections::HashMap::new();
	let mut next_code = end_code + 1;

	let mut current_code = match try_read_byte(src)? {
		Some(byte) => byte as u16,
		None => {
			bits.push(end_code, code_width);
			write_data_sub_blocks(dest, &bits.into_bytes())?;
			return Ok(());
		}
	};

	while let Some(byte) = try_read_byte(src)? {
		if let Some(&extended) = transitions.get(&(current_code, byte)) {
			current_code = extended;
			continue;
		}

		bits.push(current_code, code_width);

		let new_code = next_code;
		next_code += 1;
		transitions.insert((current_code, byte), new_code);

		if new_code > max_code_for_width(code_width) && code_width < MAX_CODE_BITS {
			code_width += 1;
		}
		if new_code as usize == DICTIONARY_CAPACITY - 1 {
			transitions.clear();
			next_code = end_code + 1;
			code_width = min_code_size as u32 + 1;
			bits.push(clear_code, code_width);
		}

		current_code = byte as u16;
	}

	bits.push(current_code, code_width);
	bits.push(end_code, code_width);
	write_data_sub_blocks(dest, &bits.into_bytes())?;
	Ok(())
}

/// A dictionary entry: every string longer than one byte is recorded as a parent code plus the
/// one extra byte appended to it, so expanding a code means walking its ancestry chain rather
/// than storing the whole expanded string redundantly at every code.
#[derive(Clone, Copy)]
struct DictEntry {
	parent: Option<u16>,
	byte: u8,
}

fn seed_dictionary(min_code_size: usize) -> Vec<Option<DictEntry>> {
	let mut table = vec![None; DICTIONARY_CAPACITY];
	for byte in 0..(1usize << min_code_size) {
		table[byte] = Some(DictEntry { parent: None, byte: byte as u8 });
	}
	table
}

fn expand_code(table: &[Option<DictEntry>], code: u16) -> Vec<u8> {
	let mut bytes = Vec::new();
	let mut cursor = Some(code);
	while let Some(c) = cursor {
		let entry = table[c as usize].expect("code chain must only reference live entries");
		bytes.push(entry.byte);
		cursor = entry.parent;
	}
	bytes.reverse();
	bytes
}

/// Decodes a GIF sub-block-chunked LZW stream read from `src`, writing the decompressed bytes to
/// `dest`.
pub fn lzw_decode<S, D>(src: &mut S, dest: &mut D) -> Result<(), LzwError>
where
	S: ReadBytesExt,
	D: WriteBytesExt,
{
	let min_code_size = src.read_u8()? as usize;
	if !valid_min_code_size(min_code_size) {
		return Err(LzwError::UnsupportedMinCodeSize(min_code_size));
	}

	let packed = read_data_sub_blocks(src)?;
	let mut bits = BitReader::new(&packed);

	let literal_count = 1u16 << min_code_size;
	let clear_code = literal_count;
	let end_code = clear_code + 1;
	let mut code_width = min_code_size as u32 + 1;

	let mut table = seed_dictionary(min_code_size);
	let mut next_code = end_code + 1;

	match bits.pull(code_width) {
		Some(code) if code == clear_code => {}
		Some(_) => return Err(LzwError::BadStream(String::from("stream does not open with a clear code"))),
		None => return Ok(()),
	}

	let mut prev_code: Option<u16> = None;

	loop {
		let code = match bits.pull(code_width) {
			Some(code) => code,
			None => break,
		};

		if code == end_code {
			break;
		}

		if code == clear_code {
			table = seed_dictionary(min_code_size);
			next_code = end_code + 1;
			code_width = min_code_size as u32 + 1;
			prev_code = None;
			continue;
		}

		let expanded = if (code as usize) < DICTIONARY_CAPACITY && table[code as usize].is_some() {
			expand_code(&table, code)
		} else if code == next_code {
			let prev = prev_code
				.ok_or_else(|| LzwError::BadStream(String::from("code references an entry not yet in the dictionary")))?;
			let mut string = expand_code(&table, prev);
			string.push(string[0]);
			string
		} else {
			return Err(LzwError::BadStream(format!("code {} is out of range", code)));
		};

		dest.write_all(&expanded)?;

		if let Some(prev) = prev_code {
			table[next_code as usize] = Some(DictEntry { parent: Some(prev), byte: expanded[0] });
			let new_code = next_code;
			next_code += 1;
			// the decoder is always one dictionary entry "behind" the encoder (it cannot record a
			// new string until it has seen the code that follows it), so it must widen codes one
			// step earlier than the encoder does: as soon as new_code reaches the current width's
			// ceiling, rather than once it exceeds it.
			if new_code == max_code_for_width(code_width) && code_width < MAX_CODE_BITS {
				code_width += 1;
			}
		}

		prev_code = Some(code);
	}

	Ok(())
}
