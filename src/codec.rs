// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Parity.

// Parity is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Parity is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Parity.  If not, see <http://www.gnu.org/licenses/>.

//! Component B: the block codec. Callers supply the byte-level encoding of
//! their own value type; this module layers the container's compression
//! policy on top of it.

use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Caller-supplied encode/decode for a value type. The engine never
/// inspects the bytes beyond handing them to the compressor.
pub trait Codec<V> {
	fn encode(value: &V) -> Vec<u8>;
	fn decode(bytes: &[u8]) -> Result<V>;
}

fn flate_level(level: i8) -> flate2::Compression {
	if level < 0 {
		flate2::Compression::default()
	} else {
		flate2::Compression::new(level as u32)
	}
}

/// Encode `value` and apply compression at `level` (0 = off), producing the
/// bytes that get written to a block in the scratch file.
pub fn encode<V, C: Codec<V>>(value: &V, level: i8) -> Vec<u8> {
	let raw = C::encode(value);
	if level == 0 {
		return raw;
	}
	let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate_level(level));
	// Writing to an in-memory Vec via ZlibEncoder cannot fail.
	encoder.write_all(&raw).expect("in-memory zlib encode");
	encoder.finish().expect("in-memory zlib encode")
}

/// Reverse of `encode`: decompress (if `level != 0`) then hand the raw bytes
/// to the caller's decoder.
pub fn decode<V, C: Codec<V>>(bytes: &[u8], level: i8) -> Result<V> {
	if level == 0 {
		return C::decode(bytes);
	}
	let mut decoder = flate2::read::ZlibDecoder::new(bytes);
	let mut raw = Vec::new();
	decoder
		.read_to_end(&mut raw)
		.map_err(|e| Error::Decode(format!("zlib inflate failed: {}", e)))?;
	C::decode(&raw)
}

/// Recompress a block that is already in its raw (decompressed) form at a
/// new level, without invoking the value codec at all. Used by `defrag` and
/// `set_compression_level`, which only ever touch already-decoded bytes.
pub fn recompress(raw: &[u8], level: i8) -> Vec<u8> {
	if level == 0 {
		return raw.to_vec();
	}
	let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate_level(level));
	encoder.write_all(raw).expect("in-memory zlib encode");
	encoder.finish().expect("in-memory zlib encode")
}

/// Strip compression from a stored block, yielding the raw encoded bytes
/// the value codec would have produced.
pub fn decompress(bytes: &[u8], level: i8) -> Result<Vec<u8>> {
	if level == 0 {
		return Ok(bytes.to_vec());
	}
	let mut decoder = flate2::read::ZlibDecoder::new(bytes);
	let mut raw = Vec::new();
	decoder
		.read_to_end(&mut raw)
		.map_err(|e| Error::Decode(format!("zlib inflate failed: {}", e)))?;
	Ok(raw)
}
