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

//! Component I: external serialization. Unlike the scratch file (an
//! internal allocation arena with no stable layout), this is a format
//! stable across processes: a count, then for each entry the key's
//! encoding length-prefixed, followed by the value's encoding
//! length-prefixed (spec §6 External serialization format). Values are
//! always written in their decompressed, logical form — the block
//! compression applied on the scratch file is a storage-engine detail this
//! format never exposes.

use crate::codec::Codec;
use crate::container::Container;
use crate::error::{Error, Result};
use crate::index::IndexStore;
use std::convert::TryFrom;
use std::hash::Hash;
use std::io::{Read, Write};

fn write_framed<W: Write>(sink: &mut W, bytes: &[u8]) -> Result<()> {
	let len = u32::try_from(bytes.len()).map_err(|_| Error::OutOfRange("encoded block exceeds u32 length"))?;
	sink.write_all(&len.to_le_bytes())?;
	sink.write_all(bytes)?;
	Ok(())
}

fn read_framed<R: Read>(source: &mut R) -> Result<Vec<u8>> {
	let mut len_buf = [0u8; 4];
	source.read_exact(&mut len_buf)?;
	let len = u32::from_le_bytes(len_buf) as usize;
	let mut buf = vec![0u8; len];
	source.read_exact(&mut buf)?;
	Ok(buf)
}

/// Stream `container` to `sink` in the stable external format. `KC`/`VC`
/// are the caller's key/value codecs (distinct type parameters because the
/// container itself only ever stores a `Codec<V>`, never a `Codec<K>` —
/// keys are always held decoded).
pub fn write<K, V, I, KC, VC, W>(sink: &mut W, container: &mut Container<K, V, I>) -> Result<()>
where
	K: Clone + Eq + Hash,
	V: Clone,
	I: IndexStore<K, V> + Clone,
	KC: Codec<K>,
	VC: Codec<V>,
	W: Write,
{
	let keys = container.keys();
	let count = i32::try_from(keys.len()).map_err(|_| Error::OutOfRange("container too large to serialize"))?;
	sink.write_all(&count.to_le_bytes())?;
	for key in keys {
		let key_bytes = KC::encode(&key);
		write_framed(sink, &key_bytes)?;
		let value = container.lookup::<VC>(&key)?;
		let value_bytes = VC::encode(&value);
		write_framed(sink, &value_bytes)?;
	}
	Ok(())
}

/// Read the external format from `source`, inserting each pair into
/// `target`. Pre-existing keys are overwritten, matching a plain `insert`
/// call per pair (spec §4.I); inserts may trigger eviction and grow the
/// scratch file exactly as a direct `insert` would.
pub fn read<K, V, I, KC, VC, R>(source: &mut R, target: &mut Container<K, V, I>) -> Result<()>
where
	K: Clone + Eq + Hash,
	V: Clone,
	I: IndexStore<K, V> + Clone,
	KC: Codec<K>,
	VC: Codec<V>,
	R: Read,
{
	let mut count_buf = [0u8; 4];
	source.read_exact(&mut count_buf)?;
	let count = i32::from_le_bytes(count_buf).max(0);
	for _ in 0..count {
		let key_bytes = read_framed(source)?;
		let key = KC::decode(&key_bytes)?;
		let value_bytes = read_framed(source)?;
		let value = VC::decode(&value_bytes)?;
		target.insert::<VC>(key, value)?;
	}
	Ok(())
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::index::BTreeIndex;
	use crate::options::Options;

	struct StringCodec;
	impl Codec<String> for StringCodec {
		fn encode(value: &String) -> Vec<u8> {
			value.as_bytes().to_vec()
		}
		fn decode(bytes: &[u8]) -> Result<String> {
			Ok(String::from_utf8_lossy(bytes).into_owned())
		}
	}

	struct I32Codec;
	impl Codec<i32> for I32Codec {
		fn encode(value: &i32) -> Vec<u8> {
			value.to_le_bytes().to_vec()
		}
		fn decode(bytes: &[u8]) -> Result<i32> {
			use std::convert::TryInto;
			let arr: [u8; 4] = bytes.try_into().map_err(|_| Error::Decode("bad i32 length".into()))?;
			Ok(i32::from_le_bytes(arr))
		}
	}

	fn dir() -> tempfile::TempDir {
		env_logger::try_init().ok();
		tempfile::TempDir::new().unwrap()
	}

	fn container(dir: &tempfile::TempDir, max_cache: u32) -> Container<i32, String, BTreeIndex<i32, String>> {
		let options = Options { max_cache, compression_level: 0, temp_dir: dir.path().to_path_buf(), file_prefix: "HugeContainerData".into() };
		Container::with_options(options)
	}

	#[test]
	fn write_then_read_round_trips() {
		let d = dir();
		let mut original = container(&d, 1);
		for i in 0..5 {
			original.insert::<StringCodec>(i, format!("value-{}", i)).unwrap();
		}

		let mut buf = Vec::new();
		write::<_, _, _, I32Codec, StringCodec, _>(&mut buf, &mut original).unwrap();

		let mut restored = container(&d, 4);
		read::<_, _, _, I32Codec, StringCodec, _>(&mut &buf[..], &mut restored).unwrap();

		assert_eq!(restored.len(), 5);
		for i in 0..5 {
			assert_eq!(restored.lookup::<StringCodec>(&i).unwrap(), format!("value-{}", i));
		}
	}

	#[test]
	fn read_overwrites_existing_keys_in_target() {
		let d = dir();
		let mut source = container(&d, 4);
		source.insert::<StringCodec>(0, "new".to_string()).unwrap();

		let mut buf = Vec::new();
		write::<_, _, _, I32Codec, StringCodec, _>(&mut buf, &mut source).unwrap();

		let mut target = container(&d, 4);
		target.insert::<StringCodec>(0, "old".to_string()).unwrap();
		read::<_, _, _, I32Codec, StringCodec, _>(&mut &buf[..], &mut target).unwrap();

		assert_eq!(target.lookup::<StringCodec>(&0).unwrap(), "new");
	}

	#[test]
	fn written_values_are_compression_agnostic() {
		let d = dir();
		let options = Options { max_cache: 1, compression_level: 6, temp_dir: d.path().to_path_buf(), file_prefix: "HugeContainerData".into() };
		let mut original: Container<i32, String, BTreeIndex<i32, String>> = Container::with_options(options);
		for i in 0..3 {
			original.insert::<StringCodec>(i, "x".repeat(128)).unwrap();
		}
		let mut buf = Vec::new();
		write::<_, _, _, I32Codec, StringCodec, _>(&mut buf, &mut original).unwrap();

		let mut restored = container(&d, 4);
		read::<_, _, _, I32Codec, StringCodec, _>(&mut &buf[..], &mut restored).unwrap();
		assert_eq!(restored.compression_level(), 0);
		assert_eq!(restored.lookup::<StringCodec>(&0).unwrap(), "x".repeat(128));
	}
}
