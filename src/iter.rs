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

//! Component G: iterators and the collection-style façade built on top of
//! `Container`. An iterator holds a snapshot of the key order (taken from
//! `IndexStore::iter_keys`) and a mutable borrow of the container; stepping
//! it calls back into `Container::lookup`, so walking the container can
//! hydrate swapped slots and churn the cache exactly as spec §4.G
//! describes. The borrow on `container` is what stands in for the
//! original's raw iterator-to-container back-pointer: it statically
//! prevents a second mutation racing the walk, which the source relied on
//! callers not doing by convention.

use crate::codec::Codec;
use crate::container::Container;
use crate::index::{BTreeIndex, IndexStore};
use std::hash::Hash;
use std::marker::PhantomData;

/// Forward (and, for the sorted variant, backward) iterator over decoded
/// `(key, value)` pairs.
pub struct Iter<'a, K, V, I, C> {
	container: &'a mut Container<K, V, I>,
	keys: Vec<K>,
	front: usize,
	back: usize,
	_codec: PhantomData<C>,
}

impl<'a, K, V, I, C> Iter<'a, K, V, I, C>
where
	K: Clone + Eq + Hash,
	V: Clone,
	I: IndexStore<K, V> + Clone,
	C: Codec<V>,
{
	pub(crate) fn new(container: &'a mut Container<K, V, I>) -> Iter<'a, K, V, I, C> {
		let keys = container.keys();
		let back = keys.len();
		Iter { container, keys, front: 0, back, _codec: PhantomData }
	}
}

impl<'a, K, V, I, C> Iterator for Iter<'a, K, V, I, C>
where
	K: Clone + Eq + Hash,
	V: Clone,
	I: IndexStore<K, V> + Clone,
	C: Codec<V>,
{
	type Item = (K, V);

	fn next(&mut self) -> Option<(K, V)> {
		if self.front >= self.back {
			return None;
		}
		let key = self.keys[self.front].clone();
		self.front += 1;
		let value = self.container.lookup::<C>(&key).ok()?;
		Some((key, value))
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		let remaining = self.back - self.front;
		(remaining, Some(remaining))
	}
}

/// Reverse iteration is only offered for the ordered variant (spec §4.G:
/// "Reverse iteration is supported by the ordered variant"). Expressed as
/// an `impl` gated on `I = BTreeIndex<K, V>` so the restriction is a
/// compile-time fact rather than a runtime panic on the unordered variant.
impl<'a, K, V, C> DoubleEndedIterator for Iter<'a, K, V, BTreeIndex<K, V>, C>
where
	K: Clone + Ord + Hash,
	V: Clone,
	C: Codec<V>,
{
	fn next_back(&mut self) -> Option<(K, V)> {
		if self.front >= self.back {
			return None;
		}
		self.back -= 1;
		let key = self.keys[self.back].clone();
		let value = self.container.lookup::<C>(&key).ok()?;
		Some((key, value))
	}
}

/// Key-only iterator; never touches the file or the resident cache since it
/// walks the already-cloned key snapshot.
pub struct Keys<K> {
	keys: std::vec::IntoIter<K>,
}

impl<K> Keys<K> {
	pub(crate) fn new(keys: Vec<K>) -> Keys<K> {
		Keys { keys: keys.into_iter() }
	}
}

impl<K> Iterator for Keys<K> {
	type Item = K;
	fn next(&mut self) -> Option<K> {
		self.keys.next()
	}
}

/// Value-only iterator, built on `Iter` and discarding the key half of each
/// pair it decodes.
pub struct Values<'a, K, V, I, C>(Iter<'a, K, V, I, C>);

impl<'a, K, V, I, C> Values<'a, K, V, I, C>
where
	K: Clone + Eq + Hash,
	V: Clone,
	I: IndexStore<K, V> + Clone,
	C: Codec<V>,
{
	pub(crate) fn new(container: &'a mut Container<K, V, I>) -> Values<'a, K, V, I, C> {
		Values(Iter::new(container))
	}
}

impl<'a, K, V, I, C> Iterator for Values<'a, K, V, I, C>
where
	K: Clone + Eq + Hash,
	V: Clone,
	I: IndexStore<K, V> + Clone,
	C: Codec<V>,
{
	type Item = V;
	fn next(&mut self) -> Option<V> {
		self.0.next().map(|(_, v)| v)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::error::Result;
	use crate::index::{BTreeIndex, HashIndex};
	use crate::options::Options;
	use std::collections::HashSet;

	struct StringCodec;
	impl Codec<String> for StringCodec {
		fn encode(value: &String) -> Vec<u8> {
			value.as_bytes().to_vec()
		}
		fn decode(bytes: &[u8]) -> Result<String> {
			Ok(String::from_utf8_lossy(bytes).into_owned())
		}
	}

	fn dir() -> tempfile::TempDir {
		env_logger::try_init().ok();
		tempfile::TempDir::new().unwrap()
	}

	fn sorted(dir: &tempfile::TempDir, max_cache: u32) -> Container<i32, String, BTreeIndex<i32, String>> {
		let options = Options { max_cache, compression_level: 0, temp_dir: dir.path().to_path_buf(), file_prefix: "HugeContainerData".into() };
		Container::with_options(options)
	}

	fn unordered(dir: &tempfile::TempDir, max_cache: u32) -> Container<i32, String, HashIndex<i32, String>> {
		let options = Options { max_cache, compression_level: 0, temp_dir: dir.path().to_path_buf(), file_prefix: "HugeContainerData".into() };
		Container::with_options(options)
	}

	#[test]
	fn forward_iteration_is_ascending_for_sorted_variant() {
		let d = dir();
		let mut c = sorted(&d, 1);
		for i in [3, 1, 4, 1, 5, 9].iter().enumerate().map(|(i, &v)| (i as i32, v)) {
			c.insert::<StringCodec>(i.0, format!("v{}", i.1)).unwrap();
		}
		let collected: Vec<(i32, String)> = c.iter::<StringCodec>().collect();
		let keys: Vec<i32> = collected.iter().map(|(k, _)| *k).collect();
		assert_eq!(keys, vec![0, 1, 2, 3, 4, 5]);
	}

	#[test]
	fn reverse_iteration_on_sorted_variant() {
		let d = dir();
		let mut c = sorted(&d, 1);
		for i in 0..5 {
			c.insert::<StringCodec>(i, format!("v{}", i)).unwrap();
		}
		let collected: Vec<i32> = c.iter::<StringCodec>().rev().map(|(k, _)| k).collect();
		assert_eq!(collected, vec![4, 3, 2, 1, 0]);
	}

	#[test]
	fn unordered_iteration_visits_every_key_once() {
		let d = dir();
		let mut c = unordered(&d, 1);
		for i in 0..5 {
			c.insert::<StringCodec>(i, format!("v{}", i)).unwrap();
		}
		let keys: HashSet<i32> = c.iter::<StringCodec>().map(|(k, _)| k).collect();
		assert_eq!(keys, (0..5).collect());
	}

	#[test]
	fn keys_iterator_matches_container_keys() {
		let d = dir();
		let mut c = sorted(&d, 4);
		c.insert::<StringCodec>(1, "a".to_string()).unwrap();
		c.insert::<StringCodec>(2, "b".to_string()).unwrap();
		let via_keys: Vec<i32> = c.keys_iter().collect();
		assert_eq!(via_keys, c.keys());
	}

	#[test]
	fn values_iterator_yields_decoded_values_in_key_order() {
		let d = dir();
		let mut c = sorted(&d, 1);
		for i in 0..3 {
			c.insert::<StringCodec>(i, format!("v{}", i)).unwrap();
		}
		let values: Vec<String> = c.values::<StringCodec>().collect();
		assert_eq!(values, vec!["v0", "v1", "v2"]);
	}
}
