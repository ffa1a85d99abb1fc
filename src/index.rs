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

//! The primary index: a mapping from key to slot handle, generic over
//! ordering. `BTreeIndex` is the sorted variant (ascending-key iteration,
//! reversible); `HashIndex` is the unordered variant (amortized O(1)
//! lookup, unspecified iteration order). This type parameter is the Rust
//! rendering of the single sorted/unsorted choice a caller makes when
//! picking a container flavor — expressed at compile time rather than as
//! a runtime flag, the same way parity-db parametrizes its tables
//! generically over column shape instead of branching on a bool.

use crate::slot::Slot;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

pub trait IndexStore<K, V>: Default {
	const SORTED: bool;

	fn insert(&mut self, key: K, slot: Slot<V>) -> Option<Slot<V>>;
	fn remove(&mut self, key: &K) -> Option<Slot<V>>;
	fn get(&self, key: &K) -> Option<&Slot<V>>;
	fn get_mut(&mut self, key: &K) -> Option<&mut Slot<V>>;
	fn contains_key(&self, key: &K) -> bool;
	fn len(&self) -> usize;
	fn clear(&mut self);
	/// Snapshot of keys in the store's public iteration order. Needed
	/// (rather than a borrowing iterator) because callers walk this list
	/// while calling back into the container to hydrate/evict, which
	/// would otherwise conflict with an index borrow.
	fn iter_keys(&self) -> Vec<K>;
	fn first_key(&self) -> Option<&K>;
	fn last_key(&self) -> Option<&K>;
}

#[derive(Debug, Clone)]
pub struct BTreeIndex<K, V>(BTreeMap<K, Slot<V>>);

impl<K: Ord, V> Default for BTreeIndex<K, V> {
	fn default() -> BTreeIndex<K, V> {
		BTreeIndex(BTreeMap::new())
	}
}

impl<K: Ord + Clone, V> IndexStore<K, V> for BTreeIndex<K, V> {
	const SORTED: bool = true;

	fn insert(&mut self, key: K, slot: Slot<V>) -> Option<Slot<V>> {
		self.0.insert(key, slot)
	}
	fn remove(&mut self, key: &K) -> Option<Slot<V>> {
		self.0.remove(key)
	}
	fn get(&self, key: &K) -> Option<&Slot<V>> {
		self.0.get(key)
	}
	fn get_mut(&mut self, key: &K) -> Option<&mut Slot<V>> {
		self.0.get_mut(key)
	}
	fn contains_key(&self, key: &K) -> bool {
		self.0.contains_key(key)
	}
	fn len(&self) -> usize {
		self.0.len()
	}
	fn clear(&mut self) {
		self.0.clear()
	}
	fn iter_keys(&self) -> Vec<K> {
		self.0.keys().cloned().collect()
	}
	fn first_key(&self) -> Option<&K> {
		self.0.keys().next()
	}
	fn last_key(&self) -> Option<&K> {
		self.0.keys().next_back()
	}
}

impl<K, V> BTreeIndex<K, V> {
	/// Used by the container's `detach`: clones key/handle pairs, not the
	/// values behind `Resident` handles.
	pub fn shallow_clone(&self) -> BTreeIndex<K, V>
	where
		K: Ord + Clone,
	{
		BTreeIndex(self.0.iter().map(|(k, v)| (k.clone(), std::rc::Rc::clone(v))).collect())
	}
}

#[derive(Debug, Clone)]
pub struct HashIndex<K, V>(HashMap<K, Slot<V>>);

impl<K: Hash + Eq, V> Default for HashIndex<K, V> {
	fn default() -> HashIndex<K, V> {
		HashIndex(HashMap::new())
	}
}

impl<K: Hash + Eq + Clone, V> IndexStore<K, V> for HashIndex<K, V> {
	const SORTED: bool = false;

	fn insert(&mut self, key: K, slot: Slot<V>) -> Option<Slot<V>> {
		self.0.insert(key, slot)
	}
	fn remove(&mut self, key: &K) -> Option<Slot<V>> {
		self.0.remove(key)
	}
	fn get(&self, key: &K) -> Option<&Slot<V>> {
		self.0.get(key)
	}
	fn get_mut(&mut self, key: &K) -> Option<&mut Slot<V>> {
		self.0.get_mut(key)
	}
	fn contains_key(&self, key: &K) -> bool {
		self.0.contains_key(key)
	}
	fn len(&self) -> usize {
		self.0.len()
	}
	fn clear(&mut self) {
		self.0.clear()
	}
	fn iter_keys(&self) -> Vec<K> {
		self.0.keys().cloned().collect()
	}
	fn first_key(&self) -> Option<&K> {
		self.0.keys().next()
	}
	fn last_key(&self) -> Option<&K> {
		// Unordered: "first" and "last" are whatever the backing map's
		// iterator yields first/last, per spec's "unspecified order".
		self.0.keys().last()
	}
}

impl<K, V> HashIndex<K, V> {
	pub fn shallow_clone(&self) -> HashIndex<K, V>
	where
		K: Hash + Eq + Clone,
	{
		HashIndex(self.0.iter().map(|(k, v)| (k.clone(), std::rc::Rc::clone(v))).collect())
	}
}
