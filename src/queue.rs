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

//! Component E: the bounded FIFO of resident keys. Every read or write
//! that touches a key's value promotes it to the back; once the queue
//! holds more than `max_cache` keys the front is evicted (swapped out).

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct ResidentQueue<K> {
	order: VecDeque<K>,
	present: HashSet<K>,
}

impl<K: Eq + Hash + Clone> Default for ResidentQueue<K> {
	fn default() -> ResidentQueue<K> {
		ResidentQueue { order: VecDeque::new(), present: HashSet::new() }
	}
}

impl<K: Eq + Hash + Clone> ResidentQueue<K> {
	pub fn len(&self) -> usize {
		self.order.len()
	}

	pub fn contains(&self, key: &K) -> bool {
		self.present.contains(key)
	}

	/// Insert a freshly-resident key at the back. The caller must not
	/// already hold it resident.
	pub fn insert_new(&mut self, key: K) {
		debug_assert!(!self.present.contains(&key), "key already resident");
		self.present.insert(key.clone());
		self.order.push_back(key);
	}

	/// Move an already-resident key to the back, marking it most recently
	/// used. No-op if the key is not present.
	pub fn promote(&mut self, key: &K) {
		if !self.present.contains(key) {
			return;
		}
		if let Some(pos) = self.order.iter().position(|k| k == key) {
			let k = self.order.remove(pos).expect("position came from iter");
			self.order.push_back(k);
		}
	}

	/// Put a key back at the head after a failed eviction, so the next
	/// call retries it first (spec §7: eviction failures requeue at head).
	pub fn push_front(&mut self, key: K) {
		debug_assert!(!self.present.contains(&key), "key already resident");
		self.present.insert(key.clone());
		self.order.push_front(key);
	}

	/// Drop a key from the queue without it counting as an eviction
	/// (caller is removing the entry entirely).
	pub fn forget(&mut self, key: &K) {
		if self.present.remove(key) {
			if let Some(pos) = self.order.iter().position(|k| k == key) {
				self.order.remove(pos);
			}
		}
	}

	/// Pop the oldest resident key so its value can be swapped to disk.
	pub fn evict_oldest(&mut self) -> Option<K> {
		let key = self.order.pop_front()?;
		self.present.remove(&key);
		Some(key)
	}

	pub fn clear(&mut self) {
		self.order.clear();
		self.present.clear();
	}
}

#[cfg(test)]
mod test {
	use super::ResidentQueue;

	#[test]
	fn fifo_order_preserved() {
		let mut q = ResidentQueue::default();
		q.insert_new(1);
		q.insert_new(2);
		q.insert_new(3);
		assert_eq!(q.evict_oldest(), Some(1));
		assert_eq!(q.evict_oldest(), Some(2));
		assert_eq!(q.len(), 1);
	}

	#[test]
	fn promote_moves_to_back() {
		let mut q = ResidentQueue::default();
		q.insert_new(1);
		q.insert_new(2);
		q.insert_new(3);
		q.promote(&1);
		assert_eq!(q.evict_oldest(), Some(2));
		assert_eq!(q.evict_oldest(), Some(3));
		assert_eq!(q.evict_oldest(), Some(1));
	}

	#[test]
	fn forget_removes_without_counting_as_eviction() {
		let mut q = ResidentQueue::default();
		q.insert_new(1);
		q.insert_new(2);
		q.forget(&1);
		assert!(!q.contains(&1));
		assert_eq!(q.len(), 1);
		assert_eq!(q.evict_oldest(), Some(2));
	}
}
