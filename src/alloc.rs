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

//! Component A: the free-space allocator. Tracks used/free extents over a
//! single growing file as an ordered offset -> free? map, first-fit,
//! coalescing on release.

use std::collections::BTreeMap;

/// Canonical free-space map: no two adjacent *free* extents go unmerged,
/// and the last entry's offset equals the current file size. Two adjacent
/// *used* boundaries are expected and harmless — each marks the start of a
/// distinct live block and must survive independently so that block can
/// later be released by its own offset; only free runs are coalesced,
/// since nothing needs to find the boundary between two neighbouring used
/// blocks.
#[derive(Debug, Clone)]
pub struct FreeMap {
	entries: BTreeMap<u64, bool>,
}

impl Default for FreeMap {
	fn default() -> FreeMap {
		let mut entries = BTreeMap::new();
		entries.insert(0, true);
		FreeMap { entries }
	}
}

impl FreeMap {
	/// Current logical file size: the offset of the trailing entry.
	pub fn file_size(&self) -> u64 {
		*self.entries.keys().next_back().expect("map is never empty")
	}

	/// Length in bytes of the used extent starting at `offset`, i.e. the
	/// block size an earlier `allocate` call returned this same offset
	/// for. The free map never stores block lengths directly; this is
	/// exactly the gap to the next recorded boundary.
	pub fn extent_len(&self, offset: u64) -> u64 {
		let next = self.next_after(offset).map(|(o, _)| o).unwrap_or_else(|| self.file_size());
		next - offset
	}

	fn next_after(&self, offset: u64) -> Option<(u64, bool)> {
		self.entries
			.range((std::ops::Bound::Excluded(offset), std::ops::Bound::Unbounded))
			.next()
			.map(|(&o, &f)| (o, f))
	}

	/// First-fit allocation of `size` bytes. Returns the offset the block
	/// should be written at.
	pub fn allocate(&mut self, size: u64) -> u64 {
		debug_assert!(size > 0);
		let offsets: Vec<u64> = self.entries.keys().copied().collect();
		for window in offsets.windows(2) {
			let (o, next_o) = (window[0], window[1]);
			if !self.entries[&o] {
				continue;
			}
			let extent = next_o - o;
			if extent == size {
				// Exact fit: flip this hole to used. `next_o` stays in the
				// map untouched — it already marks the start of whatever
				// comes after, free or used, and must remain addressable.
				self.entries.insert(o, false);
				return o;
			}
			if extent > size {
				self.entries.insert(o, false);
				self.entries.insert(o + size, true);
				return o;
			}
		}
		// No interior extent fits: grow the tail.
		let tail = *offsets.last().expect("map is never empty");
		debug_assert!(self.entries[&tail], "trailing entry must be free");
		self.entries.insert(tail, false);
		self.entries.insert(tail + size, true);
		tail
	}

	/// Release the extent starting at `offset`, coalescing with free
	/// neighbours and truncating the tail if it becomes free.
	pub fn release(&mut self, offset: u64) {
		debug_assert_eq!(self.entries.get(&offset), Some(&false), "release of a non-used offset");

		let prev_free = self
			.entries
			.range(..offset)
			.next_back()
			.map(|(_, &f)| f)
			.unwrap_or(false);

		if prev_free {
			// Merge `offset` into the predecessor's free run.
			self.entries.remove(&offset);
		} else {
			self.entries.insert(offset, true);
		}

		// Merge forward if the following entry is also free. When that
		// entry was the trailing boundary, its removal makes the merged
		// free run (starting at `offset`, or the predecessor it was folded
		// into) the new trailing boundary, i.e. the file end moves back and
		// the caller truncates to `file_size()` accordingly.
		if let Some((next_o, true)) = self.next_after(offset) {
			self.entries.remove(&next_o);
		}

		debug_assert!(self.is_canonical(), "two adjacent free extents went unmerged");
	}

	/// `sum(length of free extents except the trailing one) / offset of
	/// last entry`, or 0 when there is at most one entry (spec §4.F).
	pub fn fragmentation(&self) -> f64 {
		if self.entries.len() <= 1 {
			return 0.0;
		}
		let last = self.file_size();
		let offsets: Vec<u64> = self.entries.keys().copied().collect();
		let mut free_bytes = 0u64;
		for window in offsets.windows(2) {
			let (o, next_o) = (window[0], window[1]);
			if self.entries[&o] {
				free_bytes += next_o - o;
			}
		}
		free_bytes as f64 / last as f64
	}

	pub fn reset(&mut self) {
		self.entries.clear();
		self.entries.insert(0, true);
	}

	/// Debug invariant helper: true iff no two adjacent entries are both
	/// free (used-used adjacency is expected and not a defect — see the
	/// type doc comment).
	fn is_canonical(&self) -> bool {
		let offsets: Vec<u64> = self.entries.keys().copied().collect();
		for window in offsets.windows(2) {
			if self.entries[&window[0]] && self.entries[&window[1]] {
				return false;
			}
		}
		true
	}
}

#[cfg(test)]
mod test {
	use super::FreeMap;

	#[test]
	fn fresh_map_is_empty_file() {
		let m = FreeMap::default();
		assert_eq!(m.file_size(), 0);
		assert_eq!(m.fragmentation(), 0.0);
	}

	#[test]
	fn allocate_grows_tail_when_empty() {
		let mut m = FreeMap::default();
		let o1 = m.allocate(10);
		assert_eq!(o1, 0);
		assert_eq!(m.file_size(), 10);
		let o2 = m.allocate(20);
		assert_eq!(o2, 10);
		assert_eq!(m.file_size(), 30);
		assert!(m.is_canonical());
	}

	#[test]
	fn release_coalesces_interior_hole() {
		let mut m = FreeMap::default();
		let sizes = [10u64, 20, 30, 40, 50];
		let offsets: Vec<u64> = sizes.iter().map(|&s| m.allocate(s)).collect();
		// offsets: 0, 10, 30, 60, 100 ; file size 150
		assert_eq!(offsets, vec![0, 10, 30, 60, 100]);

		m.release(offsets[1]); // free [10,30)
		m.release(offsets[2]); // free [30,60) -> should coalesce with prior into [10,60)
		assert!(m.is_canonical());
		assert_eq!(m.entries.get(&10), Some(&true));
		assert_eq!(m.entries.get(&60), Some(&false));
	}

	#[test]
	fn release_truncates_trailing_free_extent() {
		let mut m = FreeMap::default();
		let sizes = [10u64, 20, 30, 40, 50];
		let offsets: Vec<u64> = sizes.iter().map(|&s| m.allocate(s)).collect();
		assert_eq!(m.file_size(), 150);

		m.release(offsets[4]); // release the last (size 50) extent
		assert_eq!(m.file_size(), 100);
		assert!(m.is_canonical());
	}

	#[test]
	fn release_everything_truncates_to_zero() {
		let mut m = FreeMap::default();
		let o = m.allocate(42);
		m.release(o);
		assert_eq!(m.file_size(), 0);
		assert_eq!(m.fragmentation(), 0.0);
	}

	#[test]
	fn first_fit_reuses_exact_hole_before_growing_tail() {
		let mut m = FreeMap::default();
		let a = m.allocate(10);
		let b = m.allocate(10);
		let _c = m.allocate(10);
		m.release(a);
		m.release(b);
		// one coalesced free extent of size 20 at offset 0
		let reused = m.allocate(20);
		assert_eq!(reused, 0);
		assert_eq!(m.file_size(), 30);
	}
}
