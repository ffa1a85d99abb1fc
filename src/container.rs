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

//! Component F + H: the engine. `Container<K, V, I>` orchestrates the
//! free-space allocator, the scratch file, the resident queue and the
//! primary index behind a copy-on-write handle — the engine type itself
//! *is* the shared pointer, the same way `HugeContainerData` folds its
//! `QExplicitlySharedDataPointer` directly into the engine rather than
//! keeping a separate wrapper type.
//!
//! Mutating operations take `&mut self`: detach may need to replace this
//! handle's own `Rc` with a freshly owned one, and Rust has no way to do
//! that through a shared reference without a second layer of interior
//! mutability this engine does not need. Read-only accessors take `&self`.

use crate::alloc::FreeMap;
use crate::codec::{self, Codec};
use crate::error::Result;
use crate::index::IndexStore;
use crate::options::Options;
use crate::queue::ResidentQueue;
use crate::scratch::ScratchFile;
use crate::slot::{self, Slot, SlotState};
use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

/// Short hex preview of a block's leading bytes for trace logs, the same
/// shape as parity-db's `display::hex` helper around its own key/value
/// tracing.
fn hex_preview(bytes: &[u8]) -> String {
	let n = bytes.len().min(8);
	hex::encode(&bytes[..n])
}

struct Inner<K, V, I> {
	index: I,
	free: FreeMap,
	file: Option<ScratchFile>,
	queue: ResidentQueue<K>,
	options: Options,
	_value: std::marker::PhantomData<V>,
}

/// A disk-backed associative container, generic over its index shape
/// (`BTreeIndex` for sorted, `HashIndex` for unordered). Callers select a
/// `Codec<V>` per call via a type parameter rather than storing one,
/// mirroring how the teacher's `Column`/`ValueTable` take behavior through
/// `Options` rather than baking a strategy into the type.
pub struct Container<K, V, I> {
	inner: Rc<RefCell<Inner<K, V, I>>>,
}

impl<K, V, I> Clone for Container<K, V, I> {
	/// A cheap, shared copy (spec §3 Lifecycle: "copying produces a shared
	/// state with deferred duplication"). The first mutating call on
	/// either handle afterwards forces `detach`.
	fn clone(&self) -> Container<K, V, I> {
		Container { inner: Rc::clone(&self.inner) }
	}
}

impl<K, V, I: Default> Default for Container<K, V, I> {
	fn default() -> Container<K, V, I> {
		Container::with_options(Options::default())
	}
}

impl<K, V, I: Default> Container<K, V, I> {
	pub fn with_options(options: Options) -> Container<K, V, I> {
		let inner = Inner {
			index: I::default(),
			free: FreeMap::default(),
			file: None,
			queue: ResidentQueue::default(),
			options,
			_value: std::marker::PhantomData,
		};
		Container { inner: Rc::new(RefCell::new(inner)) }
	}
}

fn ensure_file<K, V, I>(inner: &mut Inner<K, V, I>) -> Result<()> {
	if inner.file.is_none() {
		inner.file = Some(ScratchFile::create(&inner.options.temp_dir, &inner.options.file_prefix)?);
		log::debug!(target: "huge-container", "scratch file created in {}", inner.options.temp_dir.display());
	}
	Ok(())
}

/// Return the slot handle for `key`, deep-cloning it into a fresh,
/// unshared `Rc` first if it is currently shared with a peer container
/// (component D: "transitioning a slot in one container does not mutate
/// a peer's slot"). Reinserts the owned clone into the index when a copy
/// was made.
fn own_slot<K, V, I>(inner: &mut Inner<K, V, I>, key: &K) -> Slot<V>
where
	K: Clone,
	V: Clone,
	I: IndexStore<K, V>,
{
	let current = inner.index.get(key).expect("own_slot: key must exist").clone();
	let owned = slot::detach_on_write(&current);
	if !Rc::ptr_eq(&current, &owned) {
		inner.index.insert(key.clone(), Rc::clone(&owned));
	}
	owned
}

fn truncate_if_shrunk<K, V, I>(inner: &mut Inner<K, V, I>) {
	let target = inner.free.file_size();
	if let Some(file) = inner.file.as_mut() {
		if target < file.len() {
			if let Err(e) = file.truncate(target) {
				log::warn!(target: "huge-container", "truncate to {} failed: {}", target, e);
			}
		}
	}
}

/// Move the oldest resident key to disk. No-op if the queue is empty.
/// On write failure the key is put back at the head so the next call
/// retries it first (spec §7).
fn spill_one<K, V, I, C>(inner: &mut Inner<K, V, I>) -> Result<()>
where
	K: Clone + Eq + Hash,
	V: Clone,
	I: IndexStore<K, V>,
	C: Codec<V>,
{
	let key = match inner.queue.evict_oldest() {
		Some(k) => k,
		None => return Ok(()),
	};
	let slot = own_slot(inner, &key);
	let value = match &*slot.borrow() {
		SlotState::Resident(v) => v.clone(),
		SlotState::Swapped(_) => unreachable!("resident queue only ever holds resident keys"),
	};
	let bytes = codec::encode::<V, C>(&value, inner.options.compression_level);
	ensure_file(inner)?;
	let offset = inner.free.allocate(bytes.len() as u64);
	let write_result = inner.file.as_mut().expect("just ensured").write(offset, &bytes);
	match write_result {
		Ok(()) => {
			*slot.borrow_mut() = SlotState::Swapped(offset);
			log::trace!(target: "huge-container", "spill: {} bytes ({}...) written at offset {}", bytes.len(), hex_preview(&bytes), offset);
			Ok(())
		}
		Err(e) => {
			inner.free.release(offset);
			inner.queue.push_front(key);
			log::warn!(target: "huge-container", "spill failed, requeued at head: {}", e);
			Err(e)
		}
	}
}

/// Read and decode an already-swapped slot, freeing its on-disk block and
/// installing the decoded value as resident. Spills one entry first if
/// the cache is already at capacity, per §4.E `insertNew`. No-op if the
/// slot is already resident.
fn hydrate<K, V, I, C>(inner: &mut Inner<K, V, I>, key: &K) -> Result<()>
where
	K: Clone + Eq + Hash,
	V: Clone,
	I: IndexStore<K, V>,
	C: Codec<V>,
{
	let slot = own_slot(inner, key);
	let offset = {
		let state = slot.borrow();
		match &*state {
			SlotState::Swapped(o) => *o,
			SlotState::Resident(_) => return Ok(()),
		}
	};
	let len = inner.free.extent_len(offset);
	let bytes = inner.file.as_ref().expect("swapped slot implies an open file").read(offset, len as usize)?;
	let value = codec::decode::<V, C>(&bytes, inner.options.compression_level)?;
	inner.free.release(offset);
	truncate_if_shrunk(inner);
	if inner.queue.len() >= inner.options.max_cache as usize {
		spill_one::<K, V, I, C>(inner)?;
	}
	*slot.borrow_mut() = SlotState::Resident(value);
	inner.queue.insert_new(key.clone());
	log::trace!(target: "huge-container", "hydrate: key restored to resident");
	Ok(())
}

fn decode_slot<K, V, I, C>(inner: &Inner<K, V, I>, key: &K) -> Result<V>
where
	V: Clone,
	I: IndexStore<K, V>,
	C: Codec<V>,
{
	let slot = inner.index.get(key).expect("decode_slot: key must exist");
	let state = slot.borrow();
	match &*state {
		SlotState::Resident(v) => Ok(v.clone()),
		SlotState::Swapped(o) => {
			let len = inner.free.extent_len(*o);
			let file = inner.file.as_ref().expect("swapped implies file");
			let raw = file.read(*o, len as usize)?;
			codec::decode::<V, C>(&raw, inner.options.compression_level)
		}
	}
}

impl<K, V, I: IndexStore<K, V>> Container<K, V, I> {
	pub fn len(&self) -> usize {
		self.inner.borrow().index.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn contains(&self, key: &K) -> bool {
		self.inner.borrow().index.contains_key(key)
	}

	pub fn max_cache(&self) -> u32 {
		self.inner.borrow().options.max_cache
	}

	pub fn compression_level(&self) -> i8 {
		self.inner.borrow().options.compression_level
	}

	pub fn file_size(&self) -> u64 {
		self.inner.borrow().free.file_size()
	}

	pub fn fragmentation(&self) -> f64 {
		self.inner.borrow().free.fragmentation()
	}

	pub fn keys(&self) -> Vec<K>
	where
		K: Clone,
	{
		self.inner.borrow().index.iter_keys()
	}

	pub fn keys_iter(&self) -> crate::iter::Keys<K>
	where
		K: Clone,
	{
		crate::iter::Keys::new(self.keys())
	}

	pub fn first_key(&self) -> Option<K>
	where
		K: Clone,
	{
		self.inner.borrow().index.first_key().cloned()
	}

	pub fn last_key(&self) -> Option<K>
	where
		K: Clone,
	{
		self.inner.borrow().index.last_key().cloned()
	}

	/// Copy-on-write detach (spec §4.H): if another handle shares this
	/// state, clone the index (slot handles shared via `Rc::clone`, their
	/// contents not), free map, queue and options, and duplicate the
	/// scratch file, then make this handle point at the fresh copy.
	fn detach(&mut self) -> Result<()>
	where
		I: Clone,
	{
		if Rc::strong_count(&self.inner) <= 1 {
			return Ok(());
		}
		let cloned = {
			let inner = self.inner.borrow();
			let file = match &inner.file {
				Some(f) => Some(f.duplicate(&inner.options.temp_dir, &inner.options.file_prefix)?),
				None => None,
			};
			Inner {
				index: inner.index.clone(),
				free: inner.free.clone(),
				file,
				queue: inner.queue.clone(),
				options: inner.options.clone(),
				_value: std::marker::PhantomData,
			}
		};
		log::debug!(target: "huge-container", "detach: private copy made, {} bytes", cloned.free.file_size());
		self.inner = Rc::new(RefCell::new(cloned));
		Ok(())
	}
}

impl<K: Clone + Eq + Hash, V: Clone, I: IndexStore<K, V> + Clone> Container<K, V, I> {
	pub fn insert<C: Codec<V>>(&mut self, key: K, value: V) -> Result<()> {
		self.detach()?;
		let mut inner = self.inner.borrow_mut();
		let old_offset = inner.index.get(&key).and_then(|s| s.borrow().swapped_offset());
		if let Some(off) = old_offset {
			inner.free.release(off);
			truncate_if_shrunk(&mut inner);
		}
		inner.index.insert(key.clone(), slot::from_value(value));
		if inner.queue.contains(&key) {
			inner.queue.promote(&key);
		} else {
			if inner.queue.len() >= inner.options.max_cache as usize {
				spill_one::<K, V, I, C>(&mut inner)?;
			}
			inner.queue.insert_new(key);
		}
		Ok(())
	}

	/// Preconditions: `contains(key)` (spec §4.F). Debug-asserted rather
	/// than returned as an error, per the `LogicError` policy in §7.
	pub fn lookup<C: Codec<V>>(&mut self, key: &K) -> Result<V> {
		self.detach()?;
		let mut inner = self.inner.borrow_mut();
		debug_assert!(inner.index.contains_key(key), "lookup: key not present");
		let is_resident = matches!(&*inner.index.get(key).expect("lookup: key not present").borrow(), SlotState::Resident(_));
		if is_resident {
			inner.queue.promote(key);
		} else {
			hydrate::<K, V, I, C>(&mut inner, key)?;
		}
		decode_slot::<K, V, I, C>(&inner, key)
	}

	/// Never mutates residency when `key` is absent (spec §4.F).
	pub fn lookup_or<C: Codec<V>>(&mut self, key: &K, default: V) -> V {
		if !self.contains(key) {
			return default;
		}
		self.lookup::<C>(key).unwrap_or(default)
	}

	/// Subscript-equivalent: inserts `default()` if `key` is absent,
	/// hydrates/promotes it resident, and lets `f` mutate the value in
	/// place before it is re-stored.
	pub fn with_mut<C: Codec<V>, R>(&mut self, key: K, default: impl FnOnce() -> V, f: impl FnOnce(&mut V) -> R) -> Result<R> {
		self.detach()?;
		if !self.contains(&key) {
			self.insert::<C>(key.clone(), default())?;
		}
		let mut inner = self.inner.borrow_mut();
		let is_resident = matches!(&*inner.index.get(&key).expect("just inserted").borrow(), SlotState::Resident(_));
		if is_resident {
			inner.queue.promote(&key);
		} else {
			hydrate::<K, V, I, C>(&mut inner, &key)?;
		}
		let slot = inner.index.get(&key).expect("just hydrated").clone();
		drop(inner);
		let mut state = slot.borrow_mut();
		match &mut *state {
			SlotState::Resident(v) => Ok(f(v)),
			SlotState::Swapped(_) => unreachable!("hydrate just installed Resident"),
		}
	}

	pub fn remove(&mut self, key: &K) -> Result<bool> {
		self.detach()?;
		let mut inner = self.inner.borrow_mut();
		let slot = match inner.index.remove(key) {
			Some(s) => s,
			None => return Ok(false),
		};
		inner.queue.forget(key);
		if let SlotState::Swapped(offset) = &*slot.borrow() {
			inner.free.release(*offset);
			truncate_if_shrunk(&mut inner);
		}
		Ok(true)
	}

	/// `remove` composed with `lookup`-by-value; returns `V::default()`
	/// if absent (spec §4.F).
	pub fn take<C: Codec<V>>(&mut self, key: &K) -> V
	where
		V: Default,
	{
		if !self.contains(key) {
			return V::default();
		}
		let value = self.lookup::<C>(key).unwrap_or_else(|_| V::default());
		if let Err(e) = self.remove(key) {
			log::warn!(target: "huge-container", "take: remove after lookup failed: {}", e);
		}
		value
	}

	pub fn clear(&mut self) -> Result<()> {
		self.detach()?;
		let mut inner = self.inner.borrow_mut();
		if let Some(file) = inner.file.as_mut() {
			if let Err(e) = file.truncate(0) {
				log::warn!(target: "huge-container", "clear: truncate failed: {}", e);
			}
		}
		inner.free.reset();
		inner.index.clear();
		inner.queue.clear();
		log::debug!(target: "huge-container", "clear: container emptied");
		Ok(())
	}

	/// Clamps `n >= 1`, spilling the oldest entries down to the new cap.
	pub fn set_max_cache<C: Codec<V>>(&mut self, n: u32) -> Result<()> {
		let n = Options::clamp_max_cache(n);
		self.detach()?;
		let mut inner = self.inner.borrow_mut();
		while inner.queue.len() > n as usize {
			spill_one::<K, V, I, C>(&mut inner)?;
		}
		inner.options.max_cache = n;
		Ok(())
	}

	/// Rewrites every swapped block through the codec at the new level, the
	/// same traversal `defrag` uses and, per spec §4.F, via the same
	/// all-or-nothing pivot: blocks are recompressed into a fresh file and
	/// free map, and the original is left completely untouched until every
	/// block has been rewritten. On success the new file/free map (and only
	/// then `options.compression_level`) replace the old ones atomically;
	/// on any failure the fresh file is discarded and the container is
	/// exactly as it was — fixing the original's documented bug where a
	/// failed path could still leave the field changed.
	pub fn set_compression_level<C: Codec<V>>(&mut self, level: i8) -> Result<()> {
		Options::validate_compression_level(level)?;
		self.detach()?;
		let mut inner = self.inner.borrow_mut();
		let old_level = inner.options.compression_level;
		let mut new_file = ScratchFile::create(&inner.options.temp_dir, &inner.options.file_prefix)?;
		let mut new_free = FreeMap::default();
		let mut rewritten: Vec<(K, u64)> = Vec::new();
		let swapped_keys: Vec<K> =
			inner.index.iter_keys().into_iter().filter(|k| matches!(&*inner.index.get(k).unwrap().borrow(), SlotState::Swapped(_))).collect();

		let outcome: Result<()> = (|| {
			for key in &swapped_keys {
				let old_offset = match &*inner.index.get(key).unwrap().borrow() {
					SlotState::Swapped(o) => *o,
					SlotState::Resident(_) => continue,
				};
				let len = inner.free.extent_len(old_offset);
				let raw = inner.file.as_ref().expect("swapped implies file").read(old_offset, len as usize)?;
				let decoded_raw = codec::decompress(&raw, old_level)?;
				let recompressed = codec::recompress(&decoded_raw, level);
				let new_offset = new_free.allocate(recompressed.len() as u64);
				new_file.write(new_offset, &recompressed)?;
				rewritten.push((key.clone(), new_offset));
			}
			Ok(())
		})();

		match outcome {
			Ok(()) => {
				for (key, new_offset) in &rewritten {
					let slot = inner.index.get(key).unwrap().clone();
					*slot.borrow_mut() = SlotState::Swapped(*new_offset);
				}
				inner.file = Some(new_file);
				inner.free = new_free;
				inner.options.compression_level = level;
				log::debug!(target: "huge-container", "compression level set to {}", level);
				Ok(())
			}
			Err(e) => {
				log::warn!(target: "huge-container", "set_compression_level aborted, offsets unchanged: {}", e);
				Err(e)
			}
		}
	}

	/// All-or-nothing rewrite of every swapped block into a fresh file
	/// (spec §4.F/§4.J). On any failure, every slot already rewritten is
	/// rolled back to its original offset and the new file is discarded.
	pub fn defrag<C: Codec<V>>(&mut self) -> Result<()> {
		self.detach()?;
		let mut inner = self.inner.borrow_mut();
		let level = inner.options.compression_level;
		let mut new_file = ScratchFile::create(&inner.options.temp_dir, &inner.options.file_prefix)?;
		let mut new_free = FreeMap::default();
		let mut rollback: Vec<(K, u64)> = Vec::new();
		let swapped_keys: Vec<K> =
			inner.index.iter_keys().into_iter().filter(|k| matches!(&*inner.index.get(k).unwrap().borrow(), SlotState::Swapped(_))).collect();

		let outcome: Result<()> = (|| {
			for key in &swapped_keys {
				let old_offset = match &*inner.index.get(key).unwrap().borrow() {
					SlotState::Swapped(o) => *o,
					SlotState::Resident(_) => continue,
				};
				let len = inner.free.extent_len(old_offset);
				let raw = inner.file.as_ref().expect("swapped implies file").read(old_offset, len as usize)?;
				let decoded_raw = codec::decompress(&raw, level)?;
				let recompressed = codec::recompress(&decoded_raw, level);
				let new_offset = new_free.allocate(recompressed.len() as u64);
				new_file.write(new_offset, &recompressed)?;
				rollback.push((key.clone(), old_offset));
				let slot = inner.index.get(key).unwrap().clone();
				*slot.borrow_mut() = SlotState::Swapped(new_offset);
			}
			Ok(())
		})();

		match outcome {
			Ok(()) => {
				log::debug!(target: "huge-container", "defrag: rewrote {} blocks", rollback.len());
				inner.file = Some(new_file);
				inner.free = new_free;
				Ok(())
			}
			Err(e) => {
				for (key, old_offset) in rollback {
					let slot = inner.index.get(&key).unwrap().clone();
					*slot.borrow_mut() = SlotState::Swapped(old_offset);
				}
				log::warn!(target: "huge-container", "defrag aborted, offsets restored: {}", e);
				Err(e)
			}
		}
	}

	/// For each key in `other`: skipped if present in `self` and
	/// `!overwrite`; otherwise copied in via whichever path avoids a
	/// decode (raw block copy when both sides use the same compression
	/// level and `other`'s slot is swapped, decode-then-encode otherwise).
	/// If `self` is empty, `other` is adopted as a shared copy instead
	/// (spec §4.F "assigning `other` is permitted as an optimization").
	pub fn unite<C: Codec<V>>(&mut self, other: &Container<K, V, I>, overwrite: bool) -> Result<bool> {
		if self.is_empty() {
			*self = other.clone();
			return Ok(true);
		}
		self.detach()?;
		let mut inner = self.inner.borrow_mut();
		let other_inner = other.inner.borrow();
		for key in other_inner.index.iter_keys() {
			if inner.index.contains_key(&key) && !overwrite {
				continue;
			}
			let other_slot = other_inner.index.get(&key).expect("key came from iter_keys");
			let same_compression = inner.options.compression_level == other_inner.options.compression_level;
			let other_offset = match &*other_slot.borrow() {
				SlotState::Swapped(o) => Some(*o),
				SlotState::Resident(_) => None,
			};

			if let (Some(offset), true) = (other_offset, same_compression) {
				let len = other_inner.free.extent_len(offset);
				let raw = other_inner.file.as_ref().expect("swapped implies file").read(offset, len as usize)?;
				let old_offset = inner.index.get(&key).and_then(|s| s.borrow().swapped_offset());
				if let Some(off) = old_offset {
					inner.free.release(off);
					truncate_if_shrunk(&mut inner);
				}
				inner.queue.forget(&key);
				ensure_file(&mut inner)?;
				let new_offset = inner.free.allocate(raw.len() as u64);
				inner.file.as_mut().expect("just ensured").write(new_offset, &raw)?;
				inner.index.insert(key.clone(), slot::from_offset(new_offset));
			} else {
				let value = decode_slot::<K, V, I, C>(&other_inner, &key)?;
				let old_offset = inner.index.get(&key).and_then(|s| s.borrow().swapped_offset());
				if let Some(off) = old_offset {
					inner.free.release(off);
					truncate_if_shrunk(&mut inner);
				}
				inner.index.insert(key.clone(), slot::from_value(value));
				if inner.queue.contains(&key) {
					inner.queue.promote(&key);
				} else {
					if inner.queue.len() >= inner.options.max_cache as usize {
						spill_one::<K, V, I, C>(&mut inner)?;
					}
					inner.queue.insert_new(key);
				}
			}
		}
		Ok(true)
	}

	/// Structural equality (spec §4.F): same size, same key set, and
	/// every key's decoded value compares equal. Not `impl PartialEq`
	/// because the value codec is a per-call collaborator, not something
	/// the container stores — see `DESIGN.md`.
	pub fn structural_eq<C: Codec<V>>(&self, other: &Container<K, V, I>) -> bool
	where
		V: PartialEq,
	{
		if self.len() != other.len() {
			return false;
		}
		let self_inner = self.inner.borrow();
		let other_inner = other.inner.borrow();
		for key in self_inner.index.iter_keys() {
			if !other_inner.index.contains_key(&key) {
				return false;
			}
			let a = decode_slot::<K, V, I, C>(&self_inner, &key);
			let b = decode_slot::<K, V, I, C>(&other_inner, &key);
			match (a, b) {
				(Ok(a), Ok(b)) if a == b => continue,
				_ => return false,
			}
		}
		true
	}

	/// Forward (and, for the sorted variant, reverse) iterator over
	/// decoded pairs; dereferencing advances through `lookup`, so walking
	/// it hydrates and evicts exactly as a direct `lookup` call would
	/// (spec §4.G).
	pub fn iter<C: Codec<V>>(&mut self) -> crate::iter::Iter<'_, K, V, I, C> {
		crate::iter::Iter::new(self)
	}

	pub fn values<C: Codec<V>>(&mut self) -> crate::iter::Values<'_, K, V, I, C> {
		crate::iter::Values::new(self)
	}

	/// `find`: looks up `key`, returning `None` without touching residency
	/// when absent (mirrors `constFind`/`find` returning `end()`).
	pub fn find<C: Codec<V>>(&mut self, key: &K) -> Option<V> {
		if !self.contains(key) {
			return None;
		}
		self.lookup::<C>(key).ok()
	}

	pub fn first<C: Codec<V>>(&mut self) -> Option<(K, V)> {
		let key = self.first_key()?;
		let value = self.lookup::<C>(&key).ok()?;
		Some((key, value))
	}

	pub fn last<C: Codec<V>>(&mut self) -> Option<(K, V)> {
		let key = self.last_key()?;
		let value = self.lookup::<C>(&key).ok()?;
		Some((key, value))
	}

	/// Snapshot into a plain in-memory `HashMap`, decoding every value
	/// (component G: "conversions to plain in-memory maps").
	pub fn to_hashmap<C: Codec<V>>(&mut self) -> Result<std::collections::HashMap<K, V>> {
		let keys = self.keys();
		let mut out = std::collections::HashMap::with_capacity(keys.len());
		for key in keys {
			let value = self.lookup::<C>(&key)?;
			out.insert(key, value);
		}
		Ok(out)
	}
}

impl<K: Clone + Ord + Eq + Hash, V: Clone, I: IndexStore<K, V> + Clone> Container<K, V, I> {
	/// Snapshot into a plain in-memory `BTreeMap`, ascending by key.
	/// Requires `K: Ord` regardless of index flavor (it's the *output*
	/// collection, not the index, that is sorted here).
	pub fn to_btreemap<C: Codec<V>>(&mut self) -> Result<std::collections::BTreeMap<K, V>> {
		let keys = self.keys();
		let mut out = std::collections::BTreeMap::new();
		for key in keys {
			let value = self.lookup::<C>(&key)?;
			out.insert(key, value);
		}
		Ok(out)
	}
}

impl<K: Clone + Ord + Eq + Hash, V: Clone> Container<K, V, crate::index::BTreeIndex<K, V>> {
	/// `erase(it) -> next` for the ordered variant (spec §4.G/§9: erasing
	/// invalidates only the erased position, and the façade hands back the
	/// iterator to the successor). `key`'s removal cannot change the
	/// relative order of any other key, so the successor is captured
	/// before the removal takes effect.
	pub fn erase(&mut self, key: &K) -> Result<Option<K>> {
		let next_key = self.inner.borrow().index.iter_keys().into_iter().find(|k| k > key);
		self.remove(key)?;
		Ok(next_key)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::index::BTreeIndex;

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

	fn container_with_cache(dir: &tempfile::TempDir, max_cache: u32) -> Container<i32, String, BTreeIndex<i32, String>> {
		let options = Options { max_cache, compression_level: 0, temp_dir: dir.path().to_path_buf(), file_prefix: "HugeContainerData".into() };
		Container::with_options(options)
	}

	fn random_ascii(size: usize) -> String {
		use rand::Rng;
		rand::thread_rng().sample_iter(rand::distributions::Alphanumeric).take(size).map(char::from).collect()
	}

	#[test]
	fn fifo_spill_on_single_slot_cache() {
		let d = dir();
		let mut c = container_with_cache(&d, 1);
		for i in 0..4 {
			c.insert::<StringCodec>(i, format!("{}", i)).unwrap();
		}
		assert_eq!(c.len(), 4);
		assert_eq!(c.file_size(), 3); // "0","1","2" each one byte, "3" stays resident
	}

	#[test]
	fn lookup_hydrates_and_promotes() {
		let d = dir();
		let mut c = container_with_cache(&d, 1);
		for i in 0..4 {
			c.insert::<StringCodec>(i, format!("{}", i)).unwrap();
		}
		let v = c.lookup::<StringCodec>(&0).unwrap();
		assert_eq!(v, "0");
	}

	#[test]
	fn remove_absent_key_returns_false() {
		let d = dir();
		let mut c: Container<i32, String, BTreeIndex<i32, String>> = container_with_cache(&d, 4);
		assert!(!c.remove(&99).unwrap());
	}

	#[test]
	fn remove_truncates_trailing_extent() {
		let d = dir();
		let mut c = container_with_cache(&d, 1);
		c.insert::<StringCodec>(0, "aaaaaaaaaa".to_string()).unwrap(); // 10 bytes, becomes swapped on next insert
		c.insert::<StringCodec>(1, "b".to_string()).unwrap();
		assert_eq!(c.file_size(), 10);
		c.remove(&0).unwrap();
		assert_eq!(c.file_size(), 0);
	}

	#[test]
	fn clear_empties_and_truncates() {
		let d = dir();
		let mut c = container_with_cache(&d, 1);
		for i in 0..5 {
			c.insert::<StringCodec>(i, format!("value{}", i)).unwrap();
		}
		c.clear().unwrap();
		assert!(c.is_empty());
		assert_eq!(c.file_size(), 0);
	}

	#[test]
	fn cow_independence_on_insert() {
		let d = dir();
		let mut a = container_with_cache(&d, 4);
		a.insert::<StringCodec>(0, "a".to_string()).unwrap();
		a.insert::<StringCodec>(1, "b".to_string()).unwrap();
		let mut b = a.clone();
		b.insert::<StringCodec>(2, "c".to_string()).unwrap();
		assert_eq!(a.len(), 2);
		assert!(!a.contains(&2));
		assert_eq!(b.len(), 3);
	}

	#[test]
	fn take_removes_and_returns_value() {
		let d = dir();
		let mut c = container_with_cache(&d, 4);
		c.insert::<StringCodec>(0, "x".to_string()).unwrap();
		let v = c.take::<StringCodec>(&0);
		assert_eq!(v, "x");
		assert!(!c.contains(&0));
		assert_eq!(c.take::<StringCodec>(&0), String::default());
	}

	#[test]
	fn defrag_round_trip_after_removals() {
		let d = dir();
		let mut c = container_with_cache(&d, 1);
		for i in 0..10 {
			c.insert::<StringCodec>(i, format!("v_{}", i)).unwrap();
		}
		for k in [1, 3, 5, 7] {
			c.remove(&k).unwrap();
		}
		assert!(c.fragmentation() > 0.0);
		c.defrag::<StringCodec>().unwrap();
		assert_eq!(c.fragmentation(), 0.0);
		for k in [0, 2, 4, 6, 8, 9] {
			assert_eq!(c.lookup::<StringCodec>(&k).unwrap(), format!("v_{}", k));
		}
	}

	#[test]
	fn set_compression_level_rewrites_swapped_blocks() {
		let d = dir();
		let mut c = container_with_cache(&d, 1);
		for i in 0..5 {
			c.insert::<StringCodec>(i, "x".repeat(256)).unwrap();
		}
		c.set_compression_level::<StringCodec>(6).unwrap();
		assert_eq!(c.compression_level(), 6);
		for i in 0..4 {
			assert_eq!(c.lookup::<StringCodec>(&i).unwrap(), "x".repeat(256));
		}
	}

	#[test]
	fn round_trips_random_values_under_compression() {
		let d = dir();
		let options =
			Options { max_cache: 2, compression_level: 9, temp_dir: d.path().to_path_buf(), file_prefix: "HugeContainerData".into() };
		let mut c: Container<i32, String, BTreeIndex<i32, String>> = Container::with_options(options);
		let values: Vec<String> = (0..20).map(|i| random_ascii(64 + i as usize)).collect();
		for (i, v) in values.iter().enumerate() {
			c.insert::<StringCodec>(i as i32, v.clone()).unwrap();
		}
		for (i, v) in values.iter().enumerate() {
			assert_eq!(&c.lookup::<StringCodec>(&(i as i32)).unwrap(), v);
		}
	}

	#[test]
	fn structural_eq_compares_decoded_values() {
		let d = dir();
		let mut a = container_with_cache(&d, 1);
		a.insert::<StringCodec>(0, "a".to_string()).unwrap();
		a.insert::<StringCodec>(1, "b".to_string()).unwrap();
		let mut b = container_with_cache(&d, 4);
		b.insert::<StringCodec>(0, "a".to_string()).unwrap();
		b.insert::<StringCodec>(1, "b".to_string()).unwrap();
		assert!(a.structural_eq::<StringCodec>(&b));
		b.insert::<StringCodec>(1, "different".to_string()).unwrap();
		assert!(!a.structural_eq::<StringCodec>(&b));
	}

	#[test]
	fn first_and_last_reflect_key_order() {
		let d = dir();
		let mut c = container_with_cache(&d, 4);
		c.insert::<StringCodec>(3, "c".to_string()).unwrap();
		c.insert::<StringCodec>(1, "a".to_string()).unwrap();
		c.insert::<StringCodec>(2, "b".to_string()).unwrap();
		assert_eq!(c.first::<StringCodec>(), Some((1, "a".to_string())));
		assert_eq!(c.last::<StringCodec>(), Some((3, "c".to_string())));
	}

	#[test]
	fn find_returns_none_without_mutating_residency() {
		let d = dir();
		let mut c = container_with_cache(&d, 1);
		c.insert::<StringCodec>(0, "a".to_string()).unwrap();
		c.insert::<StringCodec>(1, "b".to_string()).unwrap();
		assert_eq!(c.find::<StringCodec>(&99), None);
		// key 0 should still be swapped: find on a present key does hydrate.
		assert_eq!(c.find::<StringCodec>(&0), Some("a".to_string()));
	}

	#[test]
	fn erase_returns_successor_key() {
		let d = dir();
		let mut c = container_with_cache(&d, 4);
		for i in 0..4 {
			c.insert::<StringCodec>(i, format!("v{}", i)).unwrap();
		}
		assert_eq!(c.erase(&1).unwrap(), Some(2));
		assert!(!c.contains(&1));
		assert_eq!(c.erase(&3).unwrap(), None);
	}

	#[test]
	fn to_btreemap_and_to_hashmap_decode_every_value() {
		let d = dir();
		let mut c = container_with_cache(&d, 1);
		for i in 0..3 {
			c.insert::<StringCodec>(i, format!("v{}", i)).unwrap();
		}
		let map = c.to_btreemap::<StringCodec>().unwrap();
		assert_eq!(map.len(), 3);
		assert_eq!(map.get(&0), Some(&"v0".to_string()));
		let hmap = c.to_hashmap::<StringCodec>().unwrap();
		assert_eq!(hmap.len(), 3);
	}
}
