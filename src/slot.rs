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

//! Component D: the per-key slot. A value is either held in RAM
//! (`Resident`) or has been written out to the scratch file and is
//! addressed by `Swapped(offset)` — the block's length is not stored here,
//! it falls out of the free map's own boundary bookkeeping (the extent
//! starting at `offset` runs to the next free-map key).

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug)]
pub enum SlotState<V> {
	Resident(V),
	Swapped(u64),
}

/// Shared, detach-on-write handle (spec §3/§4.D). `Container::detach`
/// clones this handle cheaply (`Rc::clone`) as part of its shallow index
/// copy; only an individual mutation that finds the handle shared
/// (`Rc::strong_count > 1`) deep-copies the `SlotState` before writing.
pub type Slot<V> = Rc<RefCell<SlotState<V>>>;

pub fn from_value<V>(value: V) -> Slot<V> {
	Rc::new(RefCell::new(SlotState::Resident(value)))
}

pub fn from_offset<V>(offset: u64) -> Slot<V> {
	Rc::new(RefCell::new(SlotState::Swapped(offset)))
}

/// Deep-clone a slot's state into a brand new, unshared handle.
pub fn deep_clone<V: Clone>(slot: &Slot<V>) -> Slot<V> {
	let state = match &*slot.borrow() {
		SlotState::Resident(v) => SlotState::Resident(v.clone()),
		SlotState::Swapped(o) => SlotState::Swapped(*o),
	};
	Rc::new(RefCell::new(state))
}

/// If `slot` is shared with a peer container, replace it in place with a
/// freshly owned deep copy so the caller can mutate it without disturbing
/// that peer. Returns the (possibly new) handle to operate on.
pub fn detach_on_write<V: Clone>(slot: &Slot<V>) -> Slot<V> {
	if Rc::strong_count(slot) > 1 {
		deep_clone(slot)
	} else {
		Rc::clone(slot)
	}
}

impl<V> SlotState<V> {
	pub fn is_resident(&self) -> bool {
		matches!(self, SlotState::Resident(_))
	}

	pub fn swapped_offset(&self) -> Option<u64> {
		match self {
			SlotState::Swapped(o) => Some(*o),
			SlotState::Resident(_) => None,
		}
	}
}
