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

//! A disk-backed associative container for key/value pairs whose combined
//! values exceed comfortable RAM residency. At most `max_cache` decoded
//! values are held in memory at a time; the rest live as serialized,
//! optionally compressed blocks in a private scratch file that is created
//! lazily and removed when the container is dropped.
//!
//! Two type aliases expose the same engine under the two public shapes
//! described by the component design: [`HugeMap`] iterates in ascending
//! key order, [`HugeHash`] offers amortized O(1) lookup with unspecified
//! iteration order. Both are [`Container`] instantiated over one of the two
//! [`IndexStore`] implementations in [`index`].
//!
//! Callers supply the byte-level encoding of their value type (and, for
//! [`stream::write`]/[`stream::read`], their key type) through the
//! [`Codec`] trait; this crate never inspects value bytes beyond handing
//! them to the optional zlib compression layer.
//!
//! ```
//! use huge_container::{Codec, HugeMap, Result};
//!
//! struct Utf8;
//! impl Codec<String> for Utf8 {
//!     fn encode(value: &String) -> Vec<u8> {
//!         value.as_bytes().to_vec()
//!     }
//!     fn decode(bytes: &[u8]) -> Result<String> {
//!         Ok(String::from_utf8_lossy(bytes).into_owned())
//!     }
//! }
//!
//! let mut map: HugeMap<u32, String> = HugeMap::default();
//! map.insert::<Utf8>(1, "hello".to_string()).unwrap();
//! assert_eq!(map.lookup::<Utf8>(&1).unwrap(), "hello");
//! ```

pub mod alloc;
pub mod codec;
pub mod container;
pub mod error;
pub mod index;
pub mod iter;
pub mod options;
pub mod queue;
pub mod scratch;
pub mod slot;
pub mod stream;

pub use codec::Codec;
pub use container::Container;
pub use error::{Error, Result};
pub use index::{BTreeIndex, HashIndex, IndexStore};
pub use options::Options;
pub use scratch::cleanup;

/// Sorted disk-backed map: iteration visits keys in ascending order and
/// supports reverse iteration.
pub type HugeMap<K, V> = Container<K, V, BTreeIndex<K, V>>;

/// Unordered disk-backed map: amortized O(1) lookup, unspecified iteration
/// order, no reverse iteration.
pub type HugeHash<K, V> = Container<K, V, HashIndex<K, V>>;
