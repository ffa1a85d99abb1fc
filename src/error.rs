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

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure modes surfaced by the storage engine. `LogicError`/`OutOfRange`
/// conditions that are contract violations rather than environment failures
/// are not represented here; they are `debug_assert!`s at the call site.
#[derive(Debug)]
pub enum Error {
	/// Scratch-file I/O failed (read, write or truncate).
	Io(std::io::ErrorKind, String),
	/// The caller-supplied decoder rejected a stored block.
	Decode(String),
	/// A configuration value was outside its accepted range.
	OutOfRange(&'static str),
}

impl fmt::Display for Error {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Error::Io(kind, msg) => write!(f, "scratch file I/O error ({:?}): {}", kind, msg),
			Error::Decode(msg) => write!(f, "value decode error: {}", msg),
			Error::OutOfRange(what) => write!(f, "value out of range: {}", what),
		}
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Error {
		Error::Io(e.kind(), e.to_string())
	}
}
