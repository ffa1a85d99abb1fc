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

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Recognized configuration surface (spec §6).
#[derive(Debug, Clone)]
pub struct Options {
	/// Maximum number of resident (decoded) values. Clamped to >= 1.
	pub max_cache: u32,
	/// zlib compression level: -1 default, 0 off, 1..=9 fast..best.
	pub compression_level: i8,
	/// Directory the scratch file is created in.
	pub temp_dir: PathBuf,
	/// Fixed naming prefix used by `cleanup()` to find orphaned files.
	pub file_prefix: String,
}

impl Default for Options {
	fn default() -> Options {
		Options {
			max_cache: 1,
			compression_level: 0,
			temp_dir: std::env::temp_dir(),
			file_prefix: "HugeContainerData".into(),
		}
	}
}

impl Options {
	pub fn validate_compression_level(level: i8) -> Result<()> {
		if level < -1 || level > 9 {
			return Err(Error::OutOfRange("compression_level must be in -1..=9"));
		}
		Ok(())
	}

	pub fn clamp_max_cache(val: u32) -> u32 {
		std::cmp::max(1, val)
	}
}
