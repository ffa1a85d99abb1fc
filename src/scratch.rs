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

//! Component C: the private scratch file that backs swapped-out values.
//! One file per container instance, created on first use and removed on
//! drop; never a stable on-disk format, just an allocation arena addressed
//! by the offsets `FreeMap` hands out.

use crate::error::Result;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

const DUPLICATE_CHUNK: usize = 4096;

pub struct ScratchFile {
	file: tempfile::NamedTempFile,
	len: u64,
}

impl ScratchFile {
	pub fn create(temp_dir: &Path, file_prefix: &str) -> Result<ScratchFile> {
		let file = tempfile::Builder::new().prefix(file_prefix).tempfile_in(temp_dir)?;
		Ok(ScratchFile { file, len: 0 })
	}

	pub fn len(&self) -> u64 {
		self.len
	}

	#[cfg(unix)]
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
		use std::os::unix::fs::FileExt;
		Ok(self.file.as_file().read_exact_at(buf, offset)?)
	}

	#[cfg(unix)]
	fn write_at(&self, buf: &[u8], offset: u64) -> Result<()> {
		use std::os::unix::fs::FileExt;
		Ok(self.file.as_file().write_all_at(buf, offset)?)
	}

	#[cfg(windows)]
	fn read_at(&self, buf: &mut [u8], offset: u64) -> Result<()> {
		use std::os::windows::fs::FileExt;
		let mut read = 0;
		while read < buf.len() {
			read += self.file.as_file().seek_read(&mut buf[read..], offset + read as u64)?;
		}
		Ok(())
	}

	#[cfg(windows)]
	fn write_at(&self, buf: &[u8], offset: u64) -> Result<()> {
		use std::os::windows::fs::FileExt;
		let mut written = 0;
		while written < buf.len() {
			written += self.file.as_file().seek_write(&buf[written..], offset + written as u64)?;
		}
		Ok(())
	}

	pub fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
		let mut buf = vec![0u8; len];
		self.read_at(&mut buf, offset)?;
		Ok(buf)
	}

	pub fn write(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
		self.write_at(bytes, offset)?;
		self.len = self.len.max(offset + bytes.len() as u64);
		Ok(())
	}

	pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
		let offset = self.len;
		self.write(offset, bytes)?;
		Ok(offset)
	}

	pub fn truncate(&mut self, len: u64) -> Result<()> {
		self.file.as_file().set_len(len)?;
		self.len = len;
		Ok(())
	}

	/// Stream this file's current contents into a brand new scratch file,
	/// used by the container's copy-on-write `detach` to give a cloned
	/// handle its own backing storage.
	pub fn duplicate(&self, temp_dir: &Path, file_prefix: &str) -> Result<ScratchFile> {
		let mut target = ScratchFile::create(temp_dir, file_prefix)?;
		let mut offset = 0u64;
		let mut buf = vec![0u8; DUPLICATE_CHUNK];
		while offset < self.len {
			let chunk = std::cmp::min(DUPLICATE_CHUNK as u64, self.len - offset) as usize;
			self.read_at(&mut buf[..chunk], offset)?;
			target.write(offset, &buf[..chunk])?;
			offset += chunk as u64;
		}
		Ok(target)
	}

	/// Flush buffered writes so a concurrent reopen of the path sees
	/// consistent bytes. Rarely needed since reads go through the same
	/// handle, kept for parity with callers that reopen by path.
	pub fn flush(&mut self) -> Result<()> {
		self.file.as_file_mut().sync_data()?;
		Ok(())
	}
}

impl Seek for ScratchFile {
	fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
		self.file.as_file_mut().seek(pos)
	}
}

impl Write for ScratchFile {
	fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
		self.file.as_file_mut().write(buf)
	}
	fn flush(&mut self) -> std::io::Result<()> {
		self.file.as_file_mut().flush()
	}
}

/// Best-effort removal of orphaned scratch files left behind by a prior
/// process that did not shut down cleanly. Logs and continues past any
/// individual entry it cannot remove; never returns an error.
pub fn cleanup(temp_dir: &Path, file_prefix: &str) {
	let entries = match std::fs::read_dir(temp_dir) {
		Ok(entries) => entries,
		Err(e) => {
			log::warn!(target: "huge-container", "cleanup: cannot read {}: {}", temp_dir.display(), e);
			return;
		}
	};
	for entry in entries.flatten() {
		let name = entry.file_name();
		let name = match name.to_str() {
			Some(n) => n,
			None => continue,
		};
		if !name.starts_with(file_prefix) {
			continue;
		}
		if let Err(e) = std::fs::remove_file(entry.path()) {
			log::debug!(target: "huge-container", "cleanup: could not remove {}: {}", entry.path().display(), e);
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn dir() -> tempfile::TempDir {
		env_logger::try_init().ok();
		tempfile::TempDir::new().unwrap()
	}

	#[test]
	fn append_and_read_back() {
		let d = dir();
		let mut f = ScratchFile::create(d.path(), "HugeContainerData").unwrap();
		let o1 = f.append(b"hello").unwrap();
		let o2 = f.append(b"world!").unwrap();
		assert_eq!(o1, 0);
		assert_eq!(o2, 5);
		assert_eq!(f.read(o1, 5).unwrap(), b"hello");
		assert_eq!(f.read(o2, 6).unwrap(), b"world!");
	}

	#[test]
	fn write_at_offset_updates_len() {
		let d = dir();
		let mut f = ScratchFile::create(d.path(), "HugeContainerData").unwrap();
		f.write(100, b"tail").unwrap();
		assert_eq!(f.len(), 104);
	}

	#[test]
	fn truncate_shrinks_len() {
		let d = dir();
		let mut f = ScratchFile::create(d.path(), "HugeContainerData").unwrap();
		f.append(b"0123456789").unwrap();
		f.truncate(4).unwrap();
		assert_eq!(f.len(), 4);
		assert_eq!(f.read(0, 4).unwrap(), b"0123");
	}

	#[test]
	fn duplicate_copies_bytes_into_independent_file() {
		let d = dir();
		let mut f = ScratchFile::create(d.path(), "HugeContainerData").unwrap();
		f.append(&vec![7u8; 9000]).unwrap();
		let dup = f.duplicate(d.path(), "HugeContainerData").unwrap();
		assert_eq!(dup.len(), 9000);
		assert_eq!(dup.read(0, 9000).unwrap(), vec![7u8; 9000]);
	}

	#[test]
	fn cleanup_removes_prefixed_orphans() {
		let d = dir();
		let orphan = d.path().join("HugeContainerData-orphan");
		std::fs::write(&orphan, b"x").unwrap();
		let unrelated = d.path().join("keep-me");
		std::fs::write(&unrelated, b"x").unwrap();
		cleanup(d.path(), "HugeContainerData");
		assert!(!orphan.exists());
		assert!(unrelated.exists());
	}
}
