//! A memory-mapped region backing the on-disk Package Cache, and the growable
//! allocator the cache generator uses to lay out records inside it.
//!
//! Grounded on `apt-pkg/contrib/mmap.h`/`mmap.cc`'s `MMap`/`DynamicMMap`: the
//! `Flags` bitset (`Public`, `ReadOnly`, `Moveable`, `Fallback`) is kept, with
//! `memmap2` standing in for the hand-rolled mmap-or-read-fallback wrapper.
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};

use memmap2::{Mmap, MmapMut};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MapError {
	#[error("requested size {0} exceeds the configured limit {1}")]
	LimitExceeded(u64, u64),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Mirrors `MMap::OpenFlags`. Hand-rolled rather than pulling in the `bitflags`
/// crate for a single small type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags(u32);

impl Flags {
	pub const NO_IMM_MAP: Flags = Flags(1 << 0);
	pub const PUBLIC: Flags = Flags(1 << 1);
	pub const READ_ONLY: Flags = Flags(1 << 2);
	pub const UNMAPPED: Flags = Flags(1 << 3);
	pub const MOVEABLE: Flags = Flags(1 << 4);
	pub const FALLBACK: Flags = Flags(1 << 5);

	pub const fn empty() -> Self { Flags(0) }

	pub const fn bits(self) -> u32 { self.0 }

	pub const fn contains(self, other: Self) -> bool { self.0 & other.0 == other.0 }
}

impl std::ops::BitOr for Flags {
	type Output = Self;

	fn bitor(self, rhs: Self) -> Self { Flags(self.0 | rhs.0) }
}

/// A read-only or read-write memory-mapped region over a file.
pub enum Map {
	ReadOnly(Mmap),
	ReadWrite(MmapMut),
	/// Used when `Fallback` is set and the platform/file can't be mapped: the
	/// whole region lives in a plain heap allocation instead.
	Heap(Vec<u8>),
}

impl Map {
	/// Map `file` according to `flags`. `ReadOnly` produces an immutable mapping;
	/// otherwise a writable one is attempted, falling back to a heap buffer if
	/// `Flags::FALLBACK` is set and the mmap call fails.
	pub fn new(file: &File, flags: Flags) -> Result<Self, MapError> {
		if flags.contains(Flags::READ_ONLY) {
			return Ok(Map::ReadOnly(unsafe { Mmap::map(file)? }));
		}

		match unsafe { MmapMut::map_mut(file) } {
			Ok(m) => Ok(Map::ReadWrite(m)),
			Err(e) if flags.contains(Flags::FALLBACK) => {
				let mut buf = Vec::new();
				let mut file = file.try_clone()?;
				file.seek(SeekFrom::Start(0))?;
				std::io::Read::read_to_end(&mut file, &mut buf)?;
				let _ = e;
				Ok(Map::Heap(buf))
			},
			Err(e) => Err(e.into()),
		}
	}

	pub fn as_slice(&self) -> &[u8] {
		match self {
			Map::ReadOnly(m) => m,
			Map::ReadWrite(m) => m,
			Map::Heap(v) => v,
		}
	}

	pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
		match self {
			Map::ReadWrite(m) => Some(m),
			Map::Heap(v) => Some(v),
			Map::ReadOnly(_) => None,
		}
	}

	pub fn len(&self) -> usize { self.as_slice().len() }

	pub fn is_empty(&self) -> bool { self.len() == 0 }

	/// Flush pending writes back to disk (`Map::Sync`). A no-op for read-only
	/// and heap-fallback maps.
	pub fn sync(&self) -> Result<(), MapError> {
		if let Map::ReadWrite(m) = self {
			m.flush()?;
		}
		Ok(())
	}
}

const DEFAULT_WORKSPACE: u64 = 2 * 1024 * 1024;
const DEFAULT_GROW: u64 = 1024 * 1024;

/// A growable bump allocator over a backing file, used by the cache generator
/// to lay out package/version/dependency records. Mirrors `DynamicMMap`.
pub struct DynamicMap {
	file: File,
	map: Map,
	used: u64,
	grow: u64,
	limit: u64,
}

impl DynamicMap {
	pub fn create(path: &std::path::Path, workspace: u64, grow: u64, limit: u64) -> Result<Self, MapError> {
		let file = OpenOptions::new()
			.read(true)
			.write(true)
			.create(true)
			.truncate(true)
			.open(path)?;
		file.set_len(workspace.max(DEFAULT_WORKSPACE))?;
		let map = Map::new(&file, Flags::PUBLIC | Flags::MOVEABLE)?;
		Ok(DynamicMap {
			file,
			map,
			used: 0,
			grow: if grow == 0 { DEFAULT_GROW } else { grow },
			limit,
		})
	}

	/// Grow the backing file (and remap it) by one `grow` increment.
	fn grow_map(&mut self) -> Result<(), MapError> {
		let new_len = self.file.metadata()?.len() + self.grow;
		if self.limit != 0 && new_len > self.limit {
			return Err(MapError::LimitExceeded(new_len, self.limit));
		}
		self.file.set_len(new_len)?;
		self.map = Map::new(&self.file, Flags::PUBLIC | Flags::MOVEABLE)?;
		Ok(())
	}

	/// Reserve and return the start offset of a `size`-byte (optionally
	/// `align`-aligned) region, growing the backing store as needed.
	pub fn raw_allocate(&mut self, size: u64, align: u64) -> Result<u64, MapError> {
		if align > 0 {
			let rem = self.used % align;
			if rem != 0 {
				self.used += align - rem;
			}
		}
		while self.used + size > self.map.len() as u64 {
			self.grow_map()?;
		}
		let start = self.used;
		self.used += size;
		Ok(start)
	}

	pub fn allocate(&mut self, item_size: u64) -> Result<u64, MapError> {
		self.raw_allocate(item_size, item_size)
	}

	/// Copy `s` (plus a trailing NUL) into the map, returning its offset.
	pub fn write_string(&mut self, s: &[u8]) -> Result<u64, MapError> {
		let offset = self.raw_allocate(s.len() as u64 + 1, 0)?;
		let slice = self
			.map
			.as_mut_slice()
			.expect("dynamic map is always writable");
		let start = offset as usize;
		slice[start..start + s.len()].copy_from_slice(s);
		slice[start + s.len()] = 0;
		Ok(offset)
	}

	pub fn as_slice(&self) -> &[u8] { self.map.as_slice() }

	pub fn used(&self) -> u64 { self.used }

	pub fn sync(&self) -> Result<(), MapError> { self.map.sync() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dynamic_map_allocates_and_writes_strings() {
		let tmp = tempfile::NamedTempFile::new().unwrap();
		let mut map = DynamicMap::create(tmp.path(), 4096, 4096, 0).unwrap();
		let off1 = map.write_string(b"hello").unwrap();
		let off2 = map.write_string(b"world").unwrap();
		assert_ne!(off1, off2);
		let data = map.as_slice();
		assert_eq!(&data[off1 as usize..off1 as usize + 5], b"hello");
		assert_eq!(&data[off2 as usize..off2 as usize + 5], b"world");
	}

	#[test]
	fn dynamic_map_grows_past_initial_workspace() {
		let tmp = tempfile::NamedTempFile::new().unwrap();
		let mut map = DynamicMap::create(tmp.path(), 16, 16, 0).unwrap();
		for _ in 0..8 {
			map.write_string(b"0123456789").unwrap();
		}
		assert!(map.used() > 16);
	}
}
