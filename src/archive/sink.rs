//! Where extracted tar members go, per spec §4.A's Directory sink: `DiskSink`
//! writes regular files to a real directory (restoring mode and, on Unix,
//! ownership and mtime), `MemorySink` collects everything into memory for
//! the control member's maintainer scripts.
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::tar::{TarEntry, TarEntryType};
use super::ArchiveError;

/// What a sink wants done with an about-to-be-extracted member.
pub enum SinkAction {
	/// Discard this member's data entirely (still consumed off the stream by
	/// the caller, just not written anywhere).
	Skip,
	/// Stream this member's bytes into the given file as they arrive.
	WriteTo(File),
	/// Buffer this member's bytes in memory; retrieved after [`DirectorySink::finish_item`].
	InMemory,
}

/// Destination for a tar archive's extracted members, decoupling `data.tar`
/// extraction from holding every entry in memory at once (the teacher's
/// `Vec<TarEntry>` collection this replaces for on-disk unpacking).
pub trait DirectorySink {
	fn begin_item(&mut self, item: &TarEntry) -> Result<SinkAction, ArchiveError>;
	fn process_bytes(&mut self, item: &TarEntry, data: &[u8], offset: u64) -> Result<(), ArchiveError>;
	fn finish_item(&mut self, item: &TarEntry) -> Result<(), ArchiveError>;
	fn fail(&mut self, item: &TarEntry);
}

/// Rewrites a tar member's name so it can never escape the directory it's
/// extracted into: a leading `/` is stripped, and any `..` path component is
/// replaced with `_` rather than being allowed to walk back up the tree
/// (spec §4.B.3's "non-basename directory separators are rewritten to a
/// benign character").
pub fn sanitize_member_path(name: &str) -> PathBuf {
	let name = name.strip_prefix('/').unwrap_or(name);
	let mut out = PathBuf::new();
	for component in name.split('/') {
		match component {
			"" | "." => continue,
			".." => out.push("_"),
			other => out.push(other),
		}
	}
	out
}

/// Writes members under a base directory on disk, restoring permissions
/// (with the world/group write bits always stripped and ownership forced to
/// root, per spec §4.B.3) and, on Unix, mtime.
pub struct DiskSink {
	base: PathBuf,
}

impl DiskSink {
	pub fn new(base: impl Into<PathBuf>) -> Self { DiskSink { base: base.into() } }

	fn target_path(&self, item: &TarEntry) -> PathBuf { self.base.join(sanitize_member_path(&item.name)) }
}

impl DirectorySink for DiskSink {
	fn begin_item(&mut self, item: &TarEntry) -> Result<SinkAction, ArchiveError> {
		let path = self.target_path(item);
		match item.entry_type {
			TarEntryType::Directory => {
				std::fs::create_dir_all(&path)?;
				Ok(SinkAction::Skip)
			},
			TarEntryType::File | TarEntryType::HardLink => {
				if let Some(parent) = path.parent() {
					std::fs::create_dir_all(parent)?;
				}
				Ok(SinkAction::WriteTo(File::create(&path)?))
			},
			// Symlinks/devices/fifos carry no byte stream worth writing here;
			// restoring them is a job for the caller once all regular files
			// land (order matters: a symlink target may not exist yet).
			_ => Ok(SinkAction::Skip),
		}
	}

	fn process_bytes(&mut self, _item: &TarEntry, _data: &[u8], _offset: u64) -> Result<(), ArchiveError> {
		// `extract_data`'s driver writes straight through the `File` handed
		// back by `begin_item`; nothing for the sink itself to do here.
		Ok(())
	}

	fn finish_item(&mut self, item: &TarEntry) -> Result<(), ArchiveError> {
		if item.entry_type != TarEntryType::File && item.entry_type != TarEntryType::HardLink {
			return Ok(());
		}
		let path = self.target_path(item);
		restore_metadata(&path, item)?;
		Ok(())
	}

	fn fail(&mut self, item: &TarEntry) {
		let _ = std::fs::remove_file(self.target_path(item));
	}
}

#[cfg(unix)]
fn restore_metadata(path: &Path, item: &TarEntry) -> Result<(), ArchiveError> {
	use std::os::unix::fs::PermissionsExt;

	// World/group write always stripped, ownership always forced to root:
	// ar/tar metadata in a downloaded archive is untrusted input.
	let mode = item.mode & !0o022;
	std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
	let _ = std::os::unix::fs::chown(path, Some(0), Some(0));
	if let Ok(file) = File::options().write(true).open(path) {
		let mtime = std::time::UNIX_EPOCH + std::time::Duration::from_secs(item.mtime);
		let _ = file.set_modified(mtime);
	}
	Ok(())
}

#[cfg(not(unix))]
fn restore_metadata(_path: &Path, _item: &TarEntry) -> Result<(), ArchiveError> { Ok(()) }

/// Collects every member's bytes in memory, keyed by its sanitized name.
/// Used for the control member's maintainer scripts, which are small and
/// read back immediately rather than unpacked to a real directory.
#[derive(Debug, Default)]
pub struct MemorySink {
	buffers: HashMap<PathBuf, Vec<u8>>,
}

impl MemorySink {
	pub fn new() -> Self { MemorySink::default() }

	pub fn into_buffers(self) -> HashMap<PathBuf, Vec<u8>> { self.buffers }

	pub fn get(&self, name: &str) -> Option<&[u8]> { self.buffers.get(&sanitize_member_path(name)).map(Vec::as_slice) }
}

impl DirectorySink for MemorySink {
	fn begin_item(&mut self, item: &TarEntry) -> Result<SinkAction, ArchiveError> {
		match item.entry_type {
			TarEntryType::File | TarEntryType::HardLink => {
				self.buffers.insert(sanitize_member_path(&item.name), Vec::with_capacity(item.size as usize));
				Ok(SinkAction::InMemory)
			},
			_ => Ok(SinkAction::Skip),
		}
	}

	fn process_bytes(&mut self, item: &TarEntry, data: &[u8], _offset: u64) -> Result<(), ArchiveError> {
		if let Some(buf) = self.buffers.get_mut(&sanitize_member_path(&item.name)) {
			buf.write_all(data)?;
		}
		Ok(())
	}

	fn finish_item(&mut self, _item: &TarEntry) -> Result<(), ArchiveError> { Ok(()) }

	fn fail(&mut self, item: &TarEntry) { self.buffers.remove(&sanitize_member_path(&item.name)); }
}
