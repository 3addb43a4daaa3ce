//! A reader for the GNU tar dialect used inside `.deb` `control.tar.*` and
//! `data.tar.*` members.
//!
//! Ported from `ExtractTar::Go` in `apt-inst/contrib/extracttar.cc`: 512-byte
//! blocks, octal or GNU base-256 numeric fields, a space-blanked checksum, and
//! `L`/`K` long-name/long-link extensions. A block of all zero bytes ends the
//! archive.
use std::io::Read;

use tracing::warn;

use super::ArchiveError;

const BLOCK_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TarEntryType {
	File,
	HardLink,
	SymbolicLink,
	CharacterDevice,
	BlockDevice,
	Directory,
	Fifo,
}

#[derive(Debug, Clone)]
pub struct TarEntry {
	pub name: String,
	pub link_target: String,
	pub mode: u32,
	pub uid: u64,
	pub gid: u64,
	pub size: u64,
	pub mtime: u64,
	pub entry_type: TarEntryType,
	pub data: Vec<u8>,
}

fn field_str(field: &[u8]) -> &[u8] {
	let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
	&field[..end]
}

/// Parse a numeric tar field, which is either octal ASCII (NUL/space terminated)
/// or, for values too large for the field width, GNU base-256 (high bit of the
/// first byte set, remaining bytes a big-endian binary integer).
fn parse_num(field: &[u8]) -> Result<u64, ArchiveError> {
	if field.first().map(|&b| b & 0x80 != 0).unwrap_or(false) {
		let mut value: u64 = (field[0] & 0x7f) as u64;
		for &b in &field[1..] {
			value = (value << 8) | b as u64;
		}
		return Ok(value);
	}

	let text = std::str::from_utf8(field_str(field))
		.map_err(|_| ArchiveError::MalformedHeader("non-UTF-8 numeric tar field".into()))?
		.trim();
	if text.is_empty() {
		return Ok(0);
	}
	u64::from_str_radix(text, 8)
		.map_err(|_| ArchiveError::MalformedHeader(format!("bad octal field '{text}'")))
}

fn is_zero_block(block: &[u8; BLOCK_SIZE]) -> bool { block.iter().all(|&b| b == 0) }

/// Streaming reader over GNU tar data. Each call to [`TarReader::next_entry`]
/// returns the next file-like entry with its data fully read into memory;
/// directory/device entries have an empty `data`.
pub struct TarReader<R> {
	reader: R,
	last_long_name: Option<String>,
	last_long_link: Option<String>,
}

impl<R: Read> TarReader<R> {
	pub fn new(reader: R) -> Self {
		TarReader {
			reader,
			last_long_name: None,
			last_long_link: None,
		}
	}

	fn read_block(&mut self) -> Result<Option<[u8; BLOCK_SIZE]>, ArchiveError> {
		let mut block = [0u8; BLOCK_SIZE];
		let mut read = 0;
		while read < BLOCK_SIZE {
			let n = self.reader.read(&mut block[read..])?;
			if n == 0 {
				if read == 0 {
					return Ok(None);
				}
				return Err(ArchiveError::Truncated);
			}
			read += n;
		}
		Ok(Some(block))
	}

	/// Read a GNU long-name/long-link payload: `size` bytes, rounded up to the
	/// next 512-byte block.
	fn read_long_payload(&mut self, size: u64) -> Result<String, ArchiveError> {
		let blocks = size.div_ceil(BLOCK_SIZE as u64) as usize;
		let mut buf = Vec::with_capacity(blocks * BLOCK_SIZE);
		for _ in 0..blocks {
			let block = self
				.read_block()?
				.ok_or(ArchiveError::Truncated)?;
			buf.extend_from_slice(&block);
		}
		buf.truncate(size as usize);
		if buf.last() == Some(&0) {
			let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
			buf.truncate(end);
		}
		Ok(String::from_utf8_lossy(&buf).into_owned())
	}

	fn read_file_data(&mut self, size: u64) -> Result<Vec<u8>, ArchiveError> {
		let blocks = size.div_ceil(BLOCK_SIZE as u64) as usize;
		let mut out = Vec::with_capacity(size as usize);
		let mut remaining = size as usize;
		for _ in 0..blocks {
			let block = self
				.read_block()?
				.ok_or(ArchiveError::Truncated)?;
			let take = remaining.min(BLOCK_SIZE);
			out.extend_from_slice(&block[..take]);
			remaining -= take;
		}
		Ok(out)
	}

	/// Advance to the next entry, skipping GNU long-name/long-link records
	/// (which are folded into the entry they precede). Returns `None` once a
	/// zero block (or EOF) is reached.
	pub fn next_entry(&mut self) -> Result<Option<TarEntry>, ArchiveError> {
		loop {
			let block = match self.read_block()? {
				Some(b) => b,
				None => return Ok(None),
			};
			if is_zero_block(&block) {
				return Ok(None);
			}

			let name_field = &block[0..100];
			let mode_field = &block[100..108];
			let uid_field = &block[108..116];
			let gid_field = &block[116..124];
			let size_field = &block[124..136];
			let mtime_field = &block[136..148];
			let checksum_field = &block[148..156];
			let link_flag = block[156];
			let link_name_field = &block[157..257];

			let recorded_checksum = {
				let text = std::str::from_utf8(field_str(checksum_field))
					.map_err(|_| ArchiveError::MalformedHeader("bad checksum field".into()))?
					.trim();
				u64::from_str_radix(text, 8)
					.map_err(|_| ArchiveError::MalformedHeader("bad checksum field".into()))?
			};

			let mut checked = block;
			checked[148..156].copy_from_slice(b"        ");
			let computed: u64 = checked.iter().map(|&b| b as u64).sum();
			if computed != recorded_checksum {
				return Err(ArchiveError::ChecksumMismatch);
			}

			let mode = parse_num(mode_field)? as u32;
			let uid = parse_num(uid_field)?;
			let gid = parse_num(gid_field)?;
			let size = parse_num(size_field)?;
			let mtime = parse_num(mtime_field)?;

			match link_flag {
				b'L' => {
					let payload = self.read_long_payload(size)?;
					self.last_long_name = Some(payload);
					continue;
				},
				b'K' => {
					let payload = self.read_long_payload(size)?;
					self.last_long_link = Some(payload);
					continue;
				},
				_ => {},
			}

			let mut name = self.last_long_name.take().unwrap_or_else(|| {
				String::from_utf8_lossy(field_str(name_field)).into_owned()
			});
			if let Some(rest) = name.strip_prefix("./") {
				if !rest.is_empty() {
					name = rest.to_string();
				}
			}
			let link_target = self.last_long_link.take().unwrap_or_else(|| {
				String::from_utf8_lossy(field_str(link_name_field)).into_owned()
			});

			let entry_type = match link_flag {
				0 | b'0' => TarEntryType::File,
				b'1' => TarEntryType::HardLink,
				b'2' => TarEntryType::SymbolicLink,
				b'3' => TarEntryType::CharacterDevice,
				b'4' => TarEntryType::BlockDevice,
				b'5' => TarEntryType::Directory,
				b'6' => TarEntryType::Fifo,
				other => {
					// Matches ExtractTar::Go's BadRecord path: an unrecognized
					// link flag is a warning, not a fatal error. The member's
					// data still has to be drained off the stream so the next
					// header lines up, but the entry itself is dropped.
					warn!(member = %name, link_flag = other, "unknown tar header type, skipping member");
					self.read_file_data(size)?;
					continue;
				},
			};

			let data = if matches!(entry_type, TarEntryType::File | TarEntryType::HardLink) {
				self.read_file_data(size)?
			} else {
				Vec::new()
			};

			return Ok(Some(TarEntry {
				name,
				link_target,
				mode,
				uid,
				gid,
				size,
				mtime,
				entry_type,
				data,
			}));
		}
	}

	pub fn entries(mut self) -> impl Iterator<Item = Result<TarEntry, ArchiveError>> {
		std::iter::from_fn(move || self.next_entry().transpose())
	}
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;

	fn header_block(name: &str, size: u64, link_flag: u8) -> [u8; BLOCK_SIZE] {
		let mut block = [0u8; BLOCK_SIZE];
		block[0..name.len()].copy_from_slice(name.as_bytes());
		let mode = format!("{:07o}\0", 0o644);
		block[100..100 + mode.len()].copy_from_slice(mode.as_bytes());
		let uid = format!("{:07o}\0", 0);
		block[108..108 + uid.len()].copy_from_slice(uid.as_bytes());
		block[116..116 + uid.len()].copy_from_slice(uid.as_bytes());
		let size_str = format!("{size:011o}\0");
		block[124..124 + size_str.len()].copy_from_slice(size_str.as_bytes());
		let mtime = format!("{:011o}\0", 0);
		block[136..136 + mtime.len()].copy_from_slice(mtime.as_bytes());
		block[156] = link_flag;
		block[148..156].copy_from_slice(b"        ");
		let sum: u64 = block.iter().map(|&b| b as u64).sum();
		let checksum = format!("{sum:06o}\0 ");
		block[148..148 + checksum.len()].copy_from_slice(checksum.as_bytes());
		block
	}

	#[test]
	fn reads_single_file_entry() {
		let data = b"hello world";
		let mut archive = header_block("./foo.txt", data.len() as u64, b'0').to_vec();
		let mut padded = data.to_vec();
		padded.resize(BLOCK_SIZE, 0);
		archive.extend_from_slice(&padded);
		archive.extend_from_slice(&[0u8; BLOCK_SIZE]);
		archive.extend_from_slice(&[0u8; BLOCK_SIZE]);

		let mut reader = TarReader::new(Cursor::new(archive));
		let entry = reader.next_entry().unwrap().unwrap();
		assert_eq!(entry.name, "foo.txt");
		assert_eq!(entry.data, data);
		assert!(reader.next_entry().unwrap().is_none());
	}

	#[test]
	fn unknown_link_flag_is_skipped_not_fatal() {
		let data = b"hello world";
		let mut archive = header_block("weird", data.len() as u64, b'x').to_vec();
		let mut padded = data.to_vec();
		padded.resize(BLOCK_SIZE, 0);
		archive.extend_from_slice(&padded);

		let mut good = header_block("foo.txt", 0, b'0').to_vec();
		archive.append(&mut good);
		archive.extend_from_slice(&[0u8; BLOCK_SIZE]);
		archive.extend_from_slice(&[0u8; BLOCK_SIZE]);

		let mut reader = TarReader::new(Cursor::new(archive));
		let entry = reader.next_entry().unwrap().unwrap();
		assert_eq!(entry.name, "foo.txt");
		assert!(reader.next_entry().unwrap().is_none());
	}

	#[test]
	fn bad_checksum_is_rejected() {
		let mut block = header_block("x", 0, b'0');
		block[0] = b'y'; // corrupt after checksum computed
		let mut archive = block.to_vec();
		archive.extend_from_slice(&[0u8; BLOCK_SIZE]);
		let mut reader = TarReader::new(Cursor::new(archive));
		assert!(matches!(
			reader.next_entry().unwrap_err(),
			ArchiveError::ChecksumMismatch
		));
	}
}
