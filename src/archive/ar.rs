//! A reader for the `ar(5)` container format used as the outer envelope of a
//! `.deb` package.
//!
//! AR archives have plain-text headers at the start of each file section, aligned
//! on a 2 byte boundary. This is a direct port of `ARArchive::LoadHeaders` from
//! `apt-inst/contrib/arfile.cc`.
use std::io::Read;

use super::ArchiveError;

const GLOBAL_MAGIC: &[u8; 8] = b"!<arch>\n";
const HEADER_LEN: usize = 60;

fn parse_ascii_num(field: &[u8], radix: u32) -> Result<u64, ArchiveError> {
	let text = std::str::from_utf8(field)
		.map_err(|_| ArchiveError::MalformedHeader("non-UTF-8 numeric field".into()))?
		.trim();
	if text.is_empty() {
		return Ok(0);
	}
	u64::from_str_radix(text, radix)
		.map_err(|_| ArchiveError::MalformedHeader(format!("bad numeric field '{text}'")))
}

/// Metadata for a single member of an ar archive.
#[derive(Debug, Clone)]
pub struct ArEntry {
	pub name: String,
	pub mtime: u64,
	pub uid: u64,
	pub gid: u64,
	pub mode: u32,
	pub size: u64,
}

/// Reads the member list of an ar archive and holds each member's data in memory.
///
/// Unlike a streaming tar reader, ar members need to be randomly accessible (a
/// `.deb`'s `control.tar.*` and `data.tar.*` are looked up by name rather than
/// read in sequence), so the whole archive is buffered up front.
pub struct ArReader {
	members: Vec<(ArEntry, Vec<u8>)>,
}

impl ArReader {
	/// Parse an entire ar archive from `reader`.
	pub fn new(mut reader: impl Read) -> Result<Self, ArchiveError> {
		let mut data = Vec::new();
		reader.read_to_end(&mut data)?;
		Self::from_bytes(&data)
	}

	pub fn from_bytes(data: &[u8]) -> Result<Self, ArchiveError> {
		if data.len() < GLOBAL_MAGIC.len() || &data[..GLOBAL_MAGIC.len()] != GLOBAL_MAGIC {
			return Err(ArchiveError::InvalidSignature);
		}

		let mut pos = GLOBAL_MAGIC.len();
		let mut members = Vec::new();

		while pos < data.len() {
			if data.len() - pos < HEADER_LEN {
				return Err(ArchiveError::Truncated);
			}
			let header = &data[pos..pos + HEADER_LEN];
			pos += HEADER_LEN;

			let name_field = &header[0..16];
			let mtime = parse_ascii_num(&header[16..28], 10)?;
			let uid = parse_ascii_num(&header[28..34], 10)?;
			let gid = parse_ascii_num(&header[34..40], 10)?;
			let mode = parse_ascii_num(&header[40..48], 8)? as u32;
			let mut size = parse_ascii_num(&header[48..58], 10)?;
			let magic = &header[58..60];
			if magic != b"`\n" {
				return Err(ArchiveError::MalformedHeader(
					"missing member header magic".into(),
				));
			}

			// BSD-style long name: "#1/<len>" means the real name is the first
			// `len` bytes of the data section.
			let name = if name_field.starts_with(b"#1/") {
				let len_str = std::str::from_utf8(&name_field[3..])
					.map_err(|_| ArchiveError::MalformedHeader("bad #1/ length".into()))?
					.trim();
				let len: usize = len_str
					.parse()
					.map_err(|_| ArchiveError::MalformedHeader("bad #1/ length".into()))?;
				if data.len() - pos < len {
					return Err(ArchiveError::Truncated);
				}
				let raw = &data[pos..pos + len];
				pos += len;
				size -= len as u64;
				String::from_utf8_lossy(raw)
					.trim_end_matches('\0')
					.to_string()
			} else {
				String::from_utf8_lossy(name_field)
					.trim_end_matches([' ', '/'])
					.to_string()
			};

			let size = size as usize;
			if data.len() - pos < size {
				return Err(ArchiveError::Truncated);
			}
			let body = data[pos..pos + size].to_vec();
			pos += size;
			// Members are aligned to a 2-byte boundary.
			if size % 2 == 1 {
				pos += 1;
			}

			members.push((
				ArEntry {
					name,
					mtime,
					uid,
					gid,
					mode,
					size: size as u64,
				},
				body,
			));
		}

		Ok(ArReader { members })
	}

	pub fn entries(&self) -> impl Iterator<Item = &ArEntry> { self.members.iter().map(|(m, _)| m) }

	pub fn find(&self, name: &str) -> Option<(&ArEntry, &[u8])> {
		self.members
			.iter()
			.find(|(m, _)| m.name == name)
			.map(|(m, d)| (m, d.as_slice()))
	}

	/// Find the first member whose name starts with `prefix`, e.g. `"control.tar"`
	/// to locate `control.tar.gz`/`control.tar.xz`/etc regardless of compression.
	pub fn find_by_prefix(&self, prefix: &str) -> Option<(&ArEntry, &[u8])> {
		self.members
			.iter()
			.find(|(m, _)| m.name.starts_with(prefix))
			.map(|(m, d)| (m, d.as_slice()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn build_member(name: &str, body: &[u8]) -> Vec<u8> {
		let mut header = vec![b' '; HEADER_LEN];
		header[0..name.len()].copy_from_slice(name.as_bytes());
		let mtime = b"0           ";
		header[16..28].copy_from_slice(mtime);
		header[28..34].copy_from_slice(b"0     ");
		header[34..40].copy_from_slice(b"0     ");
		header[40..48].copy_from_slice(b"100644  ");
		let size_str = format!("{:<10}", body.len());
		header[48..58].copy_from_slice(size_str.as_bytes());
		header[58..60].copy_from_slice(b"`\n");

		let mut out = header;
		out.extend_from_slice(body);
		if body.len() % 2 == 1 {
			out.push(b'\n');
		}
		out
	}

	#[test]
	fn reads_simple_members() {
		let mut data = GLOBAL_MAGIC.to_vec();
		data.extend(build_member("debian-binary", b"2.0\n"));
		data.extend(build_member("control.tar.gz", b"hello"));

		let ar = ArReader::from_bytes(&data).unwrap();
		assert_eq!(ar.entries().count(), 2);
		let (entry, body) = ar.find("debian-binary").unwrap();
		assert_eq!(entry.size, 4);
		assert_eq!(body, b"2.0\n");
		assert!(ar.find_by_prefix("control.tar").is_some());
	}

	#[test]
	fn rejects_bad_magic() {
		let err = ArReader::from_bytes(b"not an archive").unwrap_err();
		assert!(matches!(err, ArchiveError::InvalidSignature));
	}
}
