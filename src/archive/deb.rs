//! Reading a `.deb` package: an ar(5) container holding `debian-binary`,
//! `control.tar.*` and `data.tar.*` members.
use std::io::Read;

use super::ar::ArReader;
use super::compress::{decompress, find_compressor};
use super::sink::{DirectorySink, SinkAction};
use super::tar::{TarEntry, TarEntryType, TarReader};
use super::{ArchiveError, MAX_CONTROL_SIZE};
use crate::tagfile::TagSection;

/// The parsed `control` stanza and any maintainer scripts from a package's
/// `control.tar.*` member. Script bodies are kept alongside their sanitized
/// name so the caller can write them under `Dir::State::info` without
/// re-deriving a safe path.
#[derive(Debug, Clone)]
pub struct DebControl {
	pub fields: TagSection,
	pub scripts: Vec<(String, Vec<u8>)>,
}

/// A parsed `.deb` package: format version, control metadata, and the
/// decompressed `data.tar` bytes, streamed entry-by-entry through a
/// [`DirectorySink`] on demand rather than held as a collected
/// `Vec<TarEntry>` (spec §4.A's Directory sink).
pub struct DebPackage {
	pub format_version: String,
	pub control: DebControl,
	data_tar: Vec<u8>,
}

fn tar_member_bytes<'a>(ar: &'a ArReader, prefix: &str) -> Result<Vec<u8>, ArchiveError> {
	let (entry, bytes) = ar
		.find_by_prefix(prefix)
		.ok_or_else(|| ArchiveError::MemberNotFound(prefix.to_string()))?;
	match find_compressor(&entry.name) {
		Some(compressor) => decompress(compressor, bytes),
		None => Ok(bytes.to_vec()),
	}
}

impl DebPackage {
	pub fn new(mut reader: impl Read) -> Result<Self, ArchiveError> {
		let mut buf = Vec::new();
		reader.read_to_end(&mut buf)?;
		Self::from_bytes(&buf)
	}

	pub fn from_bytes(data: &[u8]) -> Result<Self, ArchiveError> {
		let ar = ArReader::from_bytes(data)?;

		let (_, version_bytes) = ar
			.find("debian-binary")
			.ok_or_else(|| ArchiveError::MemberNotFound("debian-binary".into()))?;
		let format_version = String::from_utf8_lossy(version_bytes).trim().to_string();

		let control_tar = tar_member_bytes(&ar, "control.tar")?;
		if control_tar.len() as u64 > MAX_CONTROL_SIZE {
			return Err(ArchiveError::ControlTooLarge(MAX_CONTROL_SIZE));
		}
		let mut control_reader = TarReader::new(control_tar.as_slice());
		let mut fields = None;
		let mut scripts = Vec::new();
		while let Some(entry) = control_reader.next_entry()? {
			if entry.entry_type != TarEntryType::File {
				continue;
			}
			// Control members are untrusted input: sanitize the name before
			// ever treating it as a path, the same as data.tar members
			// extracted through a DiskSink (spec §4.B.3).
			let safe_name = super::sink::sanitize_member_path(&entry.name);
			let trimmed = safe_name.to_string_lossy().into_owned();
			if trimmed == "control" {
				let text = String::from_utf8_lossy(&entry.data).into_owned();
				fields = Some(TagSection::new(text.trim_end())?);
			} else {
				scripts.push((trimmed, entry.data));
			}
		}
		let fields = fields.ok_or_else(|| {
			ArchiveError::MalformedHeader("control.tar has no control file".into())
		})?;

		let data_tar = tar_member_bytes(&ar, "data.tar")?;

		Ok(DebPackage {
			format_version,
			control: DebControl { fields, scripts },
			data_tar,
		})
	}

	pub fn package_name(&self) -> Option<&str> { self.control.fields.find("Package") }

	pub fn version(&self) -> Option<&str> { self.control.fields.find("Version") }

	/// Streams `data.tar`'s members through `sink`, one at a time, per spec
	/// §4.A's Directory sink contract: `begin_item` decides whether to write
	/// the member to disk, buffer it in memory, or skip it; the bytes (read
	/// fully by the tar reader ahead of this call) are handed to
	/// `process_bytes` in one chunk; `finish_item` closes things out
	/// (restoring permissions for a [`super::DiskSink`]).
	pub fn extract_data(&self, sink: &mut dyn DirectorySink) -> Result<(), ArchiveError> {
		let mut reader = TarReader::new(self.data_tar.as_slice());
		while let Some(entry) = reader.next_entry()? {
			match sink.begin_item(&entry) {
				Ok(SinkAction::Skip) => continue,
				Ok(SinkAction::InMemory) => {
					if let Err(err) = sink.process_bytes(&entry, &entry.data, 0) {
						sink.fail(&entry);
						return Err(err);
					}
				},
				Ok(SinkAction::WriteTo(mut file)) => {
					use std::io::Write;
					if let Err(err) = file.write_all(&entry.data) {
						sink.fail(&entry);
						return Err(err.into());
					}
				},
				Err(err) => {
					sink.fail(&entry);
					return Err(err);
				},
			}
			if let Err(err) = sink.finish_item(&entry) {
				sink.fail(&entry);
				return Err(err);
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::archive::DiskSink;

	const BLOCK: usize = 512;

	fn tar_header(name: &str, size: u64, link_flag: u8) -> [u8; BLOCK] {
		let mut block = [0u8; BLOCK];
		block[0..name.len()].copy_from_slice(name.as_bytes());
		let mode = format!("{:07o}\0", 0o644);
		block[100..100 + mode.len()].copy_from_slice(mode.as_bytes());
		let zero = format!("{:07o}\0", 0);
		block[108..108 + zero.len()].copy_from_slice(zero.as_bytes());
		block[116..116 + zero.len()].copy_from_slice(zero.as_bytes());
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

	fn tar_with_one_file(name: &str, body: &[u8]) -> Vec<u8> {
		let mut out = tar_header(name, body.len() as u64, b'0').to_vec();
		let mut padded = body.to_vec();
		padded.resize(padded.len().div_ceil(BLOCK) * BLOCK, 0);
		out.extend_from_slice(&padded);
		out.extend_from_slice(&[0u8; BLOCK]);
		out.extend_from_slice(&[0u8; BLOCK]);
		out
	}

	fn ar_member(name: &str, body: &[u8]) -> Vec<u8> {
		let mut header = vec![b' '; 60];
		header[0..name.len()].copy_from_slice(name.as_bytes());
		header[16..28].copy_from_slice(b"0           ");
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

	fn build_deb(control: Vec<u8>, data: Vec<u8>) -> Vec<u8> {
		let mut out = b"!<arch>\n".to_vec();
		out.extend(ar_member("debian-binary", b"2.0\n"));
		out.extend(ar_member("control.tar", &control));
		out.extend(ar_member("data.tar", &data));
		out
	}

	#[test]
	fn parses_control_and_extracts_data_via_disk_sink() {
		let control_tar = tar_with_one_file("control", b"Package: demo\nVersion: 1\n");
		let data_tar = tar_with_one_file("./usr/bin/demo", b"binary-contents");
		let deb = DebPackage::from_bytes(&build_deb(control_tar, data_tar)).unwrap();

		assert_eq!(deb.package_name(), Some("demo"));

		let dest = tempfile::tempdir().unwrap();
		let mut sink = DiskSink::new(dest.path());
		deb.extract_data(&mut sink).unwrap();
		assert_eq!(
			std::fs::read(dest.path().join("usr/bin/demo")).unwrap(),
			b"binary-contents"
		);
	}

	#[test]
	fn oversized_control_member_is_rejected() {
		// An ar member whose body alone exceeds the control-size limit; its
		// contents don't need to be a valid tar stream since the size check
		// runs before any tar parsing.
		let oversized_member = vec![0u8; (super::MAX_CONTROL_SIZE + 1) as usize];
		let deb_bytes = build_deb(oversized_member, tar_with_one_file("x", b""));
		let err = DebPackage::from_bytes(&deb_bytes).unwrap_err();
		assert!(matches!(err, ArchiveError::ControlTooLarge(_)));
	}
}
