//! Contains structs and functions to parse Debian-styled RFC 822 files.
//!
//! Two parsers are provided: [`TagSection`]/[`parse_tagfile`], a simple whole-buffer
//! parser convenient for small strings such as an extracted `.deb` control file, and
//! [`TagFile`], a streaming reader over any [`Read`] source maintaining a rotating
//! buffer, for the large `Packages`/`Sources` index files the cache generator consumes.
use std::collections::HashMap;
use std::fmt;
use std::io::Read;

use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TagFileError {
	#[error("{msg}{}", .line.map(|l| format!(" at line '{l}'")).unwrap_or_default())]
	Parse { msg: String, line: Option<usize> },
	#[error("stanza exceeds the maximum of {0} tags")]
	MalformedStanza(usize),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Backwards-compatible alias matching the name used by the rest of this crate.
pub type ParserError = TagFileError;

/// A section in a TagFile. A TagFile is made up of double-newline (`\n\n`)
/// separated paragraphs, each of which make up one of these sections.
#[derive(Debug, Clone, Default)]
pub struct TagSection {
	data: IndexMap<String, String>,
}

impl From<TagSection> for HashMap<String, String> {
	fn from(value: TagSection) -> Self { value.data.into_iter().collect() }
}

impl TagSection {
	fn error(msg: &str, line: Option<usize>) -> Result<Self, TagFileError> {
		Err(TagFileError::Parse {
			msg: "E:".to_owned() + msg,
			line,
		})
	}

	fn line_is_key(line: &str) -> bool { !line.starts_with(' ') && !line.starts_with('\t') }

	fn next_line_extends_value(lines: &[&str], current_line: usize) -> bool {
		if let Some(next_line) = lines.get(current_line + 1) {
			!Self::line_is_key(next_line)
		} else {
			false
		}
	}

	/// Create a new [`TagSection`] instance.
	pub fn new(section: &str) -> Result<Self, TagFileError> {
		if section.contains("\n\n") {
			return Self::error("More than one section was found", None);
		}
		if section.is_empty() {
			return Self::error("An empty string was passed", None);
		}

		let mut data = IndexMap::new();
		let lines = section.lines().collect::<Vec<&str>>();

		let mut current_key: Option<String> = None;
		let mut current_value = String::new();

		for (index, line) in lines.iter().enumerate() {
			let line_number = index + 1;

			if line.starts_with('#') {
				continue;
			}

			if Self::line_is_key(line) {
				let (key, value) = match line.split_once(':') {
					Some((key, value)) => {
						(key.to_string(), value.strip_prefix(' ').unwrap_or(value))
					},
					None => {
						return Self::error(
							"Line doesn't contain a ':' separator",
							Some(line_number),
						);
					},
				};

				current_key = Some(key);

				if value.is_empty() {
					current_value = "\n".to_string();
				} else {
					current_value = value.to_string();
					if Self::next_line_extends_value(&lines, index) {
						current_value += "\n";
					}
				}
			}

			if line.starts_with(' ') || line.starts_with('\t') {
				current_value += line;
				if Self::next_line_extends_value(&lines, index) {
					current_value += "\n";
				}
			}

			if !Self::next_line_extends_value(&lines, index) {
				if current_key.is_none() {
					return Self::error(
						"No key defined for the currently indented line",
						Some(line_number),
					);
				}
				data.insert(current_key.unwrap(), current_value);
				current_key = None;
				current_value = String::new();
			}
		}

		Ok(Self { data })
	}

	/// Get the underlying ordered map used in the generated [`TagSection`].
	pub fn hashmap(&self) -> &IndexMap<String, String> { &self.data }

	/// Get the value of the specified key.
	pub fn get(&self, key: &str) -> Option<&String> { self.data.get(key) }

	/// Get the value of the specified key, case-insensitively, as the original
	/// `pkgTagSection::Find` does.
	pub fn find(&self, key: &str) -> Option<&str> {
		self.data
			.iter()
			.find(|(k, _)| k.eq_ignore_ascii_case(key))
			.map(|(_, v)| v.as_str())
	}

	pub fn find_i(&self, key: &str) -> Option<i64> { self.find(key)?.trim().parse().ok() }

	pub fn find_b(&self, key: &str) -> Option<bool> {
		match self.find(key)?.trim() {
			"yes" | "true" | "1" => Some(true),
			"no" | "false" | "0" => Some(false),
			_ => None,
		}
	}

	/// Like `pkgTagSection::FindFlag`: interpret `key` as a boolean and return
	/// `mask` if it's true, `0` if it's false, or `None` if `key` is absent or
	/// not parseable as a boolean.
	pub fn find_flag(&self, key: &str, mask: u32) -> Option<u32> {
		self.find_b(key).map(|set| if set { mask } else { 0 })
	}

	/// Get the value of the specified key, returning `default` on failure.
	pub fn get_default<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
		self.data.get(key).map(String::as_str).unwrap_or(default)
	}

	/// Render the canonical Packages/Sources field order followed by any
	/// unknown fields in their original encounter order, per the rewrite
	/// contract in §4.C. `removals` drops fields from the output entirely
	/// (whether in `order` or unknown); `insertions` overrides a field's
	/// value (or adds it, if not already present) wherever it would land.
	/// Grounded on `pkgTagSection::Write`'s rewrite/removal-list overload,
	/// used by the original to add or strip fields (e.g. `Acquire-By-Hash`)
	/// when re-signing a `Release` file.
	pub fn rewrite(&self, order: &[&str], removals: &[&str], insertions: &[(&str, &str)]) -> Vec<u8> {
		let removed: std::collections::HashSet<String> =
			removals.iter().map(|r| r.to_ascii_lowercase()).collect();
		let insert_value = |key: &str| -> Option<&str> {
			insertions
				.iter()
				.find(|(k, _)| k.eq_ignore_ascii_case(key))
				.map(|(_, v)| *v)
		};

		let mut out = Vec::new();
		let mut seen = std::collections::HashSet::new();

		for key in order {
			let lower = key.to_ascii_lowercase();
			if removed.contains(&lower) {
				seen.insert(lower);
				continue;
			}
			if let Some(value) = insert_value(key).or_else(|| self.find(key)) {
				push_field(&mut out, key, value);
				seen.insert(lower);
			}
		}
		for (key, value) in &self.data {
			let lower = key.to_ascii_lowercase();
			if seen.contains(&lower) || removed.contains(&lower) {
				continue;
			}
			let value = insert_value(key).unwrap_or(value);
			push_field(&mut out, key, value);
			seen.insert(lower);
		}
		for (key, value) in insertions {
			let lower = key.to_ascii_lowercase();
			if seen.contains(&lower) || removed.contains(&lower) {
				continue;
			}
			push_field(&mut out, key, value);
			seen.insert(lower);
		}
		out
	}
}

fn push_field(out: &mut Vec<u8>, key: &str, value: &str) {
	if value == "\n" {
		out.extend_from_slice(key.as_bytes());
		out.push(b':');
		out.push(b'\n');
	} else {
		out.extend_from_slice(key.as_bytes());
		out.extend_from_slice(b": ");
		out.extend_from_slice(value.as_bytes());
		out.push(b'\n');
	}
}

/// Parses a TagFile: these are files such as Debian `control` and `Packages` files.
pub fn parse_tagfile(content: &str) -> Result<Vec<TagSection>, TagFileError> {
	let mut sections = vec![];
	let section_strings = content.split("\n\n");

	for (iter, section) in section_strings.clone().enumerate() {
		if section.is_empty() || section.chars().all(|c| c == '\n') {
			break;
		}

		match TagSection::new(section) {
			Ok(section) => sections.push(section),
			Err(mut err) => {
				let mut line_count = 0;
				for _ in 0..iter {
					line_count += 1;
					line_count += section_strings.clone().count();
				}
				if let TagFileError::Parse { line, .. } = &mut err {
					*line = Some(line.map(|l| line_count + l).unwrap_or(line_count));
				}
				return Err(err);
			},
		}
	}

	Ok(sections)
}

/// Maximum number of tags accepted in a single stanza before [`TagFileError::MalformedStanza`]
/// is raised. This is the decision recorded for the open question in the original about a
/// fixed maximum tag count per stanza.
pub const MAX_TAGS_PER_STANZA: usize = 256;

/// Minimum rotating-buffer size, matching the original `pkgTagFile`'s 64 KiB default.
pub const MIN_BUFFER_SIZE: usize = 64 * 1024;

/// A streaming RFC-822-style stanza reader over any [`Read`] source.
///
/// Maintains a rotating buffer of at least [`MIN_BUFFER_SIZE`] bytes; [`TagFile::step`]
/// scans forward for the next double-newline boundary, refilling (and compacting, via a
/// memmove-equivalent `copy_within`) the buffer as needed. This mirrors
/// `pkgTagFile::Fill`/`pkgTagSection::Scan` in the original tag-file parser.
pub struct TagFile<R> {
	reader: R,
	buf: Vec<u8>,
	start: usize,
	end: usize,
	eof: bool,
}

impl<R: Read> TagFile<R> {
	pub fn new(reader: R) -> Self { Self::with_capacity(reader, MIN_BUFFER_SIZE) }

	pub fn with_capacity(reader: R, capacity: usize) -> Self {
		TagFile {
			reader,
			buf: vec![0u8; capacity.max(MIN_BUFFER_SIZE)],
			start: 0,
			end: 0,
			eof: false,
		}
	}

	/// Compact unread bytes to the front of the buffer and read more, growing the
	/// buffer if a single stanza doesn't fit (mirrors `Fill()`'s grow-on-demand).
	fn fill(&mut self) -> Result<(), TagFileError> {
		if self.start > 0 {
			self.buf.copy_within(self.start..self.end, 0);
			self.end -= self.start;
			self.start = 0;
		}
		if self.end == self.buf.len() {
			let grow_to = self.buf.len() * 2;
			self.buf.resize(grow_to, 0);
		}
		if self.eof {
			return Ok(());
		}
		let n = self.reader.read(&mut self.buf[self.end..])?;
		if n == 0 {
			self.eof = true;
		}
		self.end += n;
		Ok(())
	}

	fn find_boundary(&self) -> Option<usize> {
		let window = &self.buf[self.start..self.end];
		window.windows(2).position(|w| w == b"\n\n").map(|p| self.start + p)
	}

	/// Advance to the next stanza, returning [`None`] at end of stream.
	pub fn step(&mut self) -> Result<Option<TagSection>, TagFileError> {
		loop {
			if let Some(boundary) = self.find_boundary() {
				let text = std::str::from_utf8(&self.buf[self.start..boundary])
					.map_err(|_| TagFileError::Parse {
						msg: "E:stanza is not valid UTF-8".into(),
						line: None,
					})?
					.to_string();
				self.start = boundary + 2;
				if text.trim().is_empty() {
					continue;
				}
				if text.matches(':').count() > MAX_TAGS_PER_STANZA {
					return Err(TagFileError::MalformedStanza(MAX_TAGS_PER_STANZA));
				}
				return Ok(Some(TagSection::new(&text)?));
			}

			if self.eof {
				let remaining = &self.buf[self.start..self.end];
				if remaining.iter().all(|b| b.is_ascii_whitespace()) {
					return Ok(None);
				}
				let text = std::str::from_utf8(remaining)
					.map_err(|_| TagFileError::Parse {
						msg: "E:stanza is not valid UTF-8".into(),
						line: None,
					})?
					.trim_end()
					.to_string();
				self.start = self.end;
				if text.is_empty() {
					return Ok(None);
				}
				return Ok(Some(TagSection::new(&text)?));
			}

			self.fill()?;
		}
	}
}

impl<R: Read> Iterator for TagFile<R> {
	type Item = Result<TagSection, TagFileError>;

	fn next(&mut self) -> Option<Self::Item> { self.step().transpose() }
}

impl fmt::Debug for TagFile<Box<dyn Read>> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "TagFile {{ .. }}") }
}

/// Canonical field order for rendering a `Packages`-style stanza.
pub const PACKAGES_FIELD_ORDER: &[&str] = &[
	"Package",
	"Source",
	"Version",
	"Architecture",
	"Essential",
	"Priority",
	"Section",
	"Maintainer",
	"Installed-Size",
	"Pre-Depends",
	"Depends",
	"Recommends",
	"Suggests",
	"Breaks",
	"Conflicts",
	"Replaces",
	"Provides",
	"Enhances",
	"Filename",
	"Size",
	"MD5sum",
	"SHA1",
	"SHA256",
	"Description",
	"Description-md5",
	"Tag",
	"Multi-Arch",
];

/// Canonical field order for rendering a `Sources`-style stanza.
pub const SOURCES_FIELD_ORDER: &[&str] = &[
	"Package",
	"Format",
	"Binary",
	"Architecture",
	"Version",
	"Priority",
	"Section",
	"Maintainer",
	"Build-Depends",
	"Build-Depends-Indep",
	"Files",
	"Checksums-Sha1",
	"Checksums-Sha256",
];

#[cfg(test)]
mod tests {
	use std::io::Cursor;

	use super::*;

	#[test]
	fn parses_simple_stanza() {
		let sections = parse_tagfile("Package: apt\nVersion: 2.5.2\n\n").unwrap();
		assert_eq!(sections.len(), 1);
		assert_eq!(sections[0].get("Package"), Some(&"apt".to_string()));
	}

	#[test]
	fn case_insensitive_find() {
		let s = TagSection::new("Package: apt\nVersion: 2.5.2\n").unwrap();
		assert_eq!(s.find("PACKAGE"), Some("apt"));
		assert_eq!(s.find_i("version"), None); // non-numeric
	}

	#[test]
	fn streaming_reader_splits_multiple_stanzas() {
		let data = b"Package: a\nVersion: 1\n\nPackage: b\nVersion: 2\n\n".to_vec();
		let mut tf = TagFile::new(Cursor::new(data));
		let first = tf.step().unwrap().unwrap();
		assert_eq!(first.get("Package"), Some(&"a".to_string()));
		let second = tf.step().unwrap().unwrap();
		assert_eq!(second.get("Package"), Some(&"b".to_string()));
		assert!(tf.step().unwrap().is_none());
	}

	#[test]
	fn streaming_reader_handles_no_trailing_double_newline() {
		let data = b"Package: only\nVersion: 1\n".to_vec();
		let mut tf = TagFile::new(Cursor::new(data));
		let only = tf.step().unwrap().unwrap();
		assert_eq!(only.get("Package"), Some(&"only".to_string()));
		assert!(tf.step().unwrap().is_none());
	}

	#[test]
	fn rewrite_preserves_unknown_fields_after_known_ones() {
		let s = TagSection::new("Package: apt\nX-Custom: z\nVersion: 1\n").unwrap();
		let rendered = String::from_utf8(s.rewrite(PACKAGES_FIELD_ORDER, &[], &[])).unwrap();
		let pkg_pos = rendered.find("Package:").unwrap();
		let ver_pos = rendered.find("Version:").unwrap();
		let custom_pos = rendered.find("X-Custom:").unwrap();
		assert!(pkg_pos < ver_pos);
		assert!(ver_pos < custom_pos);
	}

	#[test]
	fn rewrite_preserves_unknown_field_encounter_order() {
		// Three unlisted fields, deliberately not alphabetical: a naive
		// `sort_by` over them would emit X-Bravo, X-Alpha, X-Charlie, which
		// this asserts against.
		let s = TagSection::new(
			"Package: apt\nX-Charlie: 3\nX-Alpha: 1\nX-Bravo: 2\n",
		)
		.unwrap();
		let rendered = String::from_utf8(s.rewrite(PACKAGES_FIELD_ORDER, &[], &[])).unwrap();
		let charlie = rendered.find("X-Charlie:").unwrap();
		let alpha = rendered.find("X-Alpha:").unwrap();
		let bravo = rendered.find("X-Bravo:").unwrap();
		assert!(charlie < alpha);
		assert!(alpha < bravo);
	}

	#[test]
	fn rewrite_applies_removals_and_insertions() {
		let s = TagSection::new("Package: apt\nVersion: 1\nX-Drop: gone\n").unwrap();
		let rendered = String::from_utf8(s.rewrite(
			PACKAGES_FIELD_ORDER,
			&["X-Drop"],
			&[("Version", "2"), ("Acquire-By-Hash", "yes")],
		))
		.unwrap();
		assert!(!rendered.contains("X-Drop"));
		assert!(rendered.contains("Version: 2"));
		assert!(rendered.contains("Acquire-By-Hash: yes"));
	}

	#[test]
	fn find_flag_reflects_boolean_field() {
		let s = TagSection::new("Package: apt\nEssential: yes\n").unwrap();
		assert_eq!(s.find_flag("Essential", 0x1), Some(0x1));
		assert_eq!(s.find_flag("Missing", 0x1), None);
	}
}
