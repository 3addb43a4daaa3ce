//! The line-based message protocol apt's acquire method subprocesses speak
//! over stdin/stdout.
//!
//! Grounded on `original_source/apt-pkg/acquire-method.cc`'s `pkgAcqMethod::Run`:
//! a message is a numeric status code, a description, and `Key: Value`
//! header lines, terminated by a blank line.
use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
	#[error("malformed status line: {0:?}")]
	MalformedStatusLine(String),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// One method protocol message: a status line plus `Key: Value` headers.
#[derive(Debug, Clone, Default)]
pub struct Message {
	pub code: u32,
	pub description: String,
	pub fields: BTreeMap<String, String>,
}

impl Message {
	pub fn new(code: u32, description: impl Into<String>) -> Self {
		Message {
			code,
			description: description.into(),
			fields: BTreeMap::new(),
		}
	}

	pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.fields.insert(key.into(), value.into());
		self
	}

	pub fn get(&self, key: &str) -> Option<&str> { self.fields.get(key).map(String::as_str) }
}

impl fmt::Display for Message {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		writeln!(f, "{} {}", self.code, self.description)?;
		for (k, v) in &self.fields {
			writeln!(f, "{k}: {v}")?;
		}
		writeln!(f)
	}
}

/// Status codes a method may send.
pub mod status {
	pub const CAPABILITIES: u32 = 100;
	pub const LOG: u32 = 101;
	pub const STATUS: u32 = 102;
	pub const URI_START: u32 = 200;
	pub const URI_DONE: u32 = 201;
	pub const URI_FAILURE: u32 = 400;
	pub const GENERAL_FAILURE: u32 = 401;
	pub const MEDIA_CHANGE: u32 = 403;
}

/// Reads [`Message`]s out of a method subprocess's stdout.
pub struct MessageReader<R> {
	lines: std::io::Lines<R>,
}

impl<R: BufRead> MessageReader<R> {
	pub fn new(reader: R) -> Self { MessageReader { lines: reader.lines() } }

	/// Read the next message, or `None` at EOF.
	pub fn next_message(&mut self) -> Result<Option<Message>, WireError> {
		let Some(status_line) = self.lines.next() else {
			return Ok(None);
		};
		let status_line = status_line?;
		if status_line.is_empty() {
			return self.next_message();
		}
		let (code_str, description) = status_line.split_once(' ').unwrap_or((status_line.as_str(), ""));
		let code: u32 = code_str
			.parse()
			.map_err(|_| WireError::MalformedStatusLine(status_line.clone()))?;
		let mut message = Message::new(code, description);
		let mut last_key: Option<String> = None;
		for line in self.lines.by_ref() {
			let line = line?;
			if line.is_empty() {
				break;
			}
			// RFC-822 continuation: a line starting with whitespace extends
			// the previous field (e.g. a multi-line `Message:`).
			if line.starts_with(' ') || line.starts_with('\t') {
				if let Some(key) = &last_key {
					if let Some(existing) = message.fields.get_mut(key) {
						existing.push('\n');
						existing.push_str(line.trim_start());
					}
				}
				continue;
			}
			if let Some((key, value)) = line.split_once(": ") {
				message.fields.insert(key.to_string(), value.to_string());
				last_key = Some(key.to_string());
			}
		}
		Ok(Some(message))
	}
}
