//! A single thing to fetch: an index file or a package archive.
//!
//! Grounded on spec §3's Acquire Item data model (destination, expected
//! hashes/size, state, retry counter, ordered candidate URIs) and
//! `original_source/apt-pkg/acquire-item.cc`'s `pkgAcquire::Item::Failed`
//! (falling through to the next URI in the list on a `400 URI Failure`).
use std::path::PathBuf;

use crate::hash::HashStringList;

/// Lifecycle state of an [`AcquireItem`], per spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemState {
	#[default]
	Idle,
	Fetching,
	Done,
	Error,
}

/// What kind of thing an [`AcquireItem`] is fetching, per spec §4.J's Item
/// taxonomy. Each variant gets its own post-download handling in
/// [`super::worker::verify`] (index files probe for local decompression,
/// archives are hash-checked against the cache, signatures and release files
/// are left as-is for the caller to verify against a keyring).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemKind {
	/// A `Packages`/`Sources` index.
	IndexFile,
	/// A `Translation-<lang>` index.
	TranslationIndex,
	/// A repository's `Release` (or `InRelease`) file.
	ReleaseFile,
	/// A detached `Release.gpg` signature.
	ReleaseSignature,
	/// A `.deb` binary package.
	Archive,
	/// A plain local-to-local copy with no further processing.
	#[default]
	FileCopy,
	/// An `Index-Diff`/`.pdiff` incremental update to a stale index.
	MetadataDiff,
}

/// One acquisition target, built from an [`crate::sourceslist::IndexTarget`]
/// or a package's candidate archive location.
#[derive(Debug, Clone)]
pub struct AcquireItem {
	/// The URI currently being (or next to be) tried.
	pub uri: String,
	/// Further candidate URIs to fall back to, in preference order, after
	/// `uri` fails.
	pub alt_uris: Vec<String>,
	pub destination: PathBuf,
	pub description: String,
	pub short_desc: String,
	pub expected_hashes: HashStringList,
	pub expected_size: u64,
	/// Modification time (Unix seconds) of an existing local copy, sent as
	/// `Last-Modified` for conditional (IMS) requests. Second granularity
	/// only, matching the legacy behavior documented in spec §9.
	pub last_modified: Option<u64>,
	pub retries: u32,
	pub state: ItemState,
	pub kind: ItemKind,
}

impl AcquireItem {
	pub fn new(uri: impl Into<String>, destination: impl Into<PathBuf>, description: impl Into<String>) -> Self {
		AcquireItem {
			uri: uri.into(),
			alt_uris: Vec::new(),
			destination: destination.into(),
			description: description.into(),
			short_desc: String::new(),
			expected_hashes: HashStringList::new(),
			expected_size: 0,
			last_modified: None,
			retries: 0,
			state: ItemState::Idle,
			kind: ItemKind::default(),
		}
	}

	/// Supply fallback URIs, tried in order after [`AcquireItem::uri`] fails.
	pub fn with_alt_uris(mut self, alt_uris: impl IntoIterator<Item = String>) -> Self {
		self.alt_uris = alt_uris.into_iter().collect();
		self
	}

	/// Tag this item with its [`ItemKind`], for per-kind post-download
	/// handling in [`super::worker::verify`].
	pub fn with_kind(mut self, kind: ItemKind) -> Self {
		self.kind = kind;
		self
	}

	/// The scheme of [`AcquireItem::uri`] (`http`, `https`, `file`, `copy`, ...).
	pub fn scheme(&self) -> &str { scheme_of(&self.uri) }

	/// The `host:scheme` key used to group items into per-host queues.
	/// Queue membership is fixed by the item's *primary* URI even though it
	/// may fall back to a different host on failure (per spec §3, a Queue is
	/// keyed by one URI's host or scheme, chosen up front).
	pub fn queue_key(&self) -> String { queue_key_of(&self.uri) }

	/// Advance past the given failed URI to the next candidate, if any.
	/// Returns `false` once every candidate has been exhausted.
	pub(crate) fn advance_uri(&mut self) -> bool {
		self.retries += 1;
		if self.alt_uris.is_empty() {
			return false;
		}
		self.uri = self.alt_uris.remove(0);
		true
	}
}

fn scheme_of(uri: &str) -> &str { uri.split_once("://").map(|(s, _)| s).unwrap_or("file") }

fn queue_key_of(uri: &str) -> String {
	match uri.split_once("://") {
		Some((scheme, rest)) => {
			let host = rest.split('/').next().unwrap_or(rest);
			format!("{scheme}://{host}")
		},
		None => "file://".to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn advance_uri_walks_fallback_list_then_exhausts() {
		let mut item = AcquireItem::new("http://a/x", "/tmp/x", "x")
			.with_alt_uris(["http://b/x".to_string(), "http://c/x".to_string()]);
		assert!(item.advance_uri());
		assert_eq!(item.uri, "http://b/x");
		assert!(item.advance_uri());
		assert_eq!(item.uri, "http://c/x");
		assert!(!item.advance_uri());
		assert_eq!(item.retries, 3);
	}
}
