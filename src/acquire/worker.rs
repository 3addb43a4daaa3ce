//! Runs one [`Queue`] to completion: either directly for local schemes
//! (`file`, `copy`) or by talking the wire protocol to a spawned method
//! subprocess (`http`, `https`, `ftp`, ...), the way `pkgAcquire::Worker`
//! drives `/usr/lib/apt/methods/<scheme>`.
//!
//! Grounded on `original_source/apt-pkg/acquire-worker.cc`'s `Worker::RunMessages`
//! (framed request/response over a child's stdio) and `acquire-item.cc`'s
//! `Item::Failed` (falling through `DescURI`'s candidate list on a `400`, and
//! honoring `IMS-Hit` by leaving an up-to-date local file untouched).
use std::io::{BufReader, Write};
use std::process::{Command, Stdio};

use thiserror::Error;
use tracing::{debug, warn};

use super::item::{AcquireItem, ItemKind, ItemState};
use super::queue::Queue;
use super::wire::{status, Message, MessageReader, WireError};
use super::SharedProgress;
use crate::progress::ItemProgress;

#[derive(Debug, Error)]
pub enum AcquireError {
	#[error("no method available for scheme {0:?}")]
	NoMethod(String),
	#[error("fetch of {uri} failed: {message}")]
	Failed { uri: String, message: String },
	#[error("hash mismatch for {0}")]
	HashMismatch(String),
	#[error(transparent)]
	Wire(#[from] WireError),
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

fn method_path(methods_dir: &str, scheme: &str) -> std::path::PathBuf {
	std::path::Path::new(methods_dir).join(scheme)
}

/// Run every item in `queue`, in order, reporting through `progress`.
///
/// Each item tries its primary URI, then every URI in
/// [`AcquireItem::alt_uris`] in turn, until one succeeds or all are
/// exhausted (spec §4.J's fallback order). `next_id` is shared across every
/// queue in a [`super::fetch`] run so item numbering stays global even
/// though queues execute concurrently. `methods_dir` (`Dir::Bin::Methods`)
/// is resolved up front by the caller rather than read from [`crate::config::Config`]
/// here, since `Config` is a thread-local handle and this runs on a worker
/// thread spawned by [`super::fetch`].
pub fn run_queue(
	methods_dir: &str,
	queue: &mut Queue,
	progress: &SharedProgress,
	next_id: &std::sync::atomic::AtomicUsize,
) -> Result<(), AcquireError> {
	for item in &mut queue.items {
		let id = next_id.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
		item.state = ItemState::Fetching;

		let item_progress = ItemProgress {
			id,
			description: item.description.clone(),
			file_size: item.expected_size,
		};
		progress.fetch(&item_progress);

		if let Some(mtime) = local_mtime_secs(item) {
			item.last_modified = Some(mtime);
		}

		let outcome = loop {
			debug!(uri = %item.uri, retries = item.retries, "fetching");
			let result = match item.scheme() {
				"file" | "copy" => run_local(item),
				scheme => run_subprocess(methods_dir, scheme, item),
			};
			match result {
				Ok(hit) => break Ok(hit),
				Err(err) => {
					warn!(uri = %item.uri, error = %err, "uri failed");
					if !item.advance_uri() {
						break Err(err);
					}
				},
			}
		};

		match outcome {
			Ok(true) => {
				// IMS hit: local file is already current, nothing re-fetched.
				item.state = ItemState::Done;
				progress.hit(&item_progress);
			},
			Ok(false) => {
				item.state = ItemState::Done;
				progress.done(&item_progress);
			},
			Err(err) => {
				item.state = ItemState::Error;
				progress.fail(&item_progress);
				// A missing/invalid Release signature doesn't fail the
				// update; it just leaves the index untrusted (spec §7's
				// AuthenticityMissing), so don't abort the rest of the run.
				if item.kind == ItemKind::ReleaseSignature {
					warn!(uri = %item.uri, "release signature unavailable, index will be untrusted");
					continue;
				}
				return Err(err);
			},
		}
	}
	Ok(())
}

fn local_mtime_secs(item: &AcquireItem) -> Option<u64> {
	let meta = std::fs::metadata(&item.destination).ok()?;
	let modified = meta.modified().ok()?;
	modified.duration_since(std::time::UNIX_EPOCH).ok().map(|d| d.as_secs())
}

/// Runs one URI attempt. Returns `Ok(true)` on an IMS hit (nothing to
/// verify), `Ok(false)` on a normal successful fetch.
fn run_local(item: &AcquireItem) -> Result<bool, AcquireError> {
	let source = item
		.uri
		.split_once("://")
		.map(|(_, path)| path)
		.unwrap_or(&item.uri);
	std::fs::copy(source, &item.destination)?;
	verify(item)?;
	Ok(false)
}

fn run_subprocess(methods_dir: &str, scheme: &str, item: &AcquireItem) -> Result<bool, AcquireError> {
	let binary = method_path(methods_dir, scheme);
	if !binary.exists() {
		return Err(AcquireError::NoMethod(scheme.to_string()));
	}

	let mut child = Command::new(&binary)
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.spawn()?;

	let mut request = Message::new(600, "URI Acquire")
		.with_field("URI", item.uri.clone())
		.with_field("Filename", item.destination.display().to_string());
	if let Some(mtime) = item.last_modified {
		request = request.with_field("Last-Modified", mtime.to_string());
	}
	child
		.stdin
		.as_mut()
		.expect("piped stdin")
		.write_all(request.to_string().as_bytes())?;

	let stdout = child.stdout.take().expect("piped stdout");
	let mut reader = MessageReader::new(BufReader::new(stdout));

	let outcome = loop {
		match reader.next_message()? {
			None => break Err(AcquireError::Failed {
				uri: item.uri.clone(),
				message: "method exited without a response".to_string(),
			}),
			Some(message) if message.code == status::URI_DONE => {
				let ims_hit = message.get("IMS-Hit").is_some_and(|v| v == "true");
				break Ok(ims_hit);
			},
			Some(message) if message.code == status::URI_FAILURE || message.code == status::GENERAL_FAILURE => {
				break Err(AcquireError::Failed {
					uri: item.uri.clone(),
					message: message.get("Message").unwrap_or(&message.description).to_string(),
				});
			},
			Some(_) => continue,
		}
	};

	let _ = child.wait();
	match outcome {
		Ok(true) => Ok(true),
		Ok(false) => {
			verify(item)?;
			Ok(false)
		},
		Err(err) => Err(err),
	}
}

/// Post-download handling, dispatched by [`ItemKind`] (spec §4.J): archives
/// and index files are hash-checked when the caller supplied expected
/// hashes; index files and translations are additionally probed for a
/// compression extension and decompressed alongside the fetched file.
/// Release files and signatures carry no a-priori hash to check against, so
/// they're accepted as-is (trust is established later against a keyring).
fn verify(item: &AcquireItem) -> Result<(), AcquireError> {
	match item.kind {
		ItemKind::ReleaseFile | ItemKind::ReleaseSignature => Ok(()),
		ItemKind::IndexFile | ItemKind::TranslationIndex => {
			verify_hashes(item)?;
			decompress_if_needed(item)
		},
		ItemKind::Archive | ItemKind::FileCopy | ItemKind::MetadataDiff => verify_hashes(item),
	}
}

fn verify_hashes(item: &AcquireItem) -> Result<(), AcquireError> {
	if item.expected_hashes.is_empty() {
		return Ok(());
	}
	let file = std::fs::File::open(&item.destination)?;
	let ok = item
		.expected_hashes
		.verify(file)
		.map_err(|e| AcquireError::Failed {
			uri: item.uri.clone(),
			message: e.to_string(),
		})?;
	if ok {
		Ok(())
	} else {
		Err(AcquireError::HashMismatch(item.uri.clone()))
	}
}

/// If `item`'s destination ends in a known compressor's extension, decode it
/// alongside the compressed copy so the cache generator can read a plain
/// tag-file without spawning a decompressor of its own.
fn decompress_if_needed(item: &AcquireItem) -> Result<(), AcquireError> {
	let name = item.destination.to_string_lossy();
	let Some(compressor) = crate::archive::find_compressor(&name) else {
		return Ok(());
	};
	let compressed = std::fs::read(&item.destination)?;
	let decoded = crate::archive::decompress(compressor, &compressed)
		.map_err(|e| AcquireError::Failed { uri: item.uri.clone(), message: e.to_string() })?;
	let plain = name.trim_end_matches(compressor.extension);
	std::fs::write(plain, decoded)?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::io::Write as _;

	use tempfile::NamedTempFile;

	use super::*;

	#[test]
	fn run_local_copies_and_verifies() {
		let mut src = NamedTempFile::new().unwrap();
		src.write_all(b"hello").unwrap();
		let dest = NamedTempFile::new().unwrap();
		let mut item = AcquireItem::new(
			format!("file://{}", src.path().display()),
			dest.path(),
			"test",
		);
		item.expected_hashes.push(crate::hash::HashString::new(
			"sha256",
			"2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
		));
		// Wrong hash on purpose: a mismatched expectation must fail closed.
		assert!(matches!(run_local(&item), Err(AcquireError::HashMismatch(_))));
	}

	#[test]
	fn run_queue_falls_back_to_second_uri() {
		let mut src = NamedTempFile::new().unwrap();
		src.write_all(b"hello").unwrap();
		let dest = tempfile::tempdir().unwrap().path().join("out");

		let item = AcquireItem::new("file:///does/not/exist", &dest, "test")
			.with_alt_uris([format!("file://{}", src.path().display())]);
		let mut queue = Queue { key: "file://".to_string(), items: vec![item] };
		let mut progress = crate::progress::AcquireProgress::quiet();
		let shared_progress = SharedProgress::new(&mut progress);
		let next_id = std::sync::atomic::AtomicUsize::new(0);

		run_queue("/usr/lib/apt/methods/", &mut queue, &shared_progress, &next_id).unwrap();
		assert_eq!(queue.items[0].retries, 1);
		assert_eq!(queue.items[0].state, ItemState::Done);
		assert_eq!(std::fs::read(&dest).unwrap(), b"hello");
	}
}
