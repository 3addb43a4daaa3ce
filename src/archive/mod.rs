//! Reading Debian archive containers: the outer `ar(5)` envelope, the GNU tar
//! dialect used for `control.tar.*`/`data.tar.*` members, and the `.deb` package
//! format that composes the two together.
mod ar;
mod compress;
mod deb;
mod sink;
mod tar;

pub use ar::{ArEntry, ArReader};
pub use compress::{decompress, find_compressor, Compressor, COMPRESSORS};
pub use deb::{DebControl, DebPackage};
pub use sink::{sanitize_member_path, DirectorySink, DiskSink, MemorySink, SinkAction};
pub use tar::{TarEntry, TarEntryType, TarReader};

use thiserror::Error;

/// Control members (`control`, maintainer scripts, `md5sums`, ...) are held
/// in memory; this bounds that allocation against a hostile or corrupt
/// `control.tar` claiming an enormous size (spec §4.B.4).
pub const MAX_CONTROL_SIZE: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ArchiveError {
	#[error("invalid archive signature")]
	InvalidSignature,
	#[error("malformed archive member header: {0}")]
	MalformedHeader(String),
	#[error("tar checksum failed, archive corrupted")]
	ChecksumMismatch,
	#[error("archive is too short")]
	Truncated,
	#[error("member not found: {0}")]
	MemberNotFound(String),
	#[error("no configured decompressor for '{0}'")]
	NoDecompressor(String),
	#[error("decompressor '{0}' exited with {1}")]
	DecompressorFailed(String, std::process::ExitStatus),
	#[error("control member exceeds the {0}-byte limit")]
	ControlTooLarge(u64),
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	TagFile(#[from] crate::tagfile::TagFileError),
}
