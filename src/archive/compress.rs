//! The table of decompressor subprocesses used to unwrap `control.tar.*` and
//! `data.tar.*` members, mirroring `APT::Configuration::getCompressors()` and
//! the fork/exec idiom `ExtractTar::StartGzip` uses to feed a compressed stream
//! through an external binary rather than linking a decompression library.
use std::io::Write;
use std::process::{Command, Stdio};

use tracing::debug;

use super::ArchiveError;

/// A single known compression format and the external binary used to decode it.
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
	pub name: &'static str,
	pub extension: &'static str,
	pub binary: &'static str,
	pub decompress_args: &'static [&'static str],
}

pub const COMPRESSORS: &[Compressor] = &[
	Compressor {
		name: "gzip",
		extension: ".gz",
		binary: "gzip",
		decompress_args: &["-d"],
	},
	Compressor {
		name: "bzip2",
		extension: ".bz2",
		binary: "bzip2",
		decompress_args: &["-d"],
	},
	Compressor {
		name: "xz",
		extension: ".xz",
		binary: "xz",
		decompress_args: &["-d"],
	},
	Compressor {
		name: "lzma",
		extension: ".lzma",
		binary: "xz",
		decompress_args: &["-d", "-F", "lzma"],
	},
	Compressor {
		name: "zstd",
		extension: ".zst",
		binary: "zstd",
		decompress_args: &["-d"],
	},
	Compressor {
		name: "lz4",
		extension: ".lz4",
		binary: "lz4",
		decompress_args: &["-d"],
	},
];

/// Find the compressor matching a member name's trailing extension, e.g.
/// `control.tar.gz` -> the `gzip` entry. Returns `None` for `control.tar` with
/// no extension, meaning the data is already plain tar.
pub fn find_compressor(member_name: &str) -> Option<&'static Compressor> {
	COMPRESSORS
		.iter()
		.find(|c| member_name.ends_with(c.extension))
}

/// Run the decompressor for `compressor` over `input`, returning the decoded bytes.
pub fn decompress(compressor: &Compressor, input: &[u8]) -> Result<Vec<u8>, ArchiveError> {
	debug!(binary = compressor.binary, bytes = input.len(), "spawning decompressor");
	let mut child = Command::new(compressor.binary)
		.args(compressor.decompress_args)
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::null())
		.spawn()?;

	let mut stdin = child.stdin.take().expect("piped stdin");
	let input = input.to_vec();
	let writer = std::thread::spawn(move || stdin.write_all(&input));

	let output = child.wait_with_output()?;
	let _ = writer.join();

	if !output.status.success() {
		return Err(ArchiveError::DecompressorFailed(
			compressor.name.to_string(),
			output.status,
		));
	}
	Ok(output.stdout)
}
