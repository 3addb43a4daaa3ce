//! Progress reporting traits and the terminal-rendering default
//! implementations used by `Cache::update`/`get_archives`/`do_install`.
//!
//! Grounded on the teacher's `progress.rs` (kept the `DynAcquireProgress`/
//! `DynOperationProgress`/`DynInstallProgress` trait split and the
//! `AptAcquireProgress`/`AptInstallProgress` terminal renderers), with the
//! `cxx` `ItemDesc`/`PkgAcquire`/`AcqTextStatus` types it drove replaced by
//! plain [`ItemProgress`]/[`FetchPulse`] structs native code can construct
//! directly.
use std::io::{Write, stdout};
use std::os::fd::RawFd;

use crate::util::{NumSys, get_apt_progress_string, terminal_width, time_str, unit_str};

/// Enough information about a single fetched item to render one progress line.
#[derive(Debug, Clone, Default)]
pub struct ItemProgress {
	pub id: usize,
	pub description: String,
	pub file_size: u64,
}

/// A snapshot of overall transfer progress, reported periodically during a
/// fetch.
#[derive(Debug, Clone, Default)]
pub struct FetchPulse {
	pub current_bytes: u64,
	pub total_bytes: u64,
	pub current_items: usize,
	pub total_items: usize,
	pub current_cps: u64,
	pub elapsed_seconds: u64,
}

/// Customize the output shown during file downloads.
pub trait DynAcquireProgress {
	/// The pulse interval, in microseconds. `0` uses apt's default (500ms).
	fn pulse_interval(&self) -> usize { 0 }

	/// Called when an item is confirmed to be up-to-date.
	fn hit(&mut self, item: &ItemProgress);

	/// Called when an item has started downloading.
	fn fetch(&mut self, item: &ItemProgress);

	/// Called when an item fails to download.
	fn fail(&mut self, item: &ItemProgress);

	/// Called periodically with the overall progress.
	fn pulse(&mut self, pulse: &FetchPulse);

	/// Called when an item is successfully and completely fetched.
	fn done(&mut self, item: &ItemProgress);

	/// Called when progress has started.
	fn start(&mut self);

	/// Called when progress has finished.
	fn stop(&mut self, pulse: &FetchPulse);
}

/// Customize the output of operation progress on things like opening the cache.
pub trait DynOperationProgress {
	fn update(&mut self, operation: String, percent: f32);
	fn done(&mut self);
}

/// Customize the output of installation progress.
pub trait DynInstallProgress {
	fn status_changed(&mut self, pkgname: String, steps_done: u64, total_steps: u64, action: String);
	fn error(&mut self, pkgname: String, steps_done: u64, total_steps: u64, error: String);
}

/// Drives fetch progress reporting during [`crate::cache::Cache::update`] and
/// [`crate::cache::Cache::get_archives`].
pub struct AcquireProgress<'a> {
	inner: Box<dyn DynAcquireProgress + Send + 'a>,
}

impl<'a> AcquireProgress<'a> {
	/// `Send` so a fetch run can hand progress callbacks to the Acquire
	/// runtime's worker threads (§4.J runs one thread per queue).
	pub fn new(inner: impl DynAcquireProgress + Send + 'a) -> Self { Self { inner: Box::new(inner) } }

	/// The default `apt`-style terminal progress.
	pub fn apt() -> Self { Self::new(AptAcquireProgress::new()) }

	/// No output at all.
	pub fn quiet() -> Self { Self::new(AptAcquireProgress::disable()) }

	pub fn pulse_interval(&self) -> usize { self.inner.pulse_interval() }

	pub fn hit(&mut self, item: &ItemProgress) { self.inner.hit(item) }

	pub fn fetch(&mut self, item: &ItemProgress) { self.inner.fetch(item) }

	pub fn fail(&mut self, item: &ItemProgress) { self.inner.fail(item) }

	pub fn pulse(&mut self, pulse: &FetchPulse) { self.inner.pulse(pulse) }

	pub fn done(&mut self, item: &ItemProgress) { self.inner.done(item) }

	pub(crate) fn start(&mut self) { self.inner.start() }

	pub(crate) fn stop(&mut self, pulse: &FetchPulse) { self.inner.stop(pulse) }
}

impl Default for AcquireProgress<'_> {
	fn default() -> Self { Self::apt() }
}

/// Allows lengthy operations to report their progress.
pub struct OperationProgress<'a> {
	inner: Box<dyn DynOperationProgress + 'a>,
}

impl<'a> OperationProgress<'a> {
	pub fn new(inner: impl DynOperationProgress + 'a) -> Self { Self { inner: Box::new(inner) } }

	/// An [`OperationProgress`] that discards everything.
	pub fn quiet() -> Self { Self::new(NoOpProgress) }

	pub fn update(&mut self, operation: String, percent: f32) { self.inner.update(operation, percent) }

	pub fn done(&mut self) { self.inner.done() }
}

impl Default for OperationProgress<'_> {
	fn default() -> Self { Self::quiet() }
}

/// Progress of package installation, either rendered to the terminal or
/// forwarded as raw dpkg status-fd lines to a file descriptor.
pub enum InstallProgress<'a> {
	Fancy(Box<dyn DynInstallProgress + 'a>),
	Fd(RawFd),
}

impl<'a> InstallProgress<'a> {
	pub fn new(inner: impl DynInstallProgress + 'a) -> Self { Self::Fancy(Box::new(inner)) }

	/// Send dpkg status messages to a file descriptor instead of rendering them.
	pub fn fd(fd: RawFd) -> Self { Self::Fd(fd) }

	/// The default `apt`-style terminal progress.
	pub fn apt() -> Self { Self::new(AptInstallProgress::new()) }

	pub(crate) fn status_changed(&mut self, pkgname: String, steps_done: u64, total_steps: u64, action: String) {
		if let InstallProgress::Fancy(inner) = self {
			inner.status_changed(pkgname, steps_done, total_steps, action);
		}
	}

	pub(crate) fn error(&mut self, pkgname: String, steps_done: u64, total_steps: u64, error: String) {
		if let InstallProgress::Fancy(inner) = self {
			inner.error(pkgname, steps_done, total_steps, error);
		}
	}
}

impl Default for InstallProgress<'_> {
	fn default() -> Self { Self::apt() }
}

struct NoOpProgress;

impl DynOperationProgress for NoOpProgress {
	fn update(&mut self, _operation: String, _percent: f32) {}

	fn done(&mut self) {}
}

/// Mimics the output of `apt update`/`apt upgrade`'s fetch phase.
#[derive(Default, Debug)]
pub struct AptAcquireProgress {
	lastline: usize,
	disable: bool,
}

impl AptAcquireProgress {
	pub fn new() -> Self { Self::default() }

	pub fn disable() -> Self {
		AptAcquireProgress {
			disable: true,
			..Default::default()
		}
	}

	fn clear_last_line(&mut self, term_width: usize) {
		if self.disable || self.lastline == 0 {
			return;
		}
		let width = self.lastline.min(term_width);
		print!("\r{}\r", " ".repeat(width));
		let _ = stdout().flush();
	}
}

impl DynAcquireProgress for AptAcquireProgress {
	fn hit(&mut self, item: &ItemProgress) {
		if self.disable {
			return;
		}
		self.clear_last_line(terminal_width().saturating_sub(1));
		println!("Hit:{} {}", item.id, item.description);
	}

	fn fetch(&mut self, item: &ItemProgress) {
		if self.disable {
			return;
		}
		self.clear_last_line(terminal_width().saturating_sub(1));
		let mut line = format!("Get:{} {}", item.id, item.description);
		if item.file_size != 0 {
			line.push_str(&format!(" [{}]", unit_str(item.file_size, NumSys::Decimal)));
		}
		self.lastline = line.len();
		println!("{line}");
	}

	fn fail(&mut self, item: &ItemProgress) {
		if self.disable {
			return;
		}
		self.clear_last_line(terminal_width().saturating_sub(1));
		println!("Err:{} {}", item.id, item.description);
	}

	fn pulse(&mut self, pulse: &FetchPulse) {
		if self.disable {
			return;
		}
		self.clear_last_line(terminal_width().saturating_sub(1));
		let percent = pulse.current_bytes as f32 / pulse.total_bytes.max(1) as f32;
		let line = format!(
			"{} {}/{} {}/s",
			get_apt_progress_string(percent, 30),
			unit_str(pulse.current_bytes, NumSys::Decimal),
			unit_str(pulse.total_bytes, NumSys::Decimal),
			unit_str(pulse.current_cps, NumSys::Decimal),
		);
		self.lastline = line.len();
		print!("\r{line}");
		let _ = stdout().flush();
	}

	fn done(&mut self, _item: &ItemProgress) {}

	fn start(&mut self) { self.lastline = 0; }

	fn stop(&mut self, pulse: &FetchPulse) {
		if self.disable {
			return;
		}
		self.clear_last_line(terminal_width().saturating_sub(1));
		println!(
			"Fetched {} in {} ({}/s)",
			unit_str(pulse.total_bytes, NumSys::Decimal),
			time_str(pulse.elapsed_seconds),
			unit_str(pulse.current_cps, NumSys::Decimal),
		);
	}
}

/// Mimics the output of `apt install`'s install phase.
#[derive(Default, Debug)]
pub struct AptInstallProgress {}

impl AptInstallProgress {
	pub fn new() -> Self { Self::default() }
}

impl DynInstallProgress for AptInstallProgress {
	fn status_changed(&mut self, pkgname: String, steps_done: u64, total_steps: u64, action: String) {
		println!("[{steps_done}/{total_steps}] {pkgname}: {action}");
	}

	fn error(&mut self, pkgname: String, steps_done: u64, total_steps: u64, error: String) {
		eprintln!("[{steps_done}/{total_steps}] {pkgname}: {error}");
	}
}
