//! Contains miscellaneous helper utilities.
use std::cmp::Ordering;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use fs2::FileExt;

use crate::config::Config;
use crate::error::AptErrors;
pub use crate::version::cmp_versions;

/// Get the terminal's height, i.e. the number of rows it has.
///
/// # Returns:
/// * The terminal height, or `24` if it cannot be determined.
pub fn terminal_height() -> usize {
	terminal_size::terminal_size().map(|(_, h)| h.0 as usize).unwrap_or(24)
}

/// Get the terminal's width, i.e. the number of columns it has.
///
/// # Returns:
/// * The terminal width, or `80` if it cannot be determined.
pub fn terminal_width() -> usize {
	terminal_size::terminal_size().map(|(w, _)| w.0 as usize).unwrap_or(80)
}

/// Disk Space that `apt` will use for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskSpace {
	/// Additional Disk Space required.
	Require(u64),
	/// Disk Space that will be freed
	Free(u64),
}

/// Numeral System for unit conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumSys {
	/// Base 2 | 1024 | KibiByte (KiB)
	Binary,
	/// Base 10 | 1000 | KiloByte (KB)
	Decimal,
}

/// Converts bytes into human readable output.
///
/// ```
/// use rust_apt::util::{unit_str, NumSys};
/// assert_eq!(unit_str(1024 * 1024, NumSys::Binary), "1.00 MiB");
/// ```
pub fn unit_str(val: u64, base: NumSys) -> String {
	let val = val as f64;
	let (num, tera, giga, mega, kilo) = match base {
		NumSys::Binary => (1024.0_f64, "TiB", "GiB", "MiB", "KiB"),
		NumSys::Decimal => (1000.0_f64, "TB", "GB", "MB", "KB"),
	};

	let powers = [
		(num.powi(4), tera),
		(num.powi(3), giga),
		(num.powi(2), mega),
		(num, kilo),
	];

	for (divisor, unit) in powers {
		if val > divisor {
			return format!("{:.2} {unit}", val / divisor);
		}
	}
	format!("{val} B")
}

/// Converts seconds into a human readable time string.
pub fn time_str(seconds: u64) -> String {
	if seconds > 60 * 60 * 24 {
		return format!(
			"{}d {}h {}min {}s",
			seconds / 60 / 60 / 24,
			(seconds / 60 / 60) % 24,
			(seconds / 60) % 60,
			seconds % 60,
		);
	}
	if seconds > 60 * 60 {
		return format!(
			"{}h {}min {}s",
			(seconds / 60 / 60) % 24,
			(seconds / 60) % 60,
			seconds % 60,
		);
	}
	if seconds > 60 {
		return format!("{}min {}s", (seconds / 60) % 60, seconds % 60);
	}
	format!("{seconds}s")
}

/// Get an APT-styled progress bar.
///
/// # Returns:
/// * [`String`] representing the progress bar.
///
/// # Example:
/// ```
/// use rust_apt::util::get_apt_progress_string;
/// let progress = get_apt_progress_string(0.5, 8);
/// assert_eq!(progress, "[####....]");
/// ```
pub fn get_apt_progress_string(percent: f32, output_width: u32) -> String {
	let width = output_width.max(1) as usize;
	let fill = ((percent.clamp(0.0, 1.0) as f64) * width as f64).round() as usize;
	let fill = fill.min(width);
	format!("[{}{}]", "#".repeat(fill), ".".repeat(width - fill))
}

fn lock_path(config: &Config, key: &str, default: &str) -> PathBuf {
	PathBuf::from(config.find(key, default))
}

struct LockGuard {
	file: File,
	depth: u32,
}

static FRONTEND_LOCK: Mutex<Option<LockGuard>> = Mutex::new(None);
static DPKG_LOCK: Mutex<Option<LockGuard>> = Mutex::new(None);

fn acquire(slot: &Mutex<Option<LockGuard>>, path: PathBuf) -> Result<(), AptErrors> {
	let mut guard = slot.lock().unwrap();
	if let Some(existing) = guard.as_mut() {
		existing.depth += 1;
		return Ok(());
	}
	let file = OpenOptions::new()
		.write(true)
		.create(true)
		.truncate(false)
		.open(&path)
		.map_err(|e| AptErrors::from(format!("Could not open lock file {}: {e}", path.display())))?;
	file.try_lock_exclusive().map_err(|_| {
		AptErrors::from(format!(
			"Unable to acquire lock {}, are you root?",
			path.display()
		))
	})?;
	*guard = Some(LockGuard { file, depth: 1 });
	Ok(())
}

fn release(slot: &Mutex<Option<LockGuard>>) {
	let mut guard = slot.lock().unwrap();
	if let Some(held) = guard.as_mut() {
		held.depth -= 1;
		if held.depth == 0 {
			let _ = FileExt::unlock(&held.file);
			*guard = None;
		}
	}
}

/// Lock the APT lockfile (`Dir::State::Lock`, the `dpkg` frontend lock).
/// This should be done before modifying any APT files such as with
/// [`crate::cache::Cache::update`], and then [`apt_unlock`] should be called
/// after.
///
/// This function requires root.
///
/// If [`apt_lock`] is called `n` times, [`apt_unlock`] must also be called `n`
/// times to release all acquired locks.
pub fn apt_lock() -> Result<(), AptErrors> {
	let config = Config::new();
	acquire(
		&FRONTEND_LOCK,
		lock_path(&config, "Dir::State::Lock", "/var/lib/dpkg/lock-frontend"),
	)
}

/// Unlock the APT lockfile.
pub fn apt_unlock() { release(&FRONTEND_LOCK); }

/// Lock the Dpkg lockfile. This should be done before manually running
/// [`crate::cache::Cache::do_install`], and then [`apt_unlock_inner`] should
/// be called after.
///
/// This function requires root.
pub fn apt_lock_inner() -> Result<(), AptErrors> {
	let config = Config::new();
	acquire(
		&DPKG_LOCK,
		lock_path(&config, "Dir::State::DpkgLock", "/var/lib/dpkg/lock"),
	)
}

/// Unlock the Dpkg lockfile.
pub fn apt_unlock_inner() { release(&DPKG_LOCK); }

/// Checks if any locks are currently active for the lockfile. Note that this
/// will only return [`true`] if the current process has an active lock.
pub fn apt_is_locked() -> bool {
	FRONTEND_LOCK.lock().unwrap().is_some() || DPKG_LOCK.lock().unwrap().is_some()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unit_str_picks_right_scale() {
		assert_eq!(unit_str(500, NumSys::Decimal), "500 B");
		assert_eq!(unit_str(1500, NumSys::Decimal), "1.50 KB");
		assert_eq!(unit_str(1024 * 1024, NumSys::Binary), "1.00 MiB");
	}

	#[test]
	fn time_str_formats_each_bracket() {
		assert_eq!(time_str(5), "5s");
		assert_eq!(time_str(65), "1min 5s");
		assert_eq!(time_str(3665), "1h 1min 5s");
		assert_eq!(time_str(90065), "1d 1h 1min 5s");
	}

	#[test]
	fn progress_string_matches_percent() {
		assert_eq!(get_apt_progress_string(0.5, 10), "[#####.....]");
		assert_eq!(get_apt_progress_string(0.0, 4), "[....]");
		assert_eq!(get_apt_progress_string(1.0, 4), "[####]");
	}
}
