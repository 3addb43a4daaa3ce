//! Turns a [`Cache`]'s marked changes into archive fetches and a `dpkg`
//! invocation.
//!
//! Grounded on the teacher's `pkgmanager.rs` (kept the `PackageManager`/
//! `OrderResult` shape) and `original_source/apt-pkg/algorithms.cc`'s
//! `pkgPackageManager::DoInstall`, with the cxx `PkgAcquire`/dpkg subprocess it
//! drove replaced by [`crate::acquire::fetch`] and a native `std::process::Command`
//! invocation of `dpkg`.
use std::path::Path;
use std::process::Command;

use crate::cache::Cache;
use crate::error::AptErrors;
use crate::progress::{AcquireProgress, InstallProgress};

/// Outcome of [`PackageManager::do_install`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderResult {
	Completed,
	Failed,
	Incomplete,
}

#[derive(Debug, Default)]
pub struct PackageManager;

impl PackageManager {
	pub(crate) fn new() -> Self { PackageManager }

	/// Download every marked install/upgrade's archive that isn't already on
	/// disk, into `Dir::Cache::Archives`.
	pub fn get_archives(&self, cache: &Cache, progress: &mut AcquireProgress) -> Result<(), AptErrors> {
		let archive_dir = cache.config.dir("Dir::Cache::Archives", "/var/cache/apt/archives/");
		let depcache = cache.depcache();

		let mut items = Vec::new();
		for id in cache.raw_pkgs() {
			if !(depcache.marked_install(cache, id) || depcache.marked_upgrade(cache, id)) {
				continue;
			}
			let Some(version_id) = depcache.candidate_version(cache, id) else { continue };
			let version = cache.version(version_id);
			let Some(filename) = &version.filename else { continue };

			let dest = archive_dir.clone()
				+ Path::new(filename)
					.file_name()
					.map(|n| n.to_string_lossy().into_owned())
					.unwrap_or_else(|| filename.clone());
			if Path::new(&dest).exists() {
				continue;
			}

			let uri = match version.files.first() {
				Some(file_id) => {
					let pkg_file = cache.file(*file_id);
					if pkg_file.site.is_empty() {
						format!("file://{filename}")
					} else {
						format!("{}/{}", pkg_file.site.trim_end_matches('/'), filename)
					}
				},
				None => format!("file://{filename}"),
			};

			let mut item = crate::acquire::AcquireItem::new(uri, dest, cache.package(id).name.clone());
			item.expected_size = version.size;
			item.expected_hashes = version.hashes.clone();
			items.push(item);
		}

		if items.is_empty() {
			progress.start();
			progress.done(&crate::progress::ItemProgress::default());
			return Ok(());
		}

		crate::acquire::fetch(&cache.config, items, progress)
	}

	/// Run `dpkg` to apply every marked change, reporting through `progress`.
	pub fn do_install(&self, cache: &Cache, progress: &mut InstallProgress) -> Result<OrderResult, AptErrors> {
		let depcache = cache.depcache();
		let archive_dir = cache.config.dir("Dir::Cache::Archives", "/var/cache/apt/archives/");

		let to_install: Vec<_> = cache
			.raw_pkgs()
			.filter(|id| depcache.marked_install(cache, *id) || depcache.marked_upgrade(cache, *id))
			.collect();
		let to_remove: Vec<_> = cache
			.raw_pkgs()
			.filter(|id| depcache.marked_delete(cache, *id))
			.collect();

		let total_steps = (to_install.len() + to_remove.len()) as u64;
		let mut steps_done = 0u64;

		for id in &to_install {
			let pkg = cache.package(*id);
			let Some(version_id) = depcache.candidate_version(cache, *id) else { continue };
			let version = cache.version(version_id);
			let Some(filename) = &version.filename else { continue };
			let archive_path = archive_dir.clone()
				+ Path::new(filename)
					.file_name()
					.map(|n| n.to_string_lossy().into_owned())
					.unwrap_or_else(|| filename.clone());

			progress.status_changed(pkg.name.clone(), steps_done, total_steps, "Installing".to_string());
			let output = Command::new("dpkg").arg("--install").arg(&archive_path).output()?;
			if !output.status.success() {
				let message = String::from_utf8_lossy(&output.stderr).into_owned();
				progress.error(pkg.name.clone(), steps_done, total_steps, message);
				return Ok(OrderResult::Failed);
			}
			steps_done += 1;
		}

		for id in &to_remove {
			let pkg = cache.package(*id);
			let purge = depcache.marked_purge(cache, *id);
			let flag = if purge { "--purge" } else { "--remove" };

			progress.status_changed(pkg.name.clone(), steps_done, total_steps, "Removing".to_string());
			let output = Command::new("dpkg").arg(flag).arg(&pkg.name).output()?;
			if !output.status.success() {
				let message = String::from_utf8_lossy(&output.stderr).into_owned();
				progress.error(pkg.name.clone(), steps_done, total_steps, message);
				return Ok(OrderResult::Failed);
			}
			steps_done += 1;
		}

		Ok(OrderResult::Completed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn order_result_is_copy_and_eq() {
		assert_eq!(OrderResult::Completed, OrderResult::Completed);
		assert_ne!(OrderResult::Completed, OrderResult::Failed);
	}
}
