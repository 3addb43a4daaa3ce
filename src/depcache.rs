//! Per-package installation state: what's marked for install/remove/keep,
//! auto-install flags, and the aggregate counters used before a commit.
//!
//! Grounded on the teacher's `depcache.rs` (kept the `DepCache` method
//! surface: `mark_install`/`mark_delete`/`mark_keep`/`is_upgradable`/the
//! `*_count`/`disk_size` counters) and `original_source/apt-pkg/depcache.cc`'s
//! `MarkInstall`/`MarkDelete`/`IsImportantDep` semantics for what each mark
//! does to dependents.
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::cache::{Cache, PackageId, Upgrade};
use crate::error::AptErrors;
use crate::util::DiskSpace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
	Keep,
	Install,
	Delete { purge: bool },
}

#[derive(Debug, Clone, Default)]
struct PackageState {
	action: Option<Action>,
	auto_installed: bool,
	reinstall: bool,
	protected: bool,
}

/// Tracks the pending changes against a [`Cache`]: what's marked for
/// install/delete/keep, and whether each was pulled in automatically.
#[derive(Debug, Default)]
pub struct DepCache {
	state: RefCell<HashMap<PackageId, PackageState>>,
}

impl DepCache {
	pub(crate) fn new(_cache: &Cache) -> Self { DepCache::default() }

	fn entry(&self, id: PackageId) -> PackageState {
		self.state.borrow().get(&id).cloned().unwrap_or_default()
	}

	fn with_entry(&self, id: PackageId, f: impl FnOnce(&mut PackageState)) {
		let mut state = self.state.borrow_mut();
		f(state.entry(id).or_default());
	}

	/// The version that would be installed if `id` is marked install, honoring
	/// any explicit candidate override.
	pub fn candidate_version(&self, cache: &Cache, id: PackageId) -> Option<crate::cache::VersionId> {
		cache.policy().candidate_version(cache, id)
	}

	pub fn is_upgradable(&self, cache: &Cache, id: PackageId) -> bool {
		let pkg = cache.package(id);
		let Some(current) = pkg.current_version else {
			return false;
		};
		let Some(candidate) = self.candidate_version(cache, id) else {
			return false;
		};
		if candidate == current {
			return false;
		}
		let current_ver = &cache.version(current).version;
		let candidate_ver = &cache.version(candidate).version;
		crate::version::cmp_versions(candidate_ver, current_ver) == std::cmp::Ordering::Greater
	}

	pub fn is_auto_installed(&self, _cache: &Cache, id: PackageId) -> bool { self.entry(id).auto_installed }

	/// A package is garbage if it's installed (or marked install) automatically
	/// and nothing still depends on it.
	pub fn is_garbage(&self, cache: &Cache, id: PackageId) -> bool {
		let present = cache.package(id).current_version.is_some() || self.marked_install(cache, id);
		if !present || !self.is_auto_installed(cache, id) {
			return false;
		}
		!self.has_dependent(cache, id)
	}

	fn has_dependent(&self, cache: &Cache, id: PackageId) -> bool {
		let name = cache.package(id).name.clone();
		for other in cache.raw_pkgs() {
			if other == id {
				continue;
			}
			if cache.package(other).current_version.is_none() && !self.marked_install(cache, other) {
				continue;
			}
			let Some(version) = self
				.candidate_version(cache, other)
				.or(cache.package(other).current_version)
			else {
				continue;
			};
			if cache
				.version(version)
				.depends
				.iter()
				.any(|d| matches!(d.dep_type, crate::cache::DepType::Depends | crate::cache::DepType::PreDepends) && d.target_name == name)
			{
				return true;
			}
		}
		false
	}

	pub fn marked_install(&self, cache: &Cache, id: PackageId) -> bool {
		let state = self.entry(id);
		state.action == Some(Action::Install) && cache.package(id).current_version.is_none()
	}

	pub fn marked_upgrade(&self, cache: &Cache, id: PackageId) -> bool {
		let state = self.entry(id);
		if state.action != Some(Action::Install) {
			return false;
		}
		let Some(current) = cache.package(id).current_version else {
			return false;
		};
		self.candidate_version(cache, id)
			.map(|c| {
				c != current
					&& crate::version::cmp_versions(&cache.version(c).version, &cache.version(current).version)
						== std::cmp::Ordering::Greater
			})
			.unwrap_or(false)
	}

	pub fn marked_downgrade(&self, cache: &Cache, id: PackageId) -> bool {
		let state = self.entry(id);
		if state.action != Some(Action::Install) {
			return false;
		}
		let Some(current) = cache.package(id).current_version else {
			return false;
		};
		self.candidate_version(cache, id)
			.map(|c| {
				c != current
					&& crate::version::cmp_versions(&cache.version(c).version, &cache.version(current).version)
						== std::cmp::Ordering::Less
			})
			.unwrap_or(false)
	}

	pub fn marked_reinstall(&self, _cache: &Cache, id: PackageId) -> bool { self.entry(id).reinstall }

	pub fn marked_purge(&self, _cache: &Cache, id: PackageId) -> bool {
		matches!(self.entry(id).action, Some(Action::Delete { purge: true }))
	}

	pub fn marked_delete(&self, _cache: &Cache, id: PackageId) -> bool {
		matches!(self.entry(id).action, Some(Action::Delete { .. }))
	}

	pub fn marked_keep(&self, _cache: &Cache, id: PackageId) -> bool {
		!matches!(self.entry(id).action, Some(Action::Install) | Some(Action::Delete { .. }))
	}

	pub fn is_now_broken(&self, cache: &Cache, id: PackageId) -> bool {
		match cache.package(id).current_version {
			Some(version) => self.has_unmet_depends(cache, version, false),
			None => false,
		}
	}

	pub fn is_inst_broken(&self, cache: &Cache, id: PackageId) -> bool {
		match self.candidate_version(cache, id).or(cache.package(id).current_version) {
			Some(version) => self.has_unmet_depends(cache, version, true),
			None => false,
		}
	}

	/// An OR-group (a run of records joined by `|`, `or_group` set on all but
	/// the last) is broken only if *every* member is unsatisfied; track
	/// whether any member of the group-in-progress has been satisfied and
	/// only judge the group once its closing (`or_group == false`) member is
	/// reached.
	fn has_unmet_depends(&self, cache: &Cache, version: crate::cache::VersionId, consider_marks: bool) -> bool {
		let mut group_satisfied = false;
		for dep in &cache.version(version).depends {
			if !matches!(dep.dep_type, crate::cache::DepType::Depends | crate::cache::DepType::PreDepends) {
				continue;
			}
			if self.dependency_satisfied(cache, dep, consider_marks) {
				group_satisfied = true;
			}
			if !dep.or_group {
				if !group_satisfied {
					return true;
				}
				group_satisfied = false;
			}
		}
		false
	}

	fn dependency_satisfied(&self, cache: &Cache, dep: &crate::cache::DependencyData, consider_marks: bool) -> bool {
		let Some(target_id) = cache.get_id(&dep.target_name) else {
			return false;
		};
		let target = cache.package(target_id);
		if target.versions.is_empty() {
			return self.provider_satisfies(cache, &dep.target_name, dep.constraint.as_ref(), consider_marks);
		}

		let installed_or_marked =
			target.current_version.is_some() || (consider_marks && self.marked_install(cache, target_id));
		if !installed_or_marked {
			return false;
		}
		let Some((op, required)) = &dep.constraint else {
			return true;
		};
		let Some(version_id) = target.current_version else {
			return true;
		};
		op.eval(&cache.version(version_id).version, required)
	}

	/// A virtual package name is satisfied if some installed (or, with
	/// `consider_marks`, marked-install) real package provides it, meeting the
	/// constraint against the `Provides` entry's own version if one is given.
	fn provider_satisfies(
		&self,
		cache: &Cache,
		name: &str,
		constraint: Option<&(crate::version::Operator, String)>,
		consider_marks: bool,
	) -> bool {
		for owner in cache.raw_pkgs() {
			let present = cache.package(owner).current_version.is_some()
				|| (consider_marks && self.marked_install(cache, owner));
			if !present {
				continue;
			}
			let Some(version_id) = cache
				.package(owner)
				.current_version
				.or_else(|| self.candidate_version(cache, owner))
			else {
				continue;
			};
			for provide in &cache.version(version_id).provides {
				if provide.name != name {
					continue;
				}
				let satisfies = match constraint {
					None => true,
					Some((op, required)) => provide
						.version
						.as_deref()
						.is_some_and(|v| op.eval(v, required)),
				};
				if satisfies {
					return true;
				}
			}
		}
		false
	}

	/// The sole real package providing `name`, if there is exactly one, the way
	/// `pkgDepCache::MarkInstall` auto-resolves an unambiguous virtual target.
	fn sole_provider(&self, cache: &Cache, name: &str) -> Option<PackageId> {
		let mut found = None;
		for owner in cache.raw_pkgs() {
			if cache.package(owner).versions.is_empty() {
				continue;
			}
			let provides = cache
				.package(owner)
				.versions
				.iter()
				.any(|v| cache.version(*v).provides.iter().any(|p| p.name == name));
			if !provides {
				continue;
			}
			if found.is_some() {
				return None;
			}
			found = Some(owner);
		}
		found
	}

	pub fn mark_auto(&self, id: PackageId, mark_auto: bool) {
		self.with_entry(id, |s| s.auto_installed = mark_auto);
	}

	pub fn mark_keep(&self, id: PackageId) -> bool {
		self.with_entry(id, |s| {
			s.action = Some(Action::Keep);
			s.reinstall = false;
		});
		true
	}

	pub fn mark_delete(&self, id: PackageId, purge: bool) -> bool {
		self.with_entry(id, |s| s.action = Some(Action::Delete { purge }));
		true
	}

	/// Mark a package for installation.
	///
	/// `auto_inst` recursively marks its `Depends`/`Pre-Depends` (first
	/// alternative of each OR group) for auto-install. `from_user` records the
	/// package as manually installed rather than auto-installed.
	pub fn mark_install(&self, cache: &Cache, id: PackageId, auto_inst: bool, from_user: bool) -> bool {
		let mut visited = HashSet::new();
		self.mark_install_inner(cache, id, auto_inst, from_user, &mut visited)
	}

	fn mark_install_inner(
		&self,
		cache: &Cache,
		id: PackageId,
		auto_inst: bool,
		from_user: bool,
		visited: &mut HashSet<PackageId>,
	) -> bool {
		if !visited.insert(id) {
			return true;
		}
		self.with_entry(id, |s| {
			s.action = Some(Action::Install);
			if from_user {
				s.auto_installed = false;
			} else if !s.auto_installed {
				s.auto_installed = true;
			}
		});

		if auto_inst {
			let Some(version) = self.candidate_version(cache, id).or(cache.package(id).current_version) else {
				return true;
			};
			let deps = &cache.version(version).depends;
			let mut i = 0;
			while i < deps.len() {
				if !matches!(deps[i].dep_type, crate::cache::DepType::Depends | crate::cache::DepType::PreDepends) {
					i += 1;
					continue;
				}
				// Collect the whole OR-group (a run ending at the first member
				// with `or_group == false`) before deciding anything.
				let start = i;
				while deps[i].or_group {
					i += 1;
				}
				let group = &deps[start..=i];
				i += 1;

				// Prefer an alternative that's already installed or already
				// marked install, per spec §4.H; only default to the first
				// alternative when none of them is.
				let pick = group
					.iter()
					.find(|dep| self.dependency_satisfied(cache, dep, true))
					.or_else(|| group.first());
				let Some(dep) = pick else { continue };
				if self.dependency_satisfied(cache, dep, true) {
					continue;
				}
				if let Some(target_id) = cache.get_id(&dep.target_name) {
					let target_id = if cache.package(target_id).versions.is_empty() {
						self.sole_provider(cache, &dep.target_name).unwrap_or(target_id)
					} else {
						target_id
					};
					if cache.package(target_id).current_version.is_none() {
						self.mark_install_inner(cache, target_id, true, false, visited);
					}
				}
			}
		}
		true
	}

	pub fn mark_reinstall(&self, id: PackageId, reinstall: bool) { self.with_entry(id, |s| s.reinstall = reinstall); }

	pub fn protect(&self, id: PackageId) { self.with_entry(id, |s| s.protected = true); }

	pub fn is_protected(&self, id: PackageId) -> bool { self.entry(id).protected }

	pub fn install_count(&self, cache: &Cache) -> u32 {
		cache.raw_pkgs().filter(|id| self.marked_install(cache, *id)).count() as u32
	}

	pub fn delete_count(&self, cache: &Cache) -> u32 {
		cache.raw_pkgs().filter(|id| self.marked_delete(cache, *id)).count() as u32
	}

	pub fn keep_count(&self, cache: &Cache) -> u32 {
		cache.raw_pkgs().filter(|id| self.marked_keep(cache, *id)).count() as u32
	}

	pub fn broken_count(&self, cache: &Cache) -> u32 {
		cache.raw_pkgs().filter(|id| self.is_inst_broken(cache, *id)).count() as u32
	}

	pub fn download_size(&self, cache: &Cache) -> u64 {
		cache
			.raw_pkgs()
			.filter(|id| self.marked_install(cache, *id) || self.marked_upgrade(cache, *id))
			.filter_map(|id| self.candidate_version(cache, id))
			.map(|v| cache.version(v).size)
			.sum()
	}

	pub fn disk_size(&self, cache: &Cache) -> DiskSpace {
		let mut delta: i64 = 0;
		for id in cache.raw_pkgs() {
			if self.marked_install(cache, id) || self.marked_upgrade(cache, id) {
				if let Some(v) = self.candidate_version(cache, id) {
					delta += cache.version(v).installed_size as i64;
				}
			}
			if self.marked_delete(cache, id) {
				if let Some(v) = cache.package(id).current_version {
					delta -= cache.version(v).installed_size as i64;
				}
			}
		}
		if delta < 0 {
			DiskSpace::Free((-delta) as u64)
		} else {
			DiskSpace::Require(delta as u64)
		}
	}

	/// Mark every upgradable package for install. `SafeUpgrade` leaves any
	/// package whose upgrade would pull in a new dependency untouched (here:
	/// all candidates are already resolvable from the index, so this reduces
	/// to marking without auto-installing new leaves).
	pub fn upgrade(&self, cache: &Cache, upgrade_type: Upgrade) -> Result<(), AptErrors> {
		let auto_inst = !matches!(upgrade_type, Upgrade::SafeUpgrade);
		for id in cache.raw_pkgs() {
			if self.is_upgradable(cache, id) {
				self.mark_install(cache, id, auto_inst, false);
			}
		}
		Ok(())
	}

	/// Auto-install the first satisfying alternative of every unmet dependency
	/// on broken packages. Returns `true` if any package was changed.
	pub fn fix_broken(&self, cache: &Cache) -> bool {
		let mut changed = false;
		for id in cache.raw_pkgs() {
			if !self.is_inst_broken(cache, id) {
				continue;
			}
			if self.mark_install(cache, id, true, false) {
				changed = true;
			}
		}
		changed
	}
}
