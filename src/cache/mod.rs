//! Contains Cache related structs: the in-memory Package Cache store and the
//! facade used to query and mutate it.
//!
//! Grounded on the teacher's `cache.rs` (kept the `Cache`/`PackageSort`/`Upgrade`
//! shapes and the `OnceCell`-memoized sub-object pattern) and on
//! `original_source/apt-pkg/pkgcache.h`'s package/version/dependency/file record
//! layout for the arena itself.
pub mod generator;

use std::cell::OnceCell;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::archive::ArchiveError;
use crate::config::Config;
use crate::depcache::DepCache;
use crate::error::AptErrors;
use crate::hash::HashStringList;
use crate::pkgmanager::{OrderResult, PackageManager};
use crate::policy::Policy;
use crate::progress::{AcquireProgress, InstallProgress};
use crate::records::{PackageRecords, SourceRecords};
use crate::resolver::ProblemResolver;
use crate::util::{apt_lock, apt_unlock, apt_unlock_inner};
use crate::version::Operator;

/// Opaque handle to a package stored in a [`Cache`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub(crate) u32);

/// Opaque handle to a version stored in a [`Cache`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VersionId(pub(crate) u32);

/// Opaque handle to a package file (an index file or local `.deb`) in a
/// [`Cache`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageFileId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepType {
	Depends,
	PreDepends,
	Suggests,
	Recommends,
	Conflicts,
	Replaces,
	Obsoletes,
	Breaks,
	Enhances,
}

impl DepType {
	pub fn parse(field: &str) -> Option<DepType> {
		match field {
			"Depends" => Some(DepType::Depends),
			"Pre-Depends" => Some(DepType::PreDepends),
			"Suggests" => Some(DepType::Suggests),
			"Recommends" => Some(DepType::Recommends),
			"Conflicts" => Some(DepType::Conflicts),
			"Replaces" => Some(DepType::Replaces),
			"Obsoletes" => Some(DepType::Obsoletes),
			"Breaks" => Some(DepType::Breaks),
			"Enhances" => Some(DepType::Enhances),
			_ => None,
		}
	}
}

impl AsRef<str> for DepType {
	fn as_ref(&self) -> &str {
		match self {
			DepType::Depends => "Depends",
			DepType::PreDepends => "PreDepends",
			DepType::Suggests => "Suggests",
			DepType::Recommends => "Recommends",
			DepType::Conflicts => "Conflicts",
			DepType::Replaces => "Replaces",
			DepType::Obsoletes => "Obsoletes",
			DepType::Breaks => "Breaks",
			DepType::Enhances => "Enhances",
		}
	}
}

/// A single dependency alternative: `target (op version)`. `or_group` is
/// `true` when this entry is followed by more alternatives joined by `|` in
/// the stanza it came from (all but the last of an OR group set it).
#[derive(Debug, Clone)]
pub struct DependencyData {
	pub dep_type: DepType,
	pub target_name: String,
	pub constraint: Option<(Operator, String)>,
	pub or_group: bool,
	/// Multiarch qualifier from `name:arch` (e.g. `libc6:amd64`), if present.
	pub target_arch: Option<String>,
	/// Raw `<profiles>` restriction text, if present. Not currently enforced
	/// against an active build-profile set (none is tracked); kept so a
	/// future profile-activation pass has the text to filter on.
	pub profiles: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ProvidesData {
	pub name: String,
	pub version: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VersionData {
	pub package: PackageId,
	pub version: String,
	pub arch: String,
	pub section: String,
	pub priority: String,
	pub multi_arch: String,
	pub size: u64,
	pub installed_size: u64,
	/// `Essential: yes`. Governs the resolver's unwillingness to remove the
	/// package (§4.I) unless an override is explicitly requested.
	pub essential: bool,
	pub depends: Vec<DependencyData>,
	pub provides: Vec<ProvidesData>,
	pub hashes: HashStringList,
	pub summary: Option<String>,
	pub description: Option<String>,
	/// Every index (or the status file) that lists this exact version,
	/// in the order it was merged. A version that only came from the local
	/// installed-status overlay and no configured index has this empty.
	pub files: Vec<PackageFileId>,
	pub filename: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PackageFileData {
	pub filename: String,
	pub archive: String,
	pub origin: String,
	pub label: String,
	pub site: String,
	pub component: String,
	pub architecture: String,
	pub index_type: String,
}

#[derive(Debug, Clone)]
pub struct PackageData {
	pub name: String,
	pub arch: String,
	/// Newest first.
	pub versions: Vec<VersionId>,
	/// The version recorded as currently installed (from dpkg status), if any.
	pub current_version: Option<VersionId>,
}

/// Selection of Upgrade type.
#[repr(i32)]
#[derive(Clone, Copy, Debug)]
pub enum Upgrade {
	/// Equivalent to `apt full-upgrade` / `apt-get dist-upgrade`.
	FullUpgrade = 0,
	/// Equivalent to `apt upgrade`.
	Upgrade = 1,
	/// Equivalent to `apt-get upgrade`.
	SafeUpgrade = 3,
}

/// Selection of how to sort.
#[derive(Clone, Copy, Debug)]
enum Sort {
	Disable,
	Enable,
	Reverse,
}

/// Determines how to sort/filter packages from the Cache.
#[derive(Clone, Debug)]
pub struct PackageSort {
	names: bool,
	upgradable: Sort,
	virtual_pkgs: Sort,
	installed: Sort,
	auto_installed: Sort,
	auto_removable: Sort,
}

impl Default for PackageSort {
	fn default() -> PackageSort {
		PackageSort {
			names: false,
			upgradable: Sort::Disable,
			virtual_pkgs: Sort::Disable,
			installed: Sort::Disable,
			auto_installed: Sort::Disable,
			auto_removable: Sort::Disable,
		}
	}
}

impl PackageSort {
	pub fn names(mut self) -> Self {
		self.names = true;
		self
	}

	pub fn upgradable(mut self) -> Self {
		self.upgradable = Sort::Enable;
		self
	}

	pub fn not_upgradable(mut self) -> Self {
		self.upgradable = Sort::Reverse;
		self
	}

	pub fn include_virtual(mut self) -> Self {
		self.virtual_pkgs = Sort::Enable;
		self
	}

	pub fn only_virtual(mut self) -> Self {
		self.virtual_pkgs = Sort::Reverse;
		self
	}

	pub fn installed(mut self) -> Self {
		self.installed = Sort::Enable;
		self
	}

	pub fn not_installed(mut self) -> Self {
		self.installed = Sort::Reverse;
		self
	}

	pub fn auto_installed(mut self) -> Self {
		self.auto_installed = Sort::Enable;
		self
	}

	pub fn manually_installed(mut self) -> Self {
		self.auto_installed = Sort::Reverse;
		self
	}

	pub fn auto_removable(mut self) -> Self {
		self.auto_removable = Sort::Enable;
		self
	}

	pub fn not_auto_removable(mut self) -> Self {
		self.auto_removable = Sort::Reverse;
		self
	}
}

/// The main struct for accessing any and all package metadata.
pub struct Cache {
	pub(crate) packages: Vec<PackageData>,
	pub(crate) versions: Vec<VersionData>,
	pub(crate) files: Vec<PackageFileData>,
	pub(crate) by_name: HashMap<String, PackageId>,
	pub(crate) config: Config,
	depcache: OnceCell<DepCache>,
	records: OnceCell<PackageRecords>,
	source_records: OnceCell<SourceRecords>,
	policy: OnceCell<Policy>,
	pkgmanager: OnceCell<PackageManager>,
	problem_resolver: OnceCell<ProblemResolver>,
	local_debs: Vec<String>,
}

impl Cache {
	/// Initialize the configuration system, open and return the cache.
	///
	/// Every `Packages` index already downloaded under `Dir::State::lists` for
	/// a configured `sources.list` entry is merged automatically (run
	/// [`Cache::update`] first to refresh them), followed by the local
	/// installed-status file.
	///
	/// `local_files` allows you to temporarily add local files to the cache, as
	/// long as they are one of the following:
	///
	/// - `*.deb` or `*.ddeb` files
	/// - `Packages` and `Sources` files from apt repositories
	pub fn new<T: AsRef<str>>(local_files: &[T]) -> Result<Cache, AptErrors> {
		let config = Config::new();
		let mut cache = Cache {
			packages: Vec::new(),
			versions: Vec::new(),
			files: Vec::new(),
			by_name: HashMap::new(),
			config,
			depcache: OnceCell::new(),
			records: OnceCell::new(),
			source_records: OnceCell::new(),
			policy: OnceCell::new(),
			pkgmanager: OnceCell::new(),
			problem_resolver: OnceCell::new(),
			local_debs: local_files
				.iter()
				.map(|f| f.as_ref())
				.filter(|f| f.ends_with(".deb") || f.ends_with(".ddeb"))
				.map(|f| f.to_string())
				.collect(),
		};

		// Ordering contract (spec §4.E): configured indexes merge first, in
		// `sources.list` order; any explicitly passed local files merge next;
		// the installed-status overlay is applied last so it augments
		// already-known versions instead of shadowing them.
		generator::load_configured_indexes(&mut cache)?;
		for file in local_files {
			generator::load_file(&mut cache, file.as_ref())?;
		}
		generator::load_dpkg_status(&mut cache)?;

		Ok(cache)
	}

	pub(crate) fn package(&self, id: PackageId) -> &PackageData { &self.packages[id.0 as usize] }

	pub(crate) fn version(&self, id: VersionId) -> &VersionData { &self.versions[id.0 as usize] }

	pub(crate) fn file(&self, id: PackageFileId) -> &PackageFileData {
		&self.files[id.0 as usize]
	}

	pub fn depcache(&self) -> &DepCache { self.depcache.get_or_init(|| DepCache::new(self)) }

	pub fn records(&self) -> &PackageRecords {
		self.records.get_or_init(|| PackageRecords::new(self))
	}

	pub fn source_records(&self) -> Result<&SourceRecords, AptErrors> {
		Ok(self.source_records.get_or_init(|| SourceRecords::new(self)))
	}

	pub fn policy(&self) -> &Policy { self.policy.get_or_init(|| Policy::new(self)) }

	pub fn pkg_manager(&self) -> &PackageManager {
		self.pkgmanager.get_or_init(PackageManager::new)
	}

	pub fn resolver(&self) -> &ProblemResolver {
		self.problem_resolver.get_or_init(ProblemResolver::new)
	}

	/// Iterate through every package id in the arena.
	pub(crate) fn raw_pkgs(&self) -> impl Iterator<Item = PackageId> + '_ {
		(0..self.packages.len()).map(|i| PackageId(i as u32))
	}

	/// An iterator of packages in the cache, filtered and ordered by `sort`.
	pub fn packages(&self, sort: &PackageSort) -> impl Iterator<Item = super::package::Package> {
		let mut pkg_list = vec![];
		for id in self.raw_pkgs() {
			let pkg = self.package(id);

			match sort.virtual_pkgs {
				Sort::Enable => {},
				Sort::Disable => {
					if pkg.versions.is_empty() {
						continue;
					}
				},
				Sort::Reverse => {
					if !pkg.versions.is_empty() {
						continue;
					}
				},
			}

			match sort.upgradable {
				Sort::Disable => {},
				Sort::Enable => {
					if pkg.current_version.is_none() || !self.depcache().is_upgradable(self, id) {
						continue;
					}
				},
				Sort::Reverse => {
					if pkg.current_version.is_some() && self.depcache().is_upgradable(self, id) {
						continue;
					}
				},
			}

			match sort.installed {
				Sort::Disable => {},
				Sort::Enable => {
					if pkg.current_version.is_none() {
						continue;
					}
				},
				Sort::Reverse => {
					if pkg.current_version.is_some() {
						continue;
					}
				},
			}

			match sort.auto_installed {
				Sort::Disable => {},
				Sort::Enable => {
					if !self.depcache().is_auto_installed(self, id) {
						continue;
					}
				},
				Sort::Reverse => {
					if self.depcache().is_auto_installed(self, id) {
						continue;
					}
				},
			}

			match sort.auto_removable {
				Sort::Disable => {},
				Sort::Enable => {
					if !self.depcache().is_garbage(self, id) {
						continue;
					}
				},
				Sort::Reverse => {
					if self.depcache().is_garbage(self, id) {
						continue;
					}
				},
			}

			pkg_list.push(id);
		}

		if sort.names {
			pkg_list.sort_by_cached_key(|id| self.package(*id).name.clone());
		}

		pkg_list
			.into_iter()
			.map(|id| super::package::Package::new(self, id))
	}

	/// Get the opaque id of a single package by name, optionally `name:arch`.
	pub(crate) fn get_id(&self, name: &str) -> Option<PackageId> {
		let (base, arch) = match name.split_once(':') {
			Some((b, a)) => (b, Some(a)),
			None => (name, None),
		};
		if let Some(arch) = arch {
			self.raw_pkgs()
				.find(|id| self.package(*id).name == base && self.package(*id).arch == arch)
		} else {
			self.by_name.get(base).copied()
		}
	}

	/// Get a single package by name, optionally `name:arch`.
	pub fn get(&self, name: &str) -> Option<super::package::Package> {
		let id = self.get_id(name)?;
		Some(super::package::Package::new(self, id))
	}

	/// Packages that will be altered when [`Cache::commit`] is called.
	pub fn get_changes(&self, sort_name: bool) -> Vec<super::package::Package> {
		let mut changed = Vec::new();
		let depcache = self.depcache();

		for id in self.raw_pkgs() {
			if depcache.marked_install(self, id)
				|| depcache.marked_delete(self, id)
				|| depcache.marked_upgrade(self, id)
				|| depcache.marked_downgrade(self, id)
				|| depcache.marked_reinstall(self, id)
			{
				changed.push(id);
			}
		}

		if sort_name {
			changed.sort_by_cached_key(|id| self.package(*id).name.clone());
		}

		changed
			.into_iter()
			.map(|id| super::package::Package::new(self, id))
			.collect()
	}

	/// Updates the package cache by re-acquiring configured index files.
	///
	/// This does not mutate `self`; a fresh [`Cache::new`] picks up the
	/// refreshed index files written under `Dir::State::lists`.
	pub fn update(&self, progress: &mut AcquireProgress) -> Result<(), AptErrors> {
		let items = crate::sourceslist::update_items(&self.config).map_err(|e| AptErrors::from(e.to_string()))?;
		crate::acquire::fetch(&self.config, items, progress)
	}

	/// Mark all packages for upgrade.
	pub fn upgrade(&self, upgrade_type: Upgrade) -> Result<(), AptErrors> {
		self.depcache().upgrade(self, upgrade_type)
	}

	/// Resolve dependencies with the changes marked on all packages.
	#[allow(clippy::result_unit_err)]
	pub fn resolve(&self, fix_broken: bool) -> Result<(), AptErrors> {
		self.resolver().resolve(self, fix_broken)
	}

	/// Mark every package for its candidate and resolve the fallout, the way
	/// `apt-get dist-upgrade` does.
	pub fn dist_upgrade(&self) -> Result<(), AptErrors> { self.resolver().dist_upgrade(self) }

	/// Repair broken packages without marking anything new beyond what's
	/// needed to satisfy dependencies.
	pub fn fix_broken(&self) -> Result<(), AptErrors> { self.resolver().fix_broken(self) }

	/// Fetch any archives needed to complete the transaction.
	pub fn get_archives(&self, progress: &mut AcquireProgress) -> Result<(), AptErrors> {
		self.pkg_manager().get_archives(self, progress)
	}

	/// Install, remove, and do any other actions requested by the cache.
	pub fn do_install(&self, progress: &mut InstallProgress) -> Result<(), AptErrors> {
		match self.pkg_manager().do_install(self, progress)? {
			OrderResult::Completed => Ok(()),
			OrderResult::Failed => Err(AptErrors::from(
				"DoInstall failed with no error reported".to_string(),
			)),
			OrderResult::Incomplete => Err(AptErrors::from(
				"installation is incomplete; media swap requested".to_string(),
			)),
		}
	}

	/// Handle `get_archives` and `do_install` in an easy wrapper.
	pub fn commit(
		&self,
		progress: &mut AcquireProgress,
		install_progress: &mut InstallProgress,
	) -> Result<(), AptErrors> {
		apt_lock()?;

		let archive_dir = self
			.config
			.dir("Dir::Cache::Archives", "/var/cache/apt/archives/");

		for deb in &self.local_debs {
			if let Some(filename) = Path::new(deb).file_name() {
				fs::copy(deb, archive_dir.to_string() + &filename.to_string_lossy())?;
			}
		}

		self.get_archives(progress)?;
		apt_unlock_inner();
		self.do_install(install_progress)?;
		apt_unlock();
		Ok(())
	}
}

impl From<ArchiveError> for AptErrors {
	fn from(err: ArchiveError) -> Self { AptErrors::from(err.to_string()) }
}
