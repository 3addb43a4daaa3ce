//! Contains Package, Version and Dependency structs: the query-facing view
//! over a [`Cache`]'s arena.
//!
//! Grounded on the teacher's `package.rs` (kept the `Package`/`Version`/
//! `BaseDep`/`Dependency`/`Provider` shape and the `rdepends_map`/
//! `depends_map` OR-group grouping), with the cxx `RawPackage`/`RawVersion`
//! handles it wrapped replaced by the arena's `PackageId`/`VersionId`.
use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::cache::{Cache, DepType, DependencyData, PackageId, VersionId};
use crate::version::cmp_versions;

pub struct Package<'a> {
	pub(crate) cache: &'a Cache,
	pub(crate) id: PackageId,
	rdepends_map: OnceCell<HashMap<DepType, Vec<Dependency<'a>>>>,
}

impl<'a> Package<'a> {
	pub fn new(cache: &'a Cache, id: PackageId) -> Package<'a> {
		Package {
			cache,
			id,
			rdepends_map: OnceCell::new(),
		}
	}

	/// The name of the package, without architecture qualification.
	pub fn name(&self) -> &str { &self.cache.package(self.id).name }

	/// The architecture of the package, e.g. `amd64`.
	pub fn arch(&self) -> &str { &self.cache.package(self.id).arch }

	/// `name:arch`, or just `name` when `pretty` is set and the architecture
	/// is the native one or `all`.
	pub fn fullname(&self, pretty: bool) -> String {
		if pretty && (self.arch() == "all" || self.cache.config.get_architectures().first().map(String::as_str) == Some(self.arch())) {
			self.name().to_string()
		} else {
			format!("{}:{}", self.name(), self.arch())
		}
	}

	/// `true` if the package has no real versions (it only exists as the
	/// target of a `Provides`).
	pub fn is_virtual(&self) -> bool { self.cache.package(self.id).versions.is_empty() }

	/// `true` if the package has a currently installed version.
	pub fn is_installed(&self) -> bool { self.cache.package(self.id).current_version.is_some() }

	/// Returns a Reverse Dependency Map of the package.
	///
	/// Dependencies are in a `Vec<Dependency>`. The `Dependency` struct
	/// represents an Or Group of dependencies; the base deps are in
	/// `Dependency.base_deps`.
	pub fn rdepends_map(&self) -> &HashMap<DepType, Vec<Dependency<'a>>> {
		self.rdepends_map.get_or_init(|| {
			let mut map: HashMap<DepType, Vec<Dependency>> = HashMap::new();
			for owner in self.cache.raw_pkgs() {
				for version in self.cache.package(owner).versions.iter().copied() {
					for dep in &self.cache.version(version).depends {
						if dep.target_name == self.name() {
							map.entry(dep.dep_type).or_default().push(Dependency {
								base_deps: vec![BaseDep::reverse(self.cache, owner, dep.clone())],
							});
						}
					}
				}
			}
			map
		})
	}

	/// Return a specific version by version string, if one exists.
	pub fn get_version(&self, version_str: &str) -> Option<Version<'a>> {
		self.cache
			.package(self.id)
			.versions
			.iter()
			.copied()
			.find(|v| self.cache.version(*v).version == version_str)
			.map(|v| Version::new(self.cache, v))
	}

	/// The currently installed version, if any.
	pub fn installed(&self) -> Option<Version<'a>> {
		self.cache
			.package(self.id)
			.current_version
			.map(|v| Version::new(self.cache, v))
	}

	/// The candidate version chosen by policy pinning, if any.
	pub fn candidate(&self) -> Option<Version<'a>> {
		self.cache
			.depcache()
			.candidate_version(self.cache, self.id)
			.map(|v| Version::new(self.cache, v))
	}

	/// Every version, newest first.
	pub fn versions(&self) -> impl Iterator<Item = Version<'a>> + '_ {
		self.cache
			.package(self.id)
			.versions
			.iter()
			.copied()
			.map(|v| Version::new(self.cache, v))
	}

	/// Every real package that provides this (usually virtual) package name.
	pub fn provides(&self) -> Vec<Provider<'a>> {
		let name = self.name().to_string();
		let mut out = Vec::new();
		for owner in self.cache.raw_pkgs() {
			for version in self.cache.package(owner).versions.iter().copied() {
				for prov in &self.cache.version(version).provides {
					if prov.name == name {
						out.push(Provider::new(self.cache, prov.name.clone(), owner, version, prov.version.clone()));
					}
				}
			}
		}
		out
	}

	pub fn is_upgradable(&self) -> bool {
		self.is_installed() && self.cache.depcache().is_upgradable(self.cache, self.id)
	}

	pub fn is_auto_installed(&self) -> bool { self.cache.depcache().is_auto_installed(self.cache, self.id) }

	pub fn is_auto_removable(&self) -> bool {
		(self.is_installed() || self.marked_install()) && self.cache.depcache().is_garbage(self.cache, self.id)
	}

	pub fn is_now_broken(&self) -> bool { self.cache.depcache().is_now_broken(self.cache, self.id) }

	pub fn is_inst_broken(&self) -> bool { self.cache.depcache().is_inst_broken(self.cache, self.id) }

	pub fn marked_install(&self) -> bool { self.cache.depcache().marked_install(self.cache, self.id) }

	pub fn marked_upgrade(&self) -> bool { self.cache.depcache().marked_upgrade(self.cache, self.id) }

	pub fn marked_purge(&self) -> bool { self.cache.depcache().marked_purge(self.cache, self.id) }

	pub fn marked_delete(&self) -> bool { self.cache.depcache().marked_delete(self.cache, self.id) }

	pub fn marked_keep(&self) -> bool { self.cache.depcache().marked_keep(self.cache, self.id) }

	pub fn marked_downgrade(&self) -> bool { self.cache.depcache().marked_downgrade(self.cache, self.id) }

	pub fn marked_reinstall(&self) -> bool { self.cache.depcache().marked_reinstall(self.cache, self.id) }

	/// Mark the package as automatically (or manually) installed.
	pub fn mark_auto(&self, mark_auto: bool) -> bool {
		self.cache.depcache().mark_auto(self.id, mark_auto);
		true
	}

	/// Mark the package to stay at its current version.
	pub fn mark_keep(&self) -> bool { self.cache.depcache().mark_keep(self.id) }

	/// Mark the package for removal, optionally purging configuration files.
	pub fn mark_delete(&self, purge: bool) -> bool { self.cache.depcache().mark_delete(self.id, purge) }

	/// Mark the package for installation.
	pub fn mark_install(&self, auto_inst: bool, from_user: bool) -> bool {
		self.cache.depcache().mark_install(self.cache, self.id, auto_inst, from_user)
	}

	/// Mark (or unmark) the package for reinstallation.
	pub fn mark_reinstall(&self, reinstall: bool) -> bool {
		self.cache.depcache().mark_reinstall(self.id, reinstall);
		true
	}

	/// Protect this package's state for [`crate::cache::Cache::resolve`].
	pub fn protect(&self) { self.cache.resolver().protect(self.cache, self.id); }
}

impl<'a> PartialEq for Package<'a> {
	fn eq(&self, other: &Self) -> bool { self.id == other.id }
}

impl<'a> Eq for Package<'a> {}

impl<'a> Hash for Package<'a> {
	fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state); }
}

impl<'a> fmt::Display for Package<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.name()) }
}

impl<'a> fmt::Debug for Package<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let versions: Vec<Version> = self.versions().collect();
		f.debug_struct("Package")
			.field("name", &self.name())
			.field("arch", &self.arch())
			.field("virtual", &self.is_virtual())
			.field("versions", &versions)
			.finish_non_exhaustive()
	}
}

pub struct Version<'a> {
	cache: &'a Cache,
	pub(crate) id: VersionId,
	depends_map: OnceCell<HashMap<DepType, Vec<Dependency<'a>>>>,
}

impl<'a> Version<'a> {
	pub fn new(cache: &'a Cache, id: VersionId) -> Version<'a> {
		Version {
			cache,
			id,
			depends_map: OnceCell::new(),
		}
	}

	pub fn version(&self) -> &str { &self.cache.version(self.id).version }

	pub fn arch(&self) -> &str { &self.cache.version(self.id).arch }

	pub fn section(&self) -> &str { &self.cache.version(self.id).section }

	pub fn priority_str(&self) -> &str { &self.cache.version(self.id).priority }

	pub fn multi_arch(&self) -> &str { &self.cache.version(self.id).multi_arch }

	pub fn size(&self) -> u64 { self.cache.version(self.id).size }

	pub fn installed_size(&self) -> u64 { self.cache.version(self.id).installed_size }

	/// Returns the version's parent package.
	pub fn parent(&self) -> Package<'a> { Package::new(self.cache, self.cache.version(self.id).package) }

	pub fn is_installed(&self) -> bool { self.parent().installed().is_some_and(|v| v.id == self.id) }

	/// Every virtual package name this version declares it provides.
	pub fn provides(&self) -> impl Iterator<Item = Provider<'a>> + '_ {
		let pkg_id = self.cache.version(self.id).package;
		self.cache
			.version(self.id)
			.provides
			.iter()
			.map(move |p| Provider::new(self.cache, p.name.clone(), pkg_id, self.id, p.version.clone()))
	}

	/// Returns a reference to the dependency map owned by the version.
	///
	/// Dependencies are in a `Vec<Dependency>`. The `Dependency` struct
	/// represents an Or Group of dependencies; the base deps are in
	/// `Dependency.base_deps`.
	pub fn depends_map(&self) -> &HashMap<DepType, Vec<Dependency<'a>>> {
		self.depends_map.get_or_init(|| {
			let pkg_id = self.cache.version(self.id).package;
			build_depends_map(self.cache, pkg_id, &self.cache.version(self.id).depends)
		})
	}

	pub fn get_depends(&self, key: &DepType) -> Option<&Vec<Dependency<'a>>> { self.depends_map().get(key) }

	pub fn enhances(&self) -> Option<&Vec<Dependency<'a>>> { self.get_depends(&DepType::Enhances) }

	/// Both `Depends` and `Pre-Depends`, combined.
	pub fn dependencies(&self) -> Option<Vec<&Dependency<'a>>> {
		let mut ret_vec: Vec<&Dependency> = Vec::new();
		if let Some(dep_list) = self.get_depends(&DepType::Depends) {
			ret_vec.extend(dep_list);
		}
		if let Some(dep_list) = self.get_depends(&DepType::PreDepends) {
			ret_vec.extend(dep_list);
		}
		if ret_vec.is_empty() { None } else { Some(ret_vec) }
	}

	pub fn recommends(&self) -> Option<&Vec<Dependency<'a>>> { self.get_depends(&DepType::Recommends) }

	pub fn suggests(&self) -> Option<&Vec<Dependency<'a>>> { self.get_depends(&DepType::Suggests) }

	/// Get the long description.
	pub fn description(&self) -> Option<String> { self.cache.records().long_desc(self.cache, self.id) }

	/// Get the short description (summary line).
	pub fn summary(&self) -> Option<String> { self.cache.records().short_desc(self.cache, self.id) }

	/// Get data from the specified record field.
	pub fn get_record(&self, field: &str) -> Option<String> {
		self.cache.records().get_field(self.cache, self.id, field)
	}

	/// Get the hash of the given type, e.g. `version.hash("sha256")`.
	pub fn hash(&self, hash_type: &str) -> Option<String> {
		self.cache.records().hash_find(self.cache, self.id, hash_type)
	}

	pub fn sha256(&self) -> Option<String> { self.hash("sha256") }

	pub fn sha512(&self) -> Option<String> { self.hash("sha512") }

	/// The on-disk or remote-relative filename for this version's archive.
	pub fn filename(&self) -> Option<String> { self.cache.version(self.id).filename.clone() }

	/// The first package file (index origin) this version was merged from,
	/// if any. A version known from several indexes has more in
	/// [`Version::package_files`].
	pub fn package_file(&self) -> Option<&crate::cache::PackageFileData> {
		self.cache.version(self.id).files.first().map(|id| self.cache.file(*id))
	}

	/// Every package file (index origin, or the local status file) that
	/// lists this exact version.
	pub fn package_files(&self) -> impl Iterator<Item = &crate::cache::PackageFileData> + '_ {
		self.cache.version(self.id).files.iter().map(|id| self.cache.file(*id))
	}

	/// The URI this version would be fetched from, joining its package
	/// file's site with its relative filename.
	pub fn uri(&self) -> Option<String> {
		let filename = self.filename()?;
		match self.cache.version(self.id).files.first() {
			Some(file_id) => {
				let site = &self.cache.file(*file_id).site;
				if site.is_empty() {
					Some(format!("file://{filename}"))
				} else {
					Some(format!("{}/{}", site.trim_end_matches('/'), filename))
				}
			},
			None => Some(format!("file://{filename}")),
		}
	}

	/// Set this version as the package's candidate.
	pub fn set_candidate(&self) { self.cache.policy().set_candidate(self.cache, self.id); }

	/// The priority of the version as shown in `apt policy`.
	pub fn priority(&self) -> i32 {
		let pkg_id = self.cache.version(self.id).package;
		self.cache.policy().priority(self.cache, pkg_id, self.id)
	}
}

impl<'a> PartialEq for Version<'a> {
	fn eq(&self, other: &Self) -> bool { matches!(cmp_versions(self.version(), other.version()), Ordering::Equal) }
}

impl<'a> Eq for Version<'a> {}

impl<'a> PartialOrd for Version<'a> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(cmp_versions(self.version(), other.version())) }
}

impl<'a> Hash for Version<'a> {
	fn hash<H: Hasher>(&self, state: &mut H) { self.id.hash(state); }
}

impl<'a> fmt::Display for Version<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result { write!(f, "{}", self.version()) }
}

impl<'a> fmt::Debug for Version<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let parent = self.parent();
		let is_candidate = parent.candidate().is_some_and(|cand| cand.id == self.id);
		f.debug_struct("Version")
			.field("pkg", &parent.name())
			.field("arch", &self.arch())
			.field("version", &self.version())
			.field("is_candidate", &is_candidate)
			.field("is_installed", &self.is_installed())
			.finish_non_exhaustive()
	}
}

/// Build a dependency map from a flat `depends` list, grouping consecutive
/// `or_group` entries into one [`Dependency`] per alternative set.
fn build_depends_map<'a>(
	cache: &'a Cache,
	owner: PackageId,
	deps: &[DependencyData],
) -> HashMap<DepType, Vec<Dependency<'a>>> {
	let mut map: HashMap<DepType, Vec<Dependency>> = HashMap::new();
	let mut i = 0;
	while i < deps.len() {
		let mut group = vec![BaseDep::forward(cache, owner, deps[i].clone())];
		while deps[i].or_group {
			i += 1;
			group.push(BaseDep::forward(cache, owner, deps[i].clone()));
		}
		let dep_type = deps[i].dep_type;
		map.entry(dep_type).or_default().push(Dependency { base_deps: group });
		i += 1;
	}
	map
}

/// A single dependency alternative.
pub struct BaseDep<'a> {
	cache: &'a Cache,
	data: DependencyData,
	/// The package whose stanza this dependency came from.
	owner: PackageId,
	/// `true` when this `BaseDep` came from a reverse-dependency lookup, in
	/// which case [`BaseDep::target_package`] returns `owner` instead of the
	/// dependency's own target.
	reverse: bool,
}

impl<'a> BaseDep<'a> {
	fn forward(cache: &'a Cache, owner: PackageId, data: DependencyData) -> Self {
		BaseDep { cache, data, owner, reverse: false }
	}

	fn reverse(cache: &'a Cache, owner: PackageId, data: DependencyData) -> Self {
		BaseDep { cache, data, owner, reverse: true }
	}

	/// The name of the dependency (for a reverse dependency, the name of the
	/// package that declares it).
	pub fn name(&self) -> &str {
		if self.reverse {
			&self.cache.package(self.owner).name
		} else {
			&self.data.target_name
		}
	}

	/// The target package of the dependency.
	pub fn target_package(&self) -> Package<'a> {
		if self.reverse {
			Package::new(self.cache, self.owner)
		} else {
			let id = self.cache.get_id(&self.data.target_name).unwrap_or(self.owner);
			Package::new(self.cache, id)
		}
	}

	/// The target version constraint, if any.
	pub fn version(&self) -> Option<&str> { self.data.constraint.as_ref().map(|(_, v)| v.as_str()) }

	/// The comparison operator of the constraint, if any.
	pub fn comp(&self) -> Option<String> { self.data.constraint.as_ref().map(|(op, _)| op.to_string()) }

	pub fn dep_type(&self) -> DepType { self.data.dep_type }

	/// Every installed/candidate version able to satisfy this dependency.
	pub fn all_targets(&self) -> Vec<Version<'a>> {
		let Some(id) = self.cache.get_id(&self.data.target_name) else { return Vec::new() };
		self.cache
			.package(id)
			.versions
			.iter()
			.copied()
			.filter(|v| match &self.data.constraint {
				Some((op, required)) => op.eval(&self.cache.version(*v).version, required),
				None => true,
			})
			.map(|v| Version::new(self.cache, v))
			.collect()
	}
}

impl<'a> fmt::Display for BaseDep<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		if let (Some(comp), Some(version)) = (self.comp(), self.version()) {
			write!(f, "({} {comp} {version})", self.name())
		} else {
			write!(f, "({})", self.name())
		}
	}
}

impl<'a> fmt::Debug for BaseDep<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("BaseDep")
			.field("parent", &self.cache.package(self.owner).name)
			.field("name", &self.name())
			.field("comp", &self.comp())
			.field("version", &self.version())
			.field("dep_type", &self.dep_type())
			.field("is_reverse", &self.reverse)
			.finish()
	}
}

/// An Or-Group of dependencies: every [`BaseDep`] in `base_deps` can satisfy
/// it.
#[derive(Debug)]
pub struct Dependency<'a> {
	pub base_deps: Vec<BaseDep<'a>>,
}

impl<'a> Dependency<'a> {
	pub fn dep_type(&self) -> DepType { self.base_deps[0].dep_type() }

	pub fn is_or(&self) -> bool { self.base_deps.len() > 1 }

	pub fn first(&self) -> &BaseDep<'a> { &self.base_deps[0] }
}

impl<'a> fmt::Display for Dependency<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let mut dep_str = String::new();
		for (i, base_dep) in self.base_deps.iter().enumerate() {
			dep_str += &base_dep.to_string();
			if i + 1 != self.base_deps.len() {
				dep_str += " | ";
			}
		}
		write!(f, "{} {:?} {dep_str}", self.first().target_package().fullname(false), self.dep_type())
	}
}

/// One concrete package/version that provides a (usually virtual) name.
pub struct Provider<'a> {
	cache: &'a Cache,
	name: String,
	owner_pkg: PackageId,
	owner_ver: VersionId,
	provided_version: Option<String>,
}

impl<'a> Provider<'a> {
	fn new(
		cache: &'a Cache,
		name: String,
		owner_pkg: PackageId,
		owner_ver: VersionId,
		provided_version: Option<String>,
	) -> Self {
		Provider { cache, name, owner_pkg, owner_ver, provided_version }
	}

	/// The (usually virtual) name being provided.
	pub fn name(&self) -> &str { &self.name }

	/// The real package providing [`Provider::name`].
	pub fn package(&self) -> Package<'a> { Package::new(self.cache, self.owner_pkg) }

	/// The real version providing [`Provider::name`].
	pub fn version(&self) -> Version<'a> { Version::new(self.cache, self.owner_ver) }

	/// The version constraint attached to the `Provides` entry, if any.
	pub fn provided_version(&self) -> Option<&str> { self.provided_version.as_deref() }
}

impl<'a> fmt::Display for Provider<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		let version = self.version();
		write!(f, "{} provides {} {}", self.name(), version.parent().fullname(false), version.version())
	}
}

impl<'a> fmt::Debug for Provider<'a> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("Provider")
			.field("name", &self.name())
			.field("version", &self.version())
			.finish()
	}
}
