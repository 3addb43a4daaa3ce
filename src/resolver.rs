//! Dependency resolution: turning a set of marks into a consistent,
//! dependency-satisfying transaction.
//!
//! Grounded on the teacher's `resolver.rs` (kept the `ProblemResolver`
//! facade: `protect`/`resolve`) and `original_source/apt-pkg/algorithms.cc`'s
//! `pkgProblemResolver::Resolve` (scoring packages by essential-ness/install
//! state/priority, then walking them in that order trying upgrade, downgrade,
//! provider-install and finally removal) and `pkgAllUpgrade`/`pkgDistUpgrade`
//! for the `dist_upgrade` entry point.
use tracing::{debug, warn};

use crate::cache::{Cache, PackageId, Upgrade};
use crate::error::{AptErrorKind, AptErrors};

/// The bound on the fixed-point loop before giving up.
const MAX_PASSES: u32 = 10;

/// Drives dependency resolution over a [`Cache`]'s marks.
#[derive(Debug, Default)]
pub struct ProblemResolver;

impl ProblemResolver {
	pub(crate) fn new() -> Self { ProblemResolver }

	/// Protect a package from being altered by [`ProblemResolver::resolve`].
	pub fn protect(&self, cache: &Cache, id: PackageId) { cache.depcache().protect(id); }

	/// Resolve dependencies for the changes currently marked on `cache`.
	///
	/// If `fix_broken` is set, broken packages are auto-installed before the
	/// main pass runs. This is the "minimal changes" entry point: it only
	/// acts on packages that are already broken.
	pub fn resolve(&self, cache: &Cache, fix_broken: bool) -> Result<(), AptErrors> {
		if fix_broken {
			cache.depcache().fix_broken(cache);
		}
		self.run(cache, false)
	}

	/// Repair every broken package without marking anything new for install
	/// beyond what's needed to satisfy dependencies, as its own top-level
	/// operation (distinct from [`ProblemResolver::resolve`]'s optional flag).
	pub fn fix_broken(&self, cache: &Cache) -> Result<(), AptErrors> {
		for _ in 0..MAX_PASSES {
			if !cache.depcache().fix_broken(cache) {
				break;
			}
		}
		self.check_unresolved(cache)
	}

	/// Mark every package for its highest-priority candidate, auto-installing
	/// new dependencies as needed, then run the same remedy pass `resolve`
	/// does to settle any fallout. Mirrors `apt-get dist-upgrade`: unlike
	/// `resolve`, this actively pulls packages toward their candidate rather
	/// than only touching what's already broken.
	pub fn dist_upgrade(&self, cache: &Cache) -> Result<(), AptErrors> {
		cache.depcache().upgrade(cache, Upgrade::FullUpgrade)?;
		self.run(cache, true)
	}

	/// Order the broken set by [`score`] (highest first) and, per package,
	/// try the spec's remedy sequence: upgrade to candidate, downgrade to an
	/// older installable version, install a provider, or (only for
	/// non-essential, unprotected packages, and only when `allow_removal`)
	/// mark for removal. Repeats until nothing changes or `MAX_PASSES` is hit.
	fn run(&self, cache: &Cache, allow_removal: bool) -> Result<(), AptErrors> {
		let depcache = cache.depcache();

		for _ in 0..MAX_PASSES {
			let mut broken: Vec<PackageId> = cache
				.raw_pkgs()
				.filter(|id| !depcache.is_protected(*id) && !depcache.marked_delete(cache, *id))
				.filter(|id| depcache.is_inst_broken(cache, *id))
				.collect();
			if broken.is_empty() {
				break;
			}
			broken.sort_by_key(|id| std::cmp::Reverse(score(cache, *id)));

			let mut changed = false;
			for id in broken {
				if try_remedies(cache, id, allow_removal) {
					changed = true;
				}
			}
			if !changed {
				break;
			}
		}

		self.check_unresolved(cache)
	}

	fn check_unresolved(&self, cache: &Cache) -> Result<(), AptErrors> {
		let unresolved: Vec<&str> = cache
			.raw_pkgs()
			.filter(|id| !cache.depcache().is_protected(*id) && cache.depcache().is_inst_broken(cache, *id))
			.map(|id| cache.package(id).name.as_str())
			.collect();

		if unresolved.is_empty() {
			debug!("resolved with zero broken packages");
			Ok(())
		} else {
			warn!(count = unresolved.len(), "unresolved broken packages after resolve");
			Err(AptErrorKind::Unresolvable(unresolved.join(", ")).into())
		}
	}
}

/// Weight for the `Priority` field, matching `apt-pkg/pkgcache.cc`'s
/// `VerIterator::PriorityType` ordering (required outranks important
/// outranks standard outranks optional/extra).
fn priority_weight(priority: &str) -> i64 {
	match priority {
		"required" => 4,
		"important" => 3,
		"standard" => 2,
		"optional" => 1,
		_ => 0,
	}
}

/// Blend essential-ness, current install status, `Priority`, upgradability
/// and explicit protection into a single ranking key (§4.I step 1). Higher
/// sorts first: protected and essential packages are worked on before
/// anything that might need to make way for them, and already-installed
/// packages before pure new installs.
fn score(cache: &Cache, id: PackageId) -> i64 {
	let depcache = cache.depcache();
	let mut score = 0i64;

	if depcache.is_protected(id) {
		score += 100_000;
	}

	let pkg = cache.package(id);
	if let Some(current) = pkg.current_version {
		if cache.version(current).essential {
			score += 10_000;
		}
		score += 1_000;
		score += priority_weight(&cache.version(current).priority);
	}

	if depcache.is_upgradable(cache, id) {
		score += 10;
	}

	score
}

/// Try, in order: (a) upgrade to the candidate, (b) downgrade to an older
/// installable version, (c) install a provider of an unsatisfied dependency,
/// (d) mark for removal. (d) only fires when `allow_removal` is set and the
/// package is neither protected nor essential. Returns whether any mark
/// changed.
fn try_remedies(cache: &Cache, id: PackageId, allow_removal: bool) -> bool {
	let depcache = cache.depcache();

	if let Some(candidate) = depcache.candidate_version(cache, id) {
		if cache.package(id).current_version != Some(candidate) && depcache.mark_install(cache, id, true, false) {
			return true;
		}
	}

	if try_downgrade(cache, id) {
		return true;
	}

	if try_install_provider(cache, id) {
		return true;
	}

	if allow_removal {
		let essential = cache.package(id).current_version.is_some_and(|v| cache.version(v).essential);
		if !essential && depcache.mark_delete(id, false) {
			return true;
		}
	}

	false
}

/// Pin the candidate to the newest version older than the current candidate
/// that isn't itself broken, and mark install. This is apt's "hold the line"
/// fallback when the newest available version can't satisfy its own deps.
fn try_downgrade(cache: &Cache, id: PackageId) -> bool {
	let depcache = cache.depcache();
	let Some(candidate) = depcache.candidate_version(cache, id) else {
		return false;
	};
	for version in cache.package(id).versions.iter().copied() {
		if version == candidate {
			continue;
		}
		if crate::version::cmp_versions(&cache.version(version).version, &cache.version(candidate).version)
			!= std::cmp::Ordering::Less
		{
			continue;
		}
		cache.policy().set_candidate(cache, version);
		if depcache.mark_install(cache, id, true, false) && !depcache.is_inst_broken(cache, id) {
			return true;
		}
	}
	false
}

/// If `id`'s candidate has an unmet `Depends`/`Pre-Depends` naming a virtual
/// package with exactly one real provider, install that provider.
fn try_install_provider(cache: &Cache, id: PackageId) -> bool {
	let depcache = cache.depcache();
	let Some(version) = depcache.candidate_version(cache, id) else {
		return false;
	};
	for dep in &cache.version(version).depends {
		if !matches!(dep.dep_type, crate::cache::DepType::Depends | crate::cache::DepType::PreDepends) {
			continue;
		}
		let Some(target_id) = cache.get_id(&dep.target_name) else {
			continue;
		};
		if !cache.package(target_id).versions.is_empty() {
			continue;
		}
		// A virtual name: find its sole provider, if any, and install it.
		let providers: Vec<PackageId> = cache
			.raw_pkgs()
			.filter(|owner| {
				cache
					.package(*owner)
					.versions
					.iter()
					.any(|v| cache.version(*v).provides.iter().any(|p| p.name == dep.target_name))
			})
			.collect();
		if providers.len() == 1 && depcache.mark_install(cache, providers[0], true, false) {
			return true;
		}
	}
	false
}
