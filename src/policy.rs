//! Pin rules and candidate-version selection.
//!
//! Grounded on `original_source/apt-pkg/policy.h`'s `pkgPolicy::GetPriority`/
//! `GetCandidateVer` and `apt_preferences(5)`'s documented defaults (100 for
//! the already-installed version, 500 for everything else, 990 reserved for a
//! pin matching the target release), with the highest-priority version
//! becoming each package's candidate, ties broken by newest) and
//! `original_source/apt-pkg/deb/debmetaindex.cc`'s pin-file grammar, read here
//! from the `Preferences::N` subtree of [`crate::config::Config`] instead of
//! `/etc/apt/preferences`.
use std::cell::RefCell;
use std::collections::HashMap;

use regex::Regex;

use crate::cache::{Cache, PackageId, VersionId};

/// Default priority of the already-installed version: below [`PRIORITY_AVAILABLE`]
/// so a newer version from an index outranks it and becomes the candidate,
/// the way plain `apt upgrade` expects without any pinning in play.
const PRIORITY_INSTALLED: i32 = 100;
const PRIORITY_AVAILABLE: i32 = 500;
/// Priority assigned to a version manually pinned via [`Policy::set_candidate`].
const PRIORITY_MANUAL_CANDIDATE: i32 = 9990;

struct PinRule {
	pattern: Regex,
	priority: i32,
}

/// Computes each package's candidate version from pin rules plus the usual
/// installed/available priority scheme.
pub struct Policy {
	rules: Vec<PinRule>,
	overrides: RefCell<HashMap<PackageId, VersionId>>,
}

impl Policy {
	pub(crate) fn new(cache: &Cache) -> Self {
		let mut rules = Vec::new();
		let tree = cache.config.tree("Preferences");
		for entry in tree.iter() {
			let mut package = None;
			let mut priority = None;
			for field in entry.iter() {
				match field.tag() {
					Some("Package") => package = field.value(),
					Some("Pin-Priority") => priority = field.value().and_then(|v| v.parse().ok()),
					_ => {},
				}
			}
			if let (Some(package), Some(priority)) = (package, priority) {
				if let Some(pattern) = glob_to_regex(package) {
					rules.push(PinRule { pattern, priority });
				}
			}
		}
		Policy { rules, overrides: RefCell::new(HashMap::new()) }
	}

	/// Force `version_id` to be its package's candidate, overriding pin rules.
	pub(crate) fn set_candidate(&self, cache: &Cache, version_id: VersionId) {
		let pkg_id = cache.version(version_id).package;
		self.overrides.borrow_mut().insert(pkg_id, version_id);
	}

	/// The priority apt would assign `version_id` of `pkg_id`, after applying
	/// any matching pin rule on top of the installed/available base priority.
	pub fn priority(&self, cache: &Cache, pkg_id: PackageId, version_id: VersionId) -> i32 {
		if self.overrides.borrow().get(&pkg_id) == Some(&version_id) {
			return PRIORITY_MANUAL_CANDIDATE;
		}
		let base = if cache.package(pkg_id).current_version == Some(version_id) {
			PRIORITY_INSTALLED
		} else {
			PRIORITY_AVAILABLE
		};
		let name = &cache.package(pkg_id).name;
		self.rules
			.iter()
			.rev()
			.find(|rule| rule.pattern.is_match(name))
			.map(|rule| rule.priority)
			.unwrap_or(base)
	}

	/// The version with the highest pin priority for `pkg_id`, ties broken by
	/// newest version (the arena keeps each package's versions newest-first,
	/// so the first version reached at the top priority wins).
	pub fn candidate_version(&self, cache: &Cache, pkg_id: PackageId) -> Option<VersionId> {
		let mut best: Option<(i32, VersionId)> = None;
		for version in cache.package(pkg_id).versions.iter().copied() {
			let priority = self.priority(cache, pkg_id, version);
			let beats_current = match best {
				Some((best_priority, _)) => priority > best_priority,
				None => true,
			};
			if beats_current {
				best = Some((priority, version));
			}
		}
		best.map(|(_, version)| version)
	}
}

/// Translate a dpkg-style glob pattern (`*`, `?`) used in `Package:` pin
/// stanzas into an anchored regex.
fn glob_to_regex(glob: &str) -> Option<Regex> {
	let mut pattern = String::from("^");
	const META: &str = ".+()|[]{}^$\\";
	for c in glob.chars() {
		match c {
			'*' => pattern.push_str(".*"),
			'?' => pattern.push('.'),
			c if META.contains(c) => {
				pattern.push('\\');
				pattern.push(c);
			},
			c => pattern.push(c),
		}
	}
	pattern.push('$');
	Regex::new(&pattern).ok()
}

#[cfg(test)]
mod tests {
	use std::io::Write as _;

	use tempfile::NamedTempFile;

	use super::*;
	use crate::config::Config;

	#[test]
	fn candidate_ties_favor_newest_version() {
		let config = Config::new_clear();
		config.set("Dir::State::status", "/nonexistent-rust-apt-test-status");

		let mut packages = NamedTempFile::new().unwrap();
		writeln!(
			packages,
			"Package: foo\nVersion: 2.0\nArchitecture: amd64\n\nPackage: foo\nVersion: 1.0\nArchitecture: amd64\n"
		)
		.unwrap();

		let cache = crate::cache::Cache::new(&[packages.path().to_str().unwrap()]).unwrap();
		let pkg = cache.get("foo").unwrap();
		assert_eq!(pkg.candidate().unwrap().version(), "2.0");
	}
}
