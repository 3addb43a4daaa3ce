//! Builds the arena inside a [`Cache`] from the dpkg status file, `Packages`/
//! `Sources` index files, and local `.deb` archives.
//!
//! Grounded on `apt-pkg/pkgcachegen.cc`'s `pkgCacheGenerator::MergeListPackage`/
//! `MergeListVersion` (merging stanzas into the arena, one `PackageData` per
//! name+arch, versions kept newest-first) and `NewDepends` (splitting a
//! dependency field into consecutive `|`-joined OR-group records).
use std::fs;
use std::io::Read;
use std::path::Path;

use tracing::debug;

use super::{Cache, DepType, DependencyData, PackageData, PackageFileData, ProvidesData, VersionData};
use crate::archive::{ArchiveError, DebPackage};
use crate::error::AptErrors;
use crate::hash::HashString;
use crate::tagfile::{parse_tagfile, TagSection};
use crate::version::Operator;

/// Split a `Depends`-style field into OR groups: `"a, b | c, d"` becomes three
/// [`DependencyData`] records, with `b`'s `or_group` set to `true` since `c`
/// follows it in the same alternative. An alternative whose `[archlist]`
/// excludes `native_arch` is dropped entirely (spec §6: "evaluates to
/// absent"), and `or_group` is recomputed against the survivors so a dropped
/// middle alternative doesn't leave a dangling flag on its neighbor.
pub fn parse_dependency_field(dep_type: DepType, field: &str, native_arch: &str) -> Vec<DependencyData> {
	let mut out = Vec::new();
	for group in field.split(',') {
		let alts: Vec<&str> = group.split('|').map(str::trim).filter(|s| !s.is_empty()).collect();
		let mut survivors = Vec::new();
		for alt in &alts {
			let atom = parse_dependency_atom(alt);
			if archlist_excludes(atom.archlist.as_deref(), native_arch) {
				continue;
			}
			survivors.push(atom);
		}
		let last = survivors.len();
		for (i, atom) in survivors.into_iter().enumerate() {
			out.push(DependencyData {
				dep_type,
				target_name: atom.name,
				constraint: atom.constraint,
				or_group: i + 1 != last,
				target_arch: atom.arch,
				profiles: atom.profiles,
			});
		}
	}
	out
}

struct DependencyAtom {
	name: String,
	arch: Option<String>,
	constraint: Option<(Operator, String)>,
	archlist: Option<Vec<String>>,
	profiles: Option<String>,
}

/// Parse one `group` per spec §6's grammar:
/// `name [":" arch] ["(" op ver ")"] ["[" archlist "]"] ["<" profiles ">"]`.
/// `<` alone is accepted as a historical synonym for `<=`.
fn parse_dependency_atom(atom: &str) -> DependencyAtom {
	let mut work = atom.trim().to_string();

	let mut profiles = None;
	if let Some(open) = work.find('<') {
		if let Some(close_rel) = work[open..].find('>') {
			let close = open + close_rel;
			profiles = Some(work[open + 1..close].trim().to_string());
			work.replace_range(open..=close, "");
		}
	}

	let mut archlist = None;
	if let Some(open) = work.find('[') {
		if let Some(close_rel) = work[open..].find(']') {
			let close = open + close_rel;
			let list = work[open + 1..close].trim().to_string();
			archlist = Some(list.split_whitespace().map(str::to_string).collect());
			work.replace_range(open..=close, "");
		}
	}

	let mut constraint = None;
	if let Some(start) = work.find('(') {
		let head = work[..start].trim().to_string();
		let close = work.rfind(')').unwrap_or(work.len());
		let body = work[start + 1..close].trim().to_string();
		if let Some((op, version)) = body.split_once(char::is_whitespace) {
			let op = if op.trim() == "<" { "<=" } else { op.trim() };
			if let Some(operator) = Operator::parse(op) {
				constraint = Some((operator, version.trim().to_string()));
			}
		}
		work = head;
	}

	let (name, arch) = match work.trim().split_once(':') {
		Some((name, arch)) => (name.to_string(), Some(arch.to_string())),
		None => (work.trim().to_string(), None),
	};

	DependencyAtom { name, arch, constraint, archlist, profiles }
}

/// `true` if `archlist` is present and none of its entries (after wildcard
/// expansion) match `native_arch`. Supports the `any`, `linux-any`, and
/// `any-<cpu>`/`<os>-any` wildcard forms from dpkg-architecture's
/// `DEB_HOST_ARCH`/`DEB_HOST_ARCH_OS`/`DEB_HOST_ARCH_CPU` triad; a bare
/// architecture name matches only itself. A leading `!` negates the match
/// (present to round out the grammar; Debian practice mixes negated and
/// plain entries within one list).
fn archlist_excludes(archlist: Option<&[String]>, native_arch: &str) -> bool {
	let Some(list) = archlist else { return false };
	if list.is_empty() {
		return false;
	}
	if list.iter().all(|a| a.starts_with('!')) {
		// Blacklist form (`[!i386 !amd64]`): excluded iff the native arch
		// matches one of the negated entries.
		list.iter().any(|p| arch_matches(p.trim_start_matches('!'), native_arch))
	} else {
		// Whitelist form (`[i386 amd64]`): excluded unless the native arch
		// matches one of the listed entries.
		!list.iter().any(|p| arch_matches(p, native_arch))
	}
}

fn arch_matches(pattern: &str, native_arch: &str) -> bool {
	if pattern == "any" || pattern == native_arch {
		return true;
	}
	if let Some(cpu) = pattern.strip_prefix("any-") {
		return native_arch.ends_with(cpu);
	}
	if let Some(os) = pattern.strip_suffix("-any") {
		return native_arch.starts_with(os);
	}
	false
}

fn parse_provides_field(field: &str) -> Vec<ProvidesData> {
	field
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(|atom| {
			if let Some(start) = atom.find('(') {
				let name = atom[..start].trim().to_string();
				let rest = atom[start + 1..].trim_end_matches(')').trim();
				let version = rest.trim_start_matches('=').trim().to_string();
				ProvidesData {
					name,
					version: Some(version),
				}
			} else {
				ProvidesData {
					name: atom.to_string(),
					version: None,
				}
			}
		})
		.collect()
}

const DEP_FIELDS: &[(&str, DepType)] = &[
	("Pre-Depends", DepType::PreDepends),
	("Depends", DepType::Depends),
	("Recommends", DepType::Recommends),
	("Suggests", DepType::Suggests),
	("Conflicts", DepType::Conflicts),
	("Breaks", DepType::Breaks),
	("Replaces", DepType::Replaces),
	("Enhances", DepType::Enhances),
];

fn version_from_stanza(package_id: super::PackageId, stanza: &TagSection, native_arch: &str) -> VersionData {
	let mut depends = Vec::new();
	for (field, dep_type) in DEP_FIELDS {
		if let Some(value) = stanza.find(field) {
			depends.extend(parse_dependency_field(*dep_type, value, native_arch));
		}
	}

	let provides = stanza
		.find("Provides")
		.map(|v| parse_provides_field(v))
		.unwrap_or_default();

	let mut hashes = crate::hash::HashStringList::new();
	for field in ["MD5sum", "SHA1", "SHA256", "SHA512"] {
		if let Some(value) = stanza.find(field) {
			if let Some(h) = HashString::parse(&format!("{field}:{value}"))
				.or_else(|| HashString::parse(value))
			{
				hashes.push(h);
			}
		}
	}

	VersionData {
		package: package_id,
		version: stanza.find("Version").unwrap_or("").to_string(),
		arch: stanza.find("Architecture").unwrap_or("all").to_string(),
		section: stanza.find("Section").unwrap_or("").to_string(),
		priority: stanza.find("Priority").unwrap_or("optional").to_string(),
		multi_arch: stanza.find("Multi-Arch").unwrap_or("no").to_string(),
		size: stanza.find_i("Size").unwrap_or(0) as u64,
		installed_size: stanza.find_i("Installed-Size").unwrap_or(0) as u64 * 1024,
		essential: stanza.find("Essential").is_some_and(|v| v.eq_ignore_ascii_case("yes")),
		depends,
		provides,
		hashes,
		summary: stanza.find("Description").and_then(|d| d.lines().next()).map(str::to_string),
		description: stanza.find("Description").map(str::to_string),
		files: Vec::new(),
		filename: stanza.find("Filename").map(str::to_string),
	}
}

/// Insert `stanza` into `cache`'s arena, merging with an existing package of
/// the same name+arch or creating one. `file` records which [`PackageFileData`]
/// (if any) this stanza was read from, for later lookups like
/// [`crate::records::PackageRecords::get_field`] and [`crate::package::Version::uri`].
///
/// If a version with the same version string already exists for this package
/// (merged from an earlier index), `file` is appended to its file list rather
/// than creating a duplicate `Version` record, per the generator's ordering
/// contract: a later index may add to, but never overwrite, an earlier one's
/// list of files for the same version.
pub fn merge_stanza(cache: &mut Cache, stanza: &TagSection, mark_installed: bool, file: Option<super::PackageFileId>) {
	let Some(name) = stanza.find("Package") else {
		return;
	};
	let arch = stanza.find("Architecture").unwrap_or("all").to_string();
	let version_str = stanza.find("Version").unwrap_or("").to_string();

	let existing = cache
		.raw_pkgs()
		.find(|id| cache.package(*id).name == name && cache.package(*id).arch == arch);

	let package_id = match existing {
		Some(id) => id,
		None => {
			let id = super::PackageId(cache.packages.len() as u32);
			cache.packages.push(PackageData {
				name: name.to_string(),
				arch: arch.clone(),
				versions: Vec::new(),
				current_version: None,
			});
			cache.by_name.entry(name.to_string()).or_insert(id);
			id
		},
	};

	let existing_version = cache.packages[package_id.0 as usize]
		.versions
		.iter()
		.copied()
		.find(|v| cache.versions[v.0 as usize].version == version_str);

	let version_id = if let Some(version_id) = existing_version {
		if let Some(file) = file {
			let files = &mut cache.versions[version_id.0 as usize].files;
			if !files.contains(&file) {
				files.push(file);
			}
		}
		version_id
	} else {
		let native_arch = cache.config.get_architectures().first().cloned().unwrap_or_default();
		let mut version_data = version_from_stanza(package_id, stanza, &native_arch);
		version_data.files = file.into_iter().collect();
		let version_id = super::VersionId(cache.versions.len() as u32);
		cache.versions.push(version_data);

		let pkg = &mut cache.packages[package_id.0 as usize];
		// Keep newest first.
		let pos = pkg
			.versions
			.iter()
			.position(|v| {
				crate::version::cmp_versions(&cache.versions[v.0 as usize].version, &cache.versions[version_id.0 as usize].version)
					== std::cmp::Ordering::Less
			})
			.unwrap_or(pkg.versions.len());
		pkg.versions.insert(pos, version_id);
		version_id
	};

	if mark_installed {
		cache.packages[package_id.0 as usize].current_version = Some(version_id);
	}

	// A `Provides` target gets a stub package entry (no real versions) if one
	// doesn't already exist, the way `pkgCacheGenerator::FindPkg` auto-vivifies
	// virtual package names on first reference.
	let provide_names: Vec<String> = cache.versions[version_id.0 as usize]
		.provides
		.iter()
		.map(|p| p.name.clone())
		.collect();
	for provide_name in provide_names {
		let exists = cache
			.raw_pkgs()
			.any(|id| cache.package(id).name == provide_name && cache.package(id).arch == arch);
		if exists {
			continue;
		}
		let id = super::PackageId(cache.packages.len() as u32);
		cache.packages.push(PackageData {
			name: provide_name.clone(),
			arch: arch.clone(),
			versions: Vec::new(),
			current_version: None,
		});
		cache.by_name.entry(provide_name).or_insert(id);
	}
}

/// Load `/var/lib/dpkg/status` if present, recording each `installed` stanza
/// as that package's current version.
///
/// Per the generator's ordering contract (spec §4.E) this overlay must run
/// *last*, after every configured index and local file has been merged, so
/// that an installed version already known from an index gains a `Status`
/// [`PackageFileData`] entry rather than creating a duplicate, file-less
/// version record.
pub fn load_dpkg_status(cache: &mut Cache) -> Result<(), AptErrors> {
	let path = cache.config.file("Dir::State::status", "/var/lib/dpkg/status");
	let path_buf = Path::new(&path);
	if !path_buf.exists() {
		return Ok(());
	}
	let content = fs::read_to_string(path_buf)?;
	let stanzas = parse_tagfile(&content)?;
	let file_id = register_package_file(cache, PackageFileData {
		filename: path,
		archive: "now".to_string(),
		origin: String::new(),
		label: String::new(),
		site: String::new(),
		component: String::new(),
		architecture: cache.config.get_architectures().first().cloned().unwrap_or_default(),
		index_type: "Status".to_string(),
	});
	for stanza in &stanzas {
		let installed = stanza
			.find("Status")
			.map(|s| s.contains("installed"))
			.unwrap_or(false);
		merge_stanza(cache, stanza, installed, Some(file_id));
	}
	Ok(())
}

/// Merge every downloaded `Packages` index under `Dir::State::lists` that
/// belongs to a configured `sources.list` entry, in the order `sources.list`
/// lists them (the generator's ordering contract, spec §4.E). `Sources` and
/// `Release` targets are not merged into the package arena here; the former
/// feed [`crate::records::SourceRecords`], the latter are handled by the
/// Acquire layer only.
pub fn load_configured_indexes(cache: &mut Cache) -> Result<(), AptErrors> {
	let lists_dir = cache.config.dir("Dir::State::lists", "/var/lib/apt/lists/");
	let entries = crate::sourceslist::read_all(&cache.config).map_err(|e| AptErrors::from(e.to_string()))?;

	for entry in &entries {
		for target in crate::sourceslist::expand_targets(entry, &cache.config) {
			if target.kind != crate::sourceslist::IndexKind::Packages {
				continue;
			}
			let path = format!("{lists_dir}{}", target.list_filename());
			if !Path::new(&path).exists() {
				continue;
			}
			debug!(path, uri = target.uri, "merging configured index");
			let content = fs::read_to_string(&path)?;
			let file_id = register_package_file(cache, PackageFileData {
				filename: path,
				archive: target.codename.clone(),
				origin: String::new(),
				label: String::new(),
				site: target.site.clone(),
				component: target.component.clone(),
				architecture: target.arch.clone().unwrap_or_default(),
				index_type: "Packages".to_string(),
			});
			for stanza in parse_tagfile(&content)? {
				merge_stanza(cache, &stanza, false, Some(file_id));
			}
		}
	}
	Ok(())
}

/// Load one local file: a `.deb`/`.ddeb` archive, a `Packages`/`Sources`
/// index, or a directory with a `debian/control` file.
pub fn load_file(cache: &mut Cache, path: &str) -> Result<(), AptErrors> {
	debug!(path, "loading local file into cache");
	let p = Path::new(path);
	if path.ends_with(".deb") || path.ends_with(".ddeb") {
		let mut file = fs::File::open(p)?;
		let mut buf = Vec::new();
		file.read_to_end(&mut buf)?;
		let deb = DebPackage::from_bytes(&buf).map_err(ArchiveError::into_apt_errors)?;
		let mut stanza_text = String::from_utf8_lossy(&deb.control.fields.rewrite(
			crate::tagfile::PACKAGES_FIELD_ORDER,
			&[],
			&[],
		))
		.into_owned();
		if !stanza_text.ends_with('\n') {
			stanza_text.push('\n');
		}
		let stanza = TagSection::new(stanza_text.trim_end())?;
		merge_stanza(cache, &stanza, false, None);
		if let Some(id) = cache.by_name.get(deb.package_name().unwrap_or_default()).copied() {
			if let Some(version_id) = cache.package(id).versions.first().copied() {
				cache.versions[version_id.0 as usize].filename = Some(path.to_string());
			}
		}
		return Ok(());
	}

	if p.is_dir() {
		let control_path = p.join("debian/control");
		if control_path.exists() {
			let content = fs::read_to_string(control_path)?;
			for stanza in parse_tagfile(&content)? {
				merge_stanza(cache, &stanza, false, None);
			}
		}
		return Ok(());
	}

	// Treat anything else as a Packages/Sources-style index file.
	let content = fs::read_to_string(p)?;
	let index_type = if path.ends_with("Sources") { "Sources" } else { "Packages" };
	let site = p
		.parent()
		.map(|d| format!("file://{}", d.display()))
		.unwrap_or_default();
	let file_id = register_package_file(cache, PackageFileData {
		filename: path.to_string(),
		archive: String::new(),
		origin: String::new(),
		label: String::new(),
		site,
		component: String::new(),
		architecture: cache.config.get_architectures().first().cloned().unwrap_or_default(),
		index_type: index_type.to_string(),
	});
	for stanza in parse_tagfile(&content)? {
		merge_stanza(cache, &stanza, false, Some(file_id));
	}
	Ok(())
}

impl ArchiveError {
	fn into_apt_errors(self) -> AptErrors { AptErrors::from(self.to_string()) }
}

pub fn register_package_file(cache: &mut Cache, file: PackageFileData) -> super::PackageFileId {
	let id = super::PackageFileId(cache.files.len() as u32);
	cache.files.push(file);
	id
}

#[cfg(test)]
mod dependency_parse_tests {
	use super::*;

	#[test]
	fn parses_plain_atom() {
		let deps = parse_dependency_field(DepType::Depends, "libc6 (>= 2.17)", "amd64");
		assert_eq!(deps.len(), 1);
		assert_eq!(deps[0].target_name, "libc6");
		assert_eq!(deps[0].constraint.as_ref().unwrap().1, "2.17");
		assert_eq!(deps[0].target_arch, None);
	}

	#[test]
	fn parses_multiarch_qualifier() {
		let deps = parse_dependency_field(DepType::Depends, "libc6:amd64", "amd64");
		assert_eq!(deps[0].target_name, "libc6");
		assert_eq!(deps[0].target_arch.as_deref(), Some("amd64"));
	}

	#[test]
	fn historical_less_than_is_less_equal() {
		let deps = parse_dependency_field(DepType::Depends, "libfoo (< 2.0)", "amd64");
		assert_eq!(deps[0].constraint.as_ref().unwrap().0, Operator::LessEq);
	}

	#[test]
	fn archlist_excluding_native_arch_drops_the_alternative() {
		let deps = parse_dependency_field(DepType::Depends, "foo [i386]", "amd64");
		assert!(deps.is_empty());
	}

	#[test]
	fn archlist_matching_native_arch_keeps_the_alternative() {
		let deps = parse_dependency_field(DepType::Depends, "foo [amd64 arm64]", "amd64");
		assert_eq!(deps.len(), 1);
	}

	#[test]
	fn archlist_wildcards_match() {
		assert!(arch_matches("any", "amd64"));
		assert!(arch_matches("any-amd64", "amd64"));
		assert!(arch_matches("linux-any", "amd64"));
		assert!(!arch_matches("any-i386", "amd64"));
	}

	#[test]
	fn negated_archlist_excludes_only_listed_archs() {
		let deps = parse_dependency_field(DepType::Depends, "foo [!i386]", "amd64");
		assert_eq!(deps.len(), 1);
		let deps = parse_dependency_field(DepType::Depends, "foo [!amd64]", "amd64");
		assert!(deps.is_empty());
	}

	#[test]
	fn or_group_renumbered_when_a_middle_alternative_is_dropped() {
		// "a | b | c" where b is i386-only: on amd64 this collapses to "a | c",
		// so a's or_group flag must still be true (c follows) and c's false.
		let deps = parse_dependency_field(DepType::Depends, "a | b [i386] | c", "amd64");
		assert_eq!(deps.len(), 2);
		assert_eq!(deps[0].target_name, "a");
		assert!(deps[0].or_group);
		assert_eq!(deps[1].target_name, "c");
		assert!(!deps[1].or_group);
	}

	#[test]
	fn profiles_are_parsed_but_not_filtered() {
		let deps = parse_dependency_field(DepType::Depends, "foo <stage1 cross>", "amd64");
		assert_eq!(deps.len(), 1);
		assert_eq!(deps[0].profiles.as_deref(), Some("stage1 cross"));
	}

	#[test]
	fn combined_grammar_all_qualifiers() {
		let deps = parse_dependency_field(DepType::Depends, "foo:amd64 (>= 1.0) [amd64 arm64] <stage1>", "amd64");
		assert_eq!(deps.len(), 1);
		let d = &deps[0];
		assert_eq!(d.target_name, "foo");
		assert_eq!(d.target_arch.as_deref(), Some("amd64"));
		assert_eq!(d.constraint.as_ref().unwrap().1, "1.0");
		assert_eq!(d.profiles.as_deref(), Some("stage1"));
	}
}
