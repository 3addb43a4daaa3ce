//! Parses `sources.list`/`sources.list.d/*.list` files into [`SourceEntry`]
//! records, and expands each entry into the set of [`IndexTarget`]s the
//! Acquire layer must fetch to update the cache.
//!
//! Grounded on `original_source/apt-pkg/sourcelist.cc`'s `pkgSourceList::Read`
//! (`TYPE URI DIST [COMPONENTS...]` line grammar, `$(ARCH)` substitution,
//! trailing-`/` "absolute" dists with no components) and `sourcelist.h`'s
//! `Item::PackagesURI`/`ReleaseURI` naming scheme, generalized to emit one
//! [`IndexTarget`] per component x architecture x kind as described in spec
//! §4.K instead of the original's single binary-`$ARCH` index.
use std::fmt;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::acquire::AcquireItem;
use crate::config::Config;

#[derive(Debug, Error)]
pub enum SourceListError {
	#[error("malformed line {line} in source list {file} ({reason})")]
	Malformed { file: String, line: usize, reason: &'static str },
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// `deb` lists binary package indexes; `deb-src` lists source package indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
	Deb,
	DebSrc,
}

impl SourceType {
	fn parse(s: &str) -> Option<SourceType> {
		match s {
			"deb" => Some(SourceType::Deb),
			"deb-src" => Some(SourceType::DebSrc),
			_ => None,
		}
	}
}

impl fmt::Display for SourceType {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.write_str(match self {
			SourceType::Deb => "deb",
			SourceType::DebSrc => "deb-src",
		})
	}
}

/// One non-comment, non-blank line of a `sources.list` file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
	pub source_type: SourceType,
	/// Always `/`-terminated.
	pub uri: String,
	/// The suite/codename. If it ends in `/` the entry is "absolute": no
	/// components, the URI+Dist is used as-is (see [`SourceEntry::is_absolute`]).
	pub dist: String,
	pub components: Vec<String>,
}

impl SourceEntry {
	pub fn is_absolute(&self) -> bool { self.dist.ends_with('/') }

	/// `scheme://host` with trailing path stripped, for short display lines.
	pub fn site_only(&self) -> &str {
		let Some(scheme_end) = self.uri.find("://") else { return &self.uri };
		let after_scheme = scheme_end + 3;
		match self.uri[after_scheme..].find('/') {
			Some(rel) => &self.uri[..after_scheme + rel],
			None => &self.uri,
		}
	}
}

impl fmt::Display for SourceEntry {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{} {} {}", self.source_type, self.uri, self.dist)?;
		for component in &self.components {
			write!(f, " {component}")?;
		}
		Ok(())
	}
}

fn subst_arch(s: &str, arch: &str) -> String { s.replace("$(ARCH)", arch) }

fn split_words(line: &str) -> Vec<&str> { line.split_whitespace().collect() }

/// Parse the text of a single `sources.list`-style file. `file` is used only
/// for error messages.
pub fn parse(content: &str, file: &str, arch: &str) -> Result<Vec<SourceEntry>, SourceListError> {
	let mut entries = Vec::new();
	for (idx, raw_line) in content.lines().enumerate() {
		let line_no = idx + 1;
		let line = match raw_line.find('#') {
			Some(pos) => &raw_line[..pos],
			None => raw_line,
		};
		let line = line.trim();
		if line.is_empty() {
			continue;
		}

		let words = split_words(line);
		let malformed = |reason| SourceListError::Malformed { file: file.to_string(), line: line_no, reason };

		let Some((type_word, rest)) = words.split_first() else {
			return Err(malformed("empty"));
		};
		let Some(source_type) = SourceType::parse(type_word) else {
			return Err(malformed("unknown type"));
		};
		let Some((uri_word, rest)) = rest.split_first() else {
			return Err(malformed("missing URI"));
		};
		if uri_word.find(':').is_none() {
			return Err(malformed("URI has no scheme"));
		}
		let Some((dist_word, components)) = rest.split_first() else {
			return Err(malformed("missing dist"));
		};

		let mut uri = subst_arch(uri_word, arch);
		if !uri.ends_with('/') {
			uri.push('/');
		}
		let dist = subst_arch(dist_word, arch);

		if dist.ends_with('/') {
			if !components.is_empty() {
				return Err(malformed("absolute dist must not have components"));
			}
			entries.push(SourceEntry { source_type, uri, dist, components: Vec::new() });
			continue;
		}

		if components.is_empty() {
			return Err(malformed("missing component list"));
		}
		entries.push(SourceEntry {
			source_type,
			uri,
			dist,
			components: components.iter().map(|c| c.to_string()).collect(),
		});
	}
	Ok(entries)
}

/// Read `Dir::Etc::sourcelist` plus every `*.list` file under
/// `Dir::Etc::sourceparts`, in that order (mirrors `pkgSourceList::ReadSources`).
pub fn read_all(config: &Config) -> Result<Vec<SourceEntry>, SourceListError> {
	let arch = config.find("APT::Architecture", "amd64");
	let mut entries = Vec::new();

	let main = config.file("Dir::Etc::sourcelist", "/etc/apt/sources.list");
	if Path::new(&main).exists() {
		let content = fs::read_to_string(&main)?;
		entries.extend(parse(&content, &main, &arch)?);
	}

	let parts_dir = config.dir("Dir::Etc::sourceparts", "/etc/apt/sources.list.d/");
	if let Ok(mut dir_entries) = fs::read_dir(&parts_dir).map(|it| it.flatten().collect::<Vec<_>>()) {
		dir_entries.sort_by_key(|e| e.file_name());
		for entry in dir_entries {
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some("list") {
				continue;
			}
			let content = fs::read_to_string(&path)?;
			entries.extend(parse(&content, &path.to_string_lossy(), &arch)?);
		}
	}

	Ok(entries)
}

/// The kind of index a given [`IndexTarget`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
	Packages,
	Sources,
	Translation,
	Release,
}

impl IndexKind {
	fn filename(&self) -> &'static str {
		match self {
			IndexKind::Packages => "Packages",
			IndexKind::Sources => "Sources",
			IndexKind::Translation => "Translation-en",
			IndexKind::Release => "Release",
		}
	}
}

/// One index file the Acquire layer should download to update the cache:
/// one per (component, architecture, kind) for a non-absolute entry, or a
/// single target for an absolute one.
#[derive(Debug, Clone)]
pub struct IndexTarget {
	pub uri: String,
	/// Short, human-facing label e.g. `example.com jammy/main Packages amd64`.
	pub description: String,
	pub short_desc: String,
	pub kind: IndexKind,
	/// The repository root this target was expanded from; `Filename` fields
	/// inside a `Packages`/`Sources` stanza are relative to this.
	pub site: String,
	/// The suite/codename (`entry.dist`), used as `PackageFileData::archive`.
	pub codename: String,
	/// The component this target belongs to (`main`, `universe`, ...), empty
	/// for an absolute entry.
	pub component: String,
	/// The binary architecture this target was expanded for, if any (`Sources`
	/// and `Release` targets are architecture-independent).
	pub arch: Option<String>,
}

impl IndexTarget {
	/// The on-disk filename under `Dir::State::lists`: the URI with `/`, `_`,
	/// and `:` escaped, matching apt's `URItoFileName`.
	pub fn list_filename(&self) -> String {
		self.uri
			.chars()
			.map(|c| match c {
				'/' => '_',
				c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => c,
				_ => '_',
			})
			.collect()
	}
}

/// Expand one [`SourceEntry`] into its [`IndexTarget`]s for the configured
/// architecture list (primary architecture first, see
/// [`Config::get_architectures`]).
pub fn expand_targets(entry: &SourceEntry, config: &Config) -> Vec<IndexTarget> {
	let archs = config.get_architectures();
	let mut out = Vec::new();

	if entry.is_absolute() {
		let base = format!("{}{}", entry.uri, entry.dist);
		let kind = match entry.source_type {
			SourceType::Deb => IndexKind::Packages,
			SourceType::DebSrc => IndexKind::Sources,
		};
		out.push(IndexTarget {
			uri: format!("{base}{}", kind.filename()),
			description: format!("{} {}", entry.site_only(), entry.dist),
			short_desc: kind.filename().to_string(),
			kind,
			site: entry.uri.clone(),
			codename: entry.dist.clone(),
			component: String::new(),
			arch: None,
		});
		return out;
	}

	for component in &entry.components {
		match entry.source_type {
			SourceType::Deb => {
				for arch in &archs {
					let base = format!(
						"{}dists/{}/{}/binary-{}/",
						entry.uri, entry.dist, component, arch
					);
					out.push(IndexTarget {
						uri: format!("{base}Packages"),
						description: format!("{} {}/{} {} Packages", entry.site_only(), entry.dist, component, arch),
						short_desc: format!("{}/{} {}", entry.dist, component, arch),
						kind: IndexKind::Packages,
						site: entry.uri.clone(),
						codename: entry.dist.clone(),
						component: component.clone(),
						arch: Some(arch.clone()),
					});
					out.push(IndexTarget {
						uri: format!("{base}Translation-en"),
						description: format!("{} {}/{} Translation-en", entry.site_only(), entry.dist, component),
						short_desc: format!("{}/{} Translation-en", entry.dist, component),
						kind: IndexKind::Translation,
						site: entry.uri.clone(),
						codename: entry.dist.clone(),
						component: component.clone(),
						arch: None,
					});
				}
			},
			SourceType::DebSrc => {
				let base = format!("{}dists/{}/{}/source/", entry.uri, entry.dist, component);
				out.push(IndexTarget {
					uri: format!("{base}Sources"),
					description: format!("{} {}/{} Sources", entry.site_only(), entry.dist, component),
					short_desc: format!("{}/{} Sources", entry.dist, component),
					kind: IndexKind::Sources,
					site: entry.uri.clone(),
					codename: entry.dist.clone(),
					component: component.clone(),
					arch: None,
				});
			},
		}
	}

	let release_uri = if entry.dist.ends_with('/') {
		format!("{}{}Release", entry.uri, entry.dist)
	} else {
		format!("{}dists/{}/Release", entry.uri, entry.dist)
	};
	out.push(IndexTarget {
		uri: release_uri,
		description: format!("{} {} Release", entry.site_only(), entry.dist),
		short_desc: format!("{} Release", entry.dist),
		kind: IndexKind::Release,
		site: entry.uri.clone(),
		codename: entry.dist.clone(),
		component: String::new(),
		arch: None,
	});

	out
}

/// Build the [`AcquireItem`]s needed to refresh every configured source's
/// indexes, destined for `Dir::State::lists/<escaped-uri>`.
pub fn update_items(config: &Config) -> Result<Vec<AcquireItem>, SourceListError> {
	let lists_dir = config.dir("Dir::State::lists", "/var/lib/apt/lists/");
	let mut items = Vec::new();
	for entry in read_all(config)? {
		for target in expand_targets(&entry, config) {
			let destination = format!("{lists_dir}{}", target.list_filename());
			let kind = match target.kind {
				IndexKind::Packages | IndexKind::Sources => crate::acquire::item::ItemKind::IndexFile,
				IndexKind::Translation => crate::acquire::item::ItemKind::TranslationIndex,
				IndexKind::Release => crate::acquire::item::ItemKind::ReleaseFile,
			};
			let is_release = target.kind == IndexKind::Release;
			let mut item = AcquireItem::new(target.uri.clone(), destination.clone(), target.description.clone())
				.with_kind(kind);
			item.short_desc = target.short_desc.clone();
			items.push(item);

			// A Release file's detached signature is fetched right after it
			// (§4.J's fallback order); an absent signature just leaves the
			// index untrusted rather than failing the whole update.
			if is_release {
				let mut sig = AcquireItem::new(format!("{}.gpg", target.uri), format!("{destination}.gpg"), format!("{} (signature)", target.description))
					.with_kind(crate::acquire::item::ItemKind::ReleaseSignature);
				sig.short_desc = format!("{} Signature", target.short_desc);
				items.push(sig);
			}
		}
	}
	Ok(items)
}

/// The `ArchiveURI`/`PackagesURI` equivalent: build the fetch URI for a file
/// relative to `entry`'s base, e.g. a `.deb`'s `Filename` field.
pub fn archive_uri(entry: &SourceEntry, relative: &str) -> String { format!("{}{relative}", entry.uri) }

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_basic_line() {
		let entries = parse(
			"deb http://archive.ubuntu.com/ubuntu jammy main restricted\n",
			"sources.list",
			"amd64",
		)
		.unwrap();
		assert_eq!(entries.len(), 1);
		let entry = &entries[0];
		assert_eq!(entry.source_type, SourceType::Deb);
		assert_eq!(entry.uri, "http://archive.ubuntu.com/ubuntu/");
		assert_eq!(entry.dist, "jammy");
		assert_eq!(entry.components, vec!["main", "restricted"]);
	}

	#[test]
	fn ignores_comments_and_blanks() {
		let entries = parse(
			"# a comment\n\n  \ndeb http://x/ y z\n",
			"sources.list",
			"amd64",
		)
		.unwrap();
		assert_eq!(entries.len(), 1);
	}

	#[test]
	fn substitutes_arch() {
		let entries = parse("deb http://x/$(ARCH)/ jammy main\n", "sources.list", "arm64").unwrap();
		assert_eq!(entries[0].uri, "http://x/arm64/");
	}

	#[test]
	fn absolute_dist_has_no_components() {
		let entries = parse("deb http://x/debs/ ./\n", "sources.list", "amd64").unwrap();
		assert!(entries[0].is_absolute());
		assert!(entries[0].components.is_empty());
	}

	#[test]
	fn absolute_dist_rejects_trailing_component() {
		let err = parse("deb http://x/debs/ ./ extra\n", "sources.list", "amd64").unwrap_err();
		assert!(matches!(err, SourceListError::Malformed { .. }));
	}

	#[test]
	fn missing_component_list_is_malformed() {
		let err = parse("deb http://x/ jammy\n", "sources.list", "amd64").unwrap_err();
		assert!(matches!(err, SourceListError::Malformed { .. }));
	}

	#[test]
	fn deb_src_expands_to_sources_index_plus_release() {
		let entries = parse("deb-src http://x/ jammy main\n", "sources.list", "amd64").unwrap();
		let config = Config::new_clear();
		config.reset();
		let targets = expand_targets(&entries[0], &config);
		assert!(targets.iter().any(|t| t.kind == IndexKind::Sources));
		assert!(targets.iter().any(|t| t.kind == IndexKind::Release));
	}

	#[test]
	fn deb_expands_packages_and_translation_per_component() {
		let entries = parse("deb http://x/ jammy main universe\n", "sources.list", "amd64").unwrap();
		let config = Config::new_clear();
		config.reset();
		let targets = expand_targets(&entries[0], &config);
		let packages: Vec<_> = targets.iter().filter(|t| t.kind == IndexKind::Packages).collect();
		assert_eq!(packages.len(), 2);
		assert!(packages[0].uri.contains("main/binary-"));
	}

	#[test]
	fn list_filename_escapes_uri() {
		let entries = parse("deb http://archive.ubuntu.com/ubuntu jammy main\n", "sources.list", "amd64").unwrap();
		let config = Config::new_clear();
		config.reset();
		let target = expand_targets(&entries[0], &config)
			.into_iter()
			.find(|t| t.kind == IndexKind::Release)
			.unwrap();
		assert!(!target.list_filename().contains('/'));
	}
}
