mod cache {
	use std::collections::HashMap;

	use rust_apt::cache::{Cache, DepType, PackageSort};
	use rust_apt::config::Config;

	const PACKAGES: &str = "tests/files/packages/basic_Packages";
	const STATUS: &str = "tests/files/status/libfoo_installed_status";

	fn cache_with_status() -> Cache {
		let config = Config::new_clear();
		config.set("Dir::State::status", STATUS);
		Cache::new(&[PACKAGES]).unwrap()
	}

	fn cache_without_status() -> Cache {
		let config = Config::new_clear();
		config.set("Dir::State::status", "tests/files/status/does-not-exist");
		Cache::new(&[PACKAGES]).unwrap()
	}

	#[test]
	fn loads_real_and_virtual_packages() {
		let cache = cache_without_status();

		let libbar = cache.get("libbar").unwrap();
		assert!(!libbar.is_virtual());

		// libquux only exists as a `Provides` target; it has no real versions.
		let libquux = cache.get("libquux").unwrap();
		assert!(libquux.is_virtual());
		assert!(libquux.versions().next().is_none());
	}

	#[test]
	fn get_version_finds_exact_string() {
		let cache = cache_without_status();
		let pkg = cache.get("app").unwrap();

		assert!(pkg.get_version("1.0").is_some());
		assert!(pkg.get_version("2.0").is_some());
		assert!(pkg.get_version("9.9.9").is_none());
	}

	#[test]
	fn installed_and_candidate_differ_after_loading_status() {
		let cache = cache_with_status();
		let pkg = cache.get("libfoo").unwrap();

		let installed = pkg.installed().unwrap();
		assert_eq!(installed.version(), "1.0");

		// The index only publishes 1.5, which outranks the installed 1.0.
		let candidate = pkg.candidate().unwrap();
		assert_eq!(candidate.version(), "1.5");
		assert!(pkg.is_upgradable());
	}

	#[test]
	fn versions_are_newest_first() {
		let cache = cache_without_status();
		let pkg = cache.get("app").unwrap();
		let versions: Vec<_> = pkg.versions().map(|v| v.version().to_string()).collect();
		assert_eq!(versions, vec!["2.0", "1.0"]);
	}

	#[test]
	fn dependencies_resolve_to_targets() {
		let cache = cache_without_status();
		let pkg = cache.get("libfoo").unwrap();
		let cand = pkg.candidate().unwrap();

		let deps = cand.dependencies().unwrap();
		let dep = deps.first().unwrap();
		assert_eq!(dep.first().name(), "libbar");
		assert!(!dep.first().all_targets().is_empty());
	}

	#[test]
	fn provides_links_virtual_to_provider() {
		let cache = cache_without_status();
		let libquux = cache.get("libquux").unwrap();

		let providers = libquux.provides();
		assert_eq!(providers.len(), 1);
		let provider = &providers[0];
		assert_eq!(provider.package().name(), "virtual-provider");
		assert_eq!(provider.provided_version(), Some("1.0"));
	}

	#[test]
	fn uri_and_package_file_come_from_the_loaded_index() {
		let cache = cache_without_status();
		let pkg = cache.get("libbar").unwrap();
		let cand = pkg.candidate().unwrap();

		let package_file = cand.package_file().unwrap();
		assert_eq!(package_file.index_type, "Packages");

		let uri = cand.uri().unwrap();
		assert!(uri.ends_with("pool/main/libbar_2.0_amd64.deb"));
	}

	#[test]
	fn depcache_marks_default_to_keep() {
		let cache = cache_without_status();
		let pkg = cache.get("libbar").unwrap();
		assert!(!pkg.marked_install());
		assert!(!pkg.marked_upgrade());
		assert!(!pkg.marked_delete());
		assert!(pkg.marked_keep());
		assert!(!pkg.marked_downgrade());
		assert!(!pkg.marked_reinstall());
		assert!(!pkg.is_now_broken());
		assert!(!pkg.is_inst_broken());
	}

	#[test]
	fn shortname_has_no_architecture_suffix() {
		let cache = cache_without_status();
		let sort = PackageSort::default();
		for pkg in cache.packages(&sort) {
			assert!(!pkg.name().contains(':'));
		}
	}

	#[test]
	fn depends_map_groups_by_type() {
		let cache = cache_without_status();
		let pkg = cache.get("app").unwrap();
		let cand = pkg.get_version("2.0").unwrap();

		let depends = cand.get_depends(&DepType::Depends).unwrap();
		// `libfoo (>= 1.0), libquux (>= 1.0)` is two independent dependencies,
		// neither part of an OR group.
		assert_eq!(depends.len(), 2);
		for dep in depends {
			assert!(!dep.is_or());
		}
	}

	#[test]
	fn hashable_in_a_map() {
		let cache = cache_without_status();
		#[allow(clippy::mutable_key_type)]
		let mut pkg_map = HashMap::new();

		let sort = PackageSort::default();
		for pkg in cache.packages(&sort) {
			let arch = pkg.arch().to_string();
			pkg_map.insert(pkg, arch);
		}
		assert!(!pkg_map.is_empty());
	}

	#[test]
	fn debug_and_display_interfaces() {
		let cache = cache_without_status();
		let pkg = cache.get("app").unwrap();
		println!("{pkg:?}");
		println!("{pkg}");

		let cand = pkg.candidate().unwrap();
		println!("{cand:?}");
		println!("{cand}");
	}

	#[test]
	fn same_version_from_two_indexes_merges_file_list_not_duplicates() {
		let config = Config::new_clear();
		config.set("Dir::State::status", "tests/files/status/does-not-exist");
		let cache = Cache::new(&[PACKAGES, "tests/files/packages/overlay_Packages"]).unwrap();

		let libbar = cache.get("libbar").unwrap();
		// A second index repeating the exact same (name, version) adds a file,
		// not a duplicate version.
		assert_eq!(libbar.versions().count(), 1);
		let version = libbar.get_version("2.0").unwrap();
		assert_eq!(version.package_files().count(), 2);
	}

	#[test]
	fn missing_index_file_errors() {
		let config = Config::new_clear();
		config.set("Dir::State::status", "tests/files/status/does-not-exist");
		assert!(Cache::new(&["tests/files/this-file-doesnt-exist"]).is_err());
	}
}
