mod sort {
	use rust_apt::cache::{Cache, PackageSort};
	use rust_apt::config::Config;

	const PACKAGES: &str = "tests/files/packages/basic_Packages";
	const STATUS: &str = "tests/files/status/libfoo_installed_status";

	fn cache_with_status() -> Cache {
		let config = Config::new_clear();
		config.set("Dir::State::status", STATUS);
		Cache::new(&[PACKAGES]).unwrap()
	}

	#[test]
	fn defaults_exclude_virtual_packages() {
		let cache = cache_with_status();
		let sort = PackageSort::default();

		let names: Vec<_> = cache.packages(&sort).map(|p| p.name().to_string()).collect();
		assert!(!names.is_empty());
		assert!(!names.contains(&"libquux".to_string()));
	}

	#[test]
	fn include_virtual_adds_stub_packages() {
		let cache = cache_with_status();
		let sort = PackageSort::default().include_virtual().names();

		let names: Vec<_> = cache.packages(&sort).map(|p| p.name().to_string()).collect();
		assert!(names.contains(&"libbar".to_string()));
		assert!(names.contains(&"libquux".to_string()));
	}

	#[test]
	fn only_virtual_keeps_just_the_stub() {
		let cache = cache_with_status();
		let sort = PackageSort::default().only_virtual();

		for pkg in cache.packages(&sort) {
			assert!(pkg.is_virtual());
		}
		let names: Vec<_> = cache.packages(&sort).map(|p| p.name().to_string()).collect();
		assert_eq!(names, vec!["libquux"]);
	}

	#[test]
	fn upgradable_and_not_upgradable_partition() {
		let cache = cache_with_status();

		let sort = PackageSort::default().upgradable();
		for pkg in cache.packages(&sort) {
			assert!(pkg.is_upgradable());
		}

		let sort = PackageSort::default().not_upgradable();
		for pkg in cache.packages(&sort) {
			assert!(!pkg.is_upgradable());
		}
	}

	#[test]
	fn installed_and_not_installed_partition() {
		let cache = cache_with_status();

		let sort = PackageSort::default().installed();
		for pkg in cache.packages(&sort) {
			assert!(pkg.is_installed());
		}

		let sort = PackageSort::default().not_installed();
		for pkg in cache.packages(&sort) {
			assert!(!pkg.is_installed());
		}
	}

	#[test]
	fn names_sorts_alphabetically() {
		let cache = cache_with_status();
		let sort = PackageSort::default().names();
		let names: Vec<_> = cache.packages(&sort).map(|p| p.name().to_string()).collect();
		let mut sorted = names.clone();
		sorted.sort();
		assert_eq!(names, sorted);
	}
}
