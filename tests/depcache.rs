mod depcache {
	use rust_apt::cache::{Cache, Upgrade};
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
	fn mark_reinstall() {
		let cache = cache_without_status();
		let pkg = cache.get("libbar").unwrap();

		assert!(!pkg.marked_reinstall());
		pkg.mark_reinstall(true);
		assert!(pkg.marked_reinstall());
	}

	#[test]
	fn mark_install_auto_resolves_virtual_dependency() {
		let cache = cache_without_status();
		let app = cache.get("app").unwrap();

		app.mark_install(true, true);
		assert!(app.marked_install());
		assert!(!app.is_auto_installed());

		// `app` depends on the virtual `libquux`, satisfied only through
		// `virtual-provider`; marking install should auto-install it.
		let provider = cache.get("virtual-provider").unwrap();
		assert!(provider.marked_install());
		assert!(provider.is_auto_installed());

		// `virtual-provider` in turn depends on `libbar`, not yet installed.
		let libbar = cache.get("libbar").unwrap();
		assert!(libbar.marked_install());
		assert!(libbar.is_auto_installed());
	}

	#[test]
	fn mark_delete_and_keep() {
		let cache = cache_with_status();
		let pkg = cache.get("libfoo").unwrap();

		pkg.mark_delete(true);
		assert!(pkg.marked_delete());
		assert!(pkg.marked_purge());

		pkg.mark_keep();
		assert!(pkg.marked_keep());
		assert!(!pkg.marked_delete());
	}

	#[test]
	fn upgrade_marks_every_upgradable_package() {
		let cache = cache_with_status();
		cache.upgrade(Upgrade::FullUpgrade).unwrap();

		let libfoo = cache.get("libfoo").unwrap();
		assert!(libfoo.marked_upgrade());

		for pkg in cache.get_changes(true) {
			if pkg.marked_install() {
				continue;
			}
			assert!(pkg.marked_upgrade() || pkg.marked_delete() || pkg.marked_reinstall() || pkg.marked_downgrade());
		}
	}

	#[test]
	fn get_changes_reflects_marks() {
		let cache = cache_without_status();
		let app = cache.get("app").unwrap();
		app.mark_install(false, true);

		let changes = cache.get_changes(true);
		assert!(changes.iter().any(|p| p.name() == "app"));
	}
}
