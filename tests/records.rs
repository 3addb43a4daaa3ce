mod records {
	use rust_apt::cache::Cache;
	use rust_apt::config::Config;
	use rust_apt::records::RecordField;

	const PACKAGES: &str = "tests/files/packages/basic_Packages";

	fn cache() -> Cache {
		let config = Config::new_clear();
		config.set("Dir::State::status", "tests/files/status/does-not-exist");
		Cache::new(&[PACKAGES]).unwrap()
	}

	#[test]
	fn get_field_rereads_the_loaded_index() {
		let cache = cache();
		let pkg = cache.get("libfoo").unwrap();
		let cand = pkg.candidate().unwrap();

		assert_eq!(
			cand.get_record(RecordField::Maintainer).unwrap(),
			"Test Suite <test@example.com>"
		);
		assert_eq!(cand.get_record(RecordField::Version).unwrap(), cand.version());
		assert_eq!(cand.get_record(RecordField::Depends).unwrap(), "libbar (>= 2.0)");

		// No Homepage field in the fixture.
		assert!(cand.get_record(RecordField::Homepage).is_none());

		// Matches the hash accessor for the same field.
		let libbar = cache.get("libbar").unwrap().candidate().unwrap();
		assert_eq!(libbar.get_record("MD5sum"), libbar.hash("md5sum"));
		assert!(libbar.hash("md5sum").is_some());
	}

	#[test]
	fn descriptions_come_from_the_arena_not_a_reread() {
		let cache = cache();
		let pkg = cache.get("libfoo").unwrap();
		let cand = pkg.candidate().unwrap();

		assert_eq!(cand.summary().as_deref(), Some("Foo library"));
		assert!(cand.description().unwrap().contains("newer release"));
	}
}
