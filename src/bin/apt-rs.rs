//! A small demonstration front end over the `rust_apt` library, in the shape
//! of `apt`'s own subcommands: `update`, `list`, `show`, `policy`, `depends`,
//! `install`, `remove`.
//!
//! Grounded on `other_examples/929ec87c_KyoshiHikari-apt-ng__src-cli.rs.rs`
//! for the subcommand set, rewritten against `clap`'s derive API (the crate
//! already depends on `clap` with the `derive` feature) and this crate's own
//! `Cache`/`Config`/`AcquireProgress` surface rather than that example's.
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rust_apt::cache::{Cache, PackageSort};
use rust_apt::error::AptErrors;
use rust_apt::progress::{AcquireProgress, InstallProgress};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "apt-rs", about = "A native apt metadata and acquire runtime, driven from the command line")]
struct Cli {
	/// Treat local `.deb`/`.ddeb`/`Packages`/`Sources` files as part of the cache.
	#[arg(short = 'f', long = "file", global = true)]
	local_files: Vec<String>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// Re-fetch the configured index files.
	Update,
	/// List packages, optionally filtered by name substring.
	List {
		pattern: Option<String>,
		/// Only show packages that are installed.
		#[arg(long)]
		installed: bool,
		/// Only show packages with an available upgrade.
		#[arg(long)]
		upgradable: bool,
	},
	/// Show detailed metadata for one package.
	Show { name: String },
	/// Show the policy (pin priority and candidate) for one package.
	Policy { name: String },
	/// Show the dependencies of a package's candidate version.
	Depends { name: String },
	/// Mark packages for installation and commit the transaction.
	Install { names: Vec<String> },
	/// Mark packages for removal and commit the transaction.
	Remove {
		names: Vec<String>,
		#[arg(long)]
		purge: bool,
	},
}

fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();
	match run(&cli) {
		Ok(()) => ExitCode::SUCCESS,
		Err(errors) => {
			eprint!("{errors}");
			ExitCode::FAILURE
		},
	}
}

fn run(cli: &Cli) -> Result<(), AptErrors> {
	let cache = Cache::new(&cli.local_files)?;

	match &cli.command {
		Command::Update => {
			let mut progress = AcquireProgress::apt();
			cache.update(&mut progress)
		},
		Command::List { pattern, installed, upgradable } => {
			let mut sort = PackageSort::default().names();
			if *installed {
				sort = sort.installed();
			}
			if *upgradable {
				sort = sort.upgradable();
			}
			for pkg in cache.packages(&sort) {
				if let Some(pattern) = pattern {
					if !pkg.name().contains(pattern.as_str()) {
						continue;
					}
				}
				let version = pkg.candidate().or_else(|| pkg.installed());
				match version {
					Some(version) => println!("{}/{} {}", pkg.fullname(true), version.version(), version.arch()),
					None => println!("{} (virtual)", pkg.fullname(true)),
				}
			}
			Ok(())
		},
		Command::Show { name } => {
			let pkg = cache.get(name).ok_or_else(|| not_found(name))?;
			let version = pkg.candidate().or_else(|| pkg.installed()).ok_or_else(|| no_candidate(name))?;
			println!("Package: {}", pkg.fullname(true));
			println!("Version: {}", version.version());
			println!("Architecture: {}", version.arch());
			println!("Section: {}", version.section());
			println!("Installed-Size: {}", version.installed_size());
			if let Some(summary) = version.summary() {
				println!("Description: {summary}");
			}
			if let Some(description) = version.description() {
				println!("{description}");
			}
			Ok(())
		},
		Command::Policy { name } => {
			let pkg = cache.get(name).ok_or_else(|| not_found(name))?;
			println!("{}:", pkg.fullname(true));
			match pkg.installed() {
				Some(v) => println!("  Installed: {}", v.version()),
				None => println!("  Installed: (none)"),
			}
			match pkg.candidate() {
				Some(v) => println!("  Candidate: {} ({})", v.version(), v.priority()),
				None => println!("  Candidate: (none)"),
			}
			for version in pkg.versions() {
				println!("  {} {}", version.priority(), version.version());
			}
			Ok(())
		},
		Command::Depends { name } => {
			let pkg = cache.get(name).ok_or_else(|| not_found(name))?;
			let version = pkg.candidate().or_else(|| pkg.installed()).ok_or_else(|| no_candidate(name))?;
			if let Some(deps) = version.dependencies() {
				for dep in deps {
					println!("{dep}");
				}
			}
			Ok(())
		},
		Command::Install { names } => {
			for name in names {
				let pkg = cache.get(name).ok_or_else(|| not_found(name))?;
				pkg.mark_install(true, true);
				pkg.protect();
			}
			cache.resolve(true)?;
			commit(&cache)
		},
		Command::Remove { names, purge } => {
			for name in names {
				let pkg = cache.get(name).ok_or_else(|| not_found(name))?;
				pkg.mark_delete(*purge);
				pkg.protect();
			}
			cache.resolve(false)?;
			commit(&cache)
		},
	}
}

fn commit(cache: &Cache) -> Result<(), AptErrors> {
	let mut acquire_progress = AcquireProgress::apt();
	let mut install_progress = InstallProgress::apt();
	cache.commit(&mut acquire_progress, &mut install_progress)
}

fn not_found(name: &str) -> AptErrors { AptErrors::from(format!("unable to locate package {name}")) }

fn no_candidate(name: &str) -> AptErrors { AptErrors::from(format!("package {name} has no candidate version")) }
