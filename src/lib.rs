//! rust-apt is a native dependency-aware package metadata engine and acquire
//! runtime for Debian-style archives.
//!
//! The source repository is <https://gitlab.com/volian/rust-apt>
//! For more information please see the readme in the source code.

#[macro_use]
pub mod macros;
pub mod acquire;
pub mod archive;
pub mod cache;
pub mod config;
pub mod depcache;
pub mod error;
pub mod hash;
pub mod mmap;
pub mod package;
pub mod pkgmanager;
pub mod policy;
pub mod progress;
pub mod records;
pub mod resolver;
pub mod sourceslist;
pub mod tagfile;
pub mod util;
pub mod version;
