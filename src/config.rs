//! A native `::`-keyed configuration tree, replacing the teacher's binding
//! onto the C++ `Configuration` singleton.
//!
//! Grounded on the teacher's `config.rs` (kept the `Config`/`ConfigTree`
//! accessor surface: `find`/`file`/`dir`/`bool`/`int`/`find_vector`/`tree`/
//! `root_tree`/`set`/`clear*`/`dump`/`get_architectures`) but backed by a
//! plain tree of nodes behind a thread-local instead of `cxx::UniquePtr`.
use std::cell::RefCell;
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone)]
struct Node {
	value: Option<String>,
	children: BTreeMap<String, Node>,
}

impl Node {
	fn get<'a>(&'a self, path: &[&str]) -> Option<&'a Node> {
		match path.split_first() {
			None => Some(self),
			Some((head, rest)) => self.children.get(*head).and_then(|c| c.get(rest)),
		}
	}

	fn get_or_create(&mut self, path: &[&str]) -> &mut Node {
		match path.split_first() {
			None => self,
			Some((head, rest)) => self
				.children
				.entry((*head).to_string())
				.or_default()
				.get_or_create(rest),
		}
	}

	fn remove(&mut self, path: &[&str]) {
		match path.split_first() {
			None => *self = Node::default(),
			Some((head, [])) => {
				self.children.remove(*head);
			},
			Some((head, rest)) => {
				if let Some(child) = self.children.get_mut(*head) {
					child.remove(rest);
				}
			},
		}
	}

	fn dump(&self, prefix: &str, out: &mut String) {
		if let Some(value) = &self.value {
			out.push_str(prefix);
			out.push('=');
			out.push_str(value);
			out.push('\n');
		}
		for (key, child) in &self.children {
			let child_prefix = if prefix.is_empty() {
				key.clone()
			} else {
				format!("{prefix}::{key}")
			};
			child.dump(&child_prefix, out);
		}
	}
}

fn split(key: &str) -> Vec<&str> { key.split("::").filter(|s| !s.is_empty()).collect() }

thread_local! {
	static ROOT: RefCell<Node> = RefCell::new(default_node());
}

fn default_node() -> Node {
	let mut root = Node::default();
	root.get_or_create(&["APT", "Architecture"]).value = Some(default_architecture());
	root.get_or_create(&["Dir", "Cache", "Archives"]).value =
		Some("/var/cache/apt/archives/".to_string());
	root.get_or_create(&["Dir", "State", "status"]).value =
		Some("/var/lib/dpkg/status".to_string());
	root.get_or_create(&["Dir", "Etc", "sourcelist"]).value =
		Some("/etc/apt/sources.list".to_string());
	root.get_or_create(&["Dir", "Etc", "sourceparts"]).value =
		Some("/etc/apt/sources.list.d/".to_string());
	root
}

fn default_architecture() -> String {
	if cfg!(target_arch = "x86_64") {
		"amd64".to_string()
	} else if cfg!(target_arch = "aarch64") {
		"arm64".to_string()
	} else {
		std::env::consts::ARCH.to_string()
	}
}

/// Apt Configuration. All values live in a single process-wide tree (mirroring
/// the original `_config` singleton); this struct is a cheap, stateless handle
/// onto it.
#[derive(Debug, Default)]
pub struct Config {}

impl Config {
	/// Create a new config handle, initializing the configuration system if
	/// this is the first one constructed.
	pub fn new() -> Self { Config {} }

	/// Clears all configurations, re-initializes, and returns the handle.
	pub fn new_clear() -> Self {
		ROOT.with(|r| *r.borrow_mut() = Node::default());
		Self::new()
	}

	pub fn reset(&self) {
		self.clear_all();
		ROOT.with(|r| *r.borrow_mut() = default_node());
	}

	pub fn clear(&self, key: &str) { ROOT.with(|r| r.borrow_mut().remove(&split(key))); }

	pub fn clear_value(&self, key: &str, value: &str) {
		ROOT.with(|r| {
			let mut root = r.borrow_mut();
			let node = root.get_or_create(&split(key));
			if node.value.as_deref() == Some(value) {
				node.value = None;
			}
		});
	}

	pub fn clear_all(&self) { ROOT.with(|r| *r.borrow_mut() = Node::default()); }

	pub fn dump(&self) -> String {
		ROOT.with(|r| {
			let mut out = String::new();
			r.borrow().dump("", &mut out);
			out
		})
	}

	pub fn find(&self, key: &str, default: &str) -> String {
		ROOT.with(|r| {
			r.borrow()
				.get(&split(key))
				.and_then(|n| n.value.clone())
				.unwrap_or_else(|| default.to_string())
		})
	}

	pub fn get(&self, key: &str) -> Option<String> {
		let value = self.find(key, "");
		if value.is_empty() { None } else { Some(value) }
	}

	/// Find a file and return its value. Unlike [`Config::dir`] this does not
	/// force a trailing `/`.
	pub fn file(&self, key: &str, default: &str) -> String { self.find(key, default) }

	/// Find a directory and return its value with a trailing `/`.
	pub fn dir(&self, key: &str, default: &str) -> String {
		let mut value = self.find(key, default);
		if !value.ends_with('/') {
			value.push('/');
		}
		value
	}

	pub fn bool(&self, key: &str, default: bool) -> bool {
		match self.get(key).as_deref() {
			Some("true" | "yes" | "1" | "on") => true,
			Some("false" | "no" | "0" | "off") => false,
			_ => default,
		}
	}

	pub fn int(&self, key: &str, default: i32) -> i32 {
		self.get(key).and_then(|v| v.parse().ok()).unwrap_or(default)
	}

	/// Return a vector for an Apt configuration list (`Key::0`, `Key::1`, ...).
	pub fn find_vector(&self, key: &str) -> Vec<String> {
		ROOT.with(|r| {
			let root = r.borrow();
			match root.get(&split(key)) {
				Some(node) => node.children.values().filter_map(|c| c.value.clone()).collect(),
				None => Vec::new(),
			}
		})
	}

	/// Supported architectures; the primary architecture is always first.
	pub fn get_architectures(&self) -> Vec<String> {
		let mut archs = self.find_vector("APT::Architectures");
		let primary = self.find("APT::Architecture", &default_architecture());
		archs.retain(|a| a != &primary);
		archs.insert(0, primary);
		archs
	}

	pub fn contains(&self, key: &str) -> bool { self.get(key).is_some() }

	pub fn set(&self, key: &str, value: &str) {
		ROOT.with(|r| r.borrow_mut().get_or_create(&split(key)).value = Some(value.to_string()));
	}

	pub fn tree(&self, key: &str) -> ConfigTree {
		let parts = split(key);
		ROOT.with(|r| {
			let root = r.borrow();
			let node = root.get(&parts).cloned().unwrap_or_default();
			node_to_tree(parts.last().copied().unwrap_or(""), &node)
		})
	}

	pub fn root_tree(&self) -> ConfigTree { ROOT.with(|r| node_to_tree("", &r.borrow())) }

	/// Add values from a slice into an apt configuration list.
	pub fn set_vector(&self, key: &str, values: &[&str]) {
		let mut vec_key = key.to_string();
		if !vec_key.ends_with("::") {
			vec_key.push_str("::");
		}
		for (i, value) in values.iter().enumerate() {
			self.set(&format!("{vec_key}{i}"), value);
		}
	}
}

fn node_to_tree(tag: &str, node: &Node) -> ConfigTree {
	ConfigTree {
		tag: tag.to_string(),
		value: node.value.clone(),
		children: node.children.iter().map(|(k, v)| node_to_tree(k, v)).collect(),
	}
}

/// An owned snapshot of a subtree of the configuration, taken at the time
/// [`Config::tree`]/[`Config::root_tree`] was called.
#[derive(Debug, Clone, Default)]
pub struct ConfigTree {
	tag: String,
	value: Option<String>,
	children: Vec<ConfigTree>,
}

impl ConfigTree {
	pub fn tag(&self) -> Option<&str> {
		if self.tag.is_empty() { None } else { Some(&self.tag) }
	}

	pub fn value(&self) -> Option<&str> { self.value.as_deref() }

	pub fn children(&self) -> &[ConfigTree] { &self.children }

	pub fn iter(&self) -> std::slice::Iter<'_, ConfigTree> { self.children.iter() }
}

impl<'a> IntoIterator for &'a ConfigTree {
	type IntoIter = std::slice::Iter<'a, ConfigTree>;
	type Item = &'a ConfigTree;

	fn into_iter(self) -> Self::IntoIter { self.iter() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn set_and_find_roundtrip() {
		let config = Config::new_clear();
		config.set("Test::Key", "value");
		assert_eq!(config.find("Test::Key", "default"), "value");
		assert_eq!(config.find("Test::Missing", "default"), "default");
	}

	#[test]
	fn dir_forces_trailing_slash() {
		let config = Config::new_clear();
		config.set("Dir::Foo", "/tmp/foo");
		assert_eq!(config.dir("Dir::Foo", "/nope"), "/tmp/foo/");
	}

	#[test]
	fn find_vector_collects_list_children() {
		let config = Config::new_clear();
		config.set_vector("My::List", &["a", "b", "c"]);
		assert_eq!(config.find_vector("My::List"), vec!["a", "b", "c"]);
	}

	#[test]
	fn tree_reflects_nested_structure() {
		let config = Config::new_clear();
		config.set("A::B::C", "1");
		let tree = config.tree("A");
		assert_eq!(tree.tag(), Some("A"));
		let child = &tree.children()[0];
		assert_eq!(child.tag(), Some("B"));
	}
}
