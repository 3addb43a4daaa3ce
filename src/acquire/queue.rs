//! Groups [`AcquireItem`]s into [`Queue`]s, one worker serializing all
//! transfers within a queue, the way `pkgAcquire::Queue` does.
use std::collections::HashMap;

use super::item::AcquireItem;

#[derive(Debug, Default)]
pub struct Queue {
	pub key: String,
	pub items: Vec<AcquireItem>,
}

/// Which field of an item's URI groups it into a queue. Mirrors apt's
/// `Acquire::QueueMode` config (`host` or `access`, see `apt.conf(5)`):
/// `Host` serializes transfers to the same server (HTTP/1.1-friendly);
/// `Access` serializes by scheme only, useful when a method itself
/// multiplexes connections (e.g. `https` backed by a pooling client).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueMode {
	Host,
	Access,
}

impl QueueMode {
	pub fn from_config(config: &crate::config::Config) -> Self {
		if config.find("Acquire::QueueMode", "host").eq_ignore_ascii_case("access") {
			QueueMode::Access
		} else {
			QueueMode::Host
		}
	}
}

/// Partition `items` into one [`Queue`] per grouping key, chosen by `mode`.
pub fn partition(items: Vec<AcquireItem>, mode: QueueMode) -> Vec<Queue> {
	let mut queues: HashMap<String, Queue> = HashMap::new();
	for item in items {
		let key = match mode {
			QueueMode::Host => item.queue_key(),
			QueueMode::Access => item.scheme().to_string(),
		};
		queues
			.entry(key.clone())
			.or_insert_with(|| Queue {
				key: key.clone(),
				items: Vec::new(),
			})
			.items
			.push(item);
	}
	let mut out: Vec<Queue> = queues.into_values().collect();
	out.sort_by(|a, b| a.key.cmp(&b.key));
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn groups_by_scheme_and_host() {
		let items = vec![
			AcquireItem::new("http://a.example/x.deb", "/tmp/x.deb", "x"),
			AcquireItem::new("http://a.example/y.deb", "/tmp/y.deb", "y"),
			AcquireItem::new("http://b.example/z.deb", "/tmp/z.deb", "z"),
		];
		let queues = partition(items, QueueMode::Host);
		assert_eq!(queues.len(), 2);
		assert_eq!(queues.iter().find(|q| q.key.contains("a.example")).unwrap().items.len(), 2);
	}

	#[test]
	fn access_mode_groups_by_scheme_only() {
		let items = vec![
			AcquireItem::new("http://a.example/x.deb", "/tmp/x.deb", "x"),
			AcquireItem::new("http://b.example/y.deb", "/tmp/y.deb", "y"),
			AcquireItem::new("https://c.example/z.deb", "/tmp/z.deb", "z"),
		];
		let queues = partition(items, QueueMode::Access);
		assert_eq!(queues.len(), 2);
		assert_eq!(queues.iter().find(|q| q.key == "http").unwrap().items.len(), 2);
	}
}
