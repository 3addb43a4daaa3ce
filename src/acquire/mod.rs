//! Items, Queues, and Workers: fetches index files and package archives.
//!
//! Grounded on the teacher's `progress.rs`/old `acquire.rs` facade shape and
//! `original_source/apt-pkg/acquire-method.cc`'s queue-per-host, worker-per-queue
//! architecture (`pkgAcquire::Queue`/`pkgAcquire::Worker`).
pub mod item;
pub mod queue;
pub mod wire;
pub mod worker;

pub use item::AcquireItem;
pub use worker::AcquireError;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::debug;

use crate::error::AptErrors;
use crate::progress::{AcquireProgress, FetchPulse, ItemProgress};

impl From<AcquireError> for AptErrors {
	fn from(err: AcquireError) -> Self { AptErrors::from(err.to_string()) }
}

/// An [`AcquireProgress`] shared by every worker thread in a [`fetch`] run.
/// Each callback only holds the lock long enough to forward the call, so
/// network I/O in between never blocks another queue's reporting.
pub(crate) struct SharedProgress<'p, 'a> {
	inner: Mutex<&'p mut AcquireProgress<'a>>,
}

impl<'p, 'a> SharedProgress<'p, 'a> {
	pub(crate) fn new(inner: &'p mut AcquireProgress<'a>) -> Self {
		SharedProgress { inner: Mutex::new(inner) }
	}

	pub(crate) fn hit(&self, item: &ItemProgress) { self.inner.lock().unwrap().hit(item); }

	pub(crate) fn fetch(&self, item: &ItemProgress) { self.inner.lock().unwrap().fetch(item); }

	pub(crate) fn fail(&self, item: &ItemProgress) { self.inner.lock().unwrap().fail(item); }

	pub(crate) fn pulse(&self, pulse: &FetchPulse) { self.inner.lock().unwrap().pulse(pulse); }

	pub(crate) fn done(&self, item: &ItemProgress) { self.inner.lock().unwrap().done(item); }
}

/// Fetch every item. Items are grouped into queues (by host or by access,
/// per `Acquire::QueueMode`); queues run concurrently, up to
/// `Acquire::Queue-Concurrency` at a time (default 4), while the items
/// within a single queue are still run one at a time so a single host is
/// never hit with more than one connection from this process.
pub fn fetch(
	config: &crate::config::Config,
	items: Vec<AcquireItem>,
	progress: &mut AcquireProgress,
) -> Result<(), AptErrors> {
	progress.start();
	let total_bytes: u64 = items.iter().map(|i| i.expected_size).sum();
	let total_items = items.len();

	let mode = queue::QueueMode::from_config(config);
	let mut queues = queue::partition(items, mode);
	debug!(total_items, queue_count = queues.len(), mode = ?mode, "starting acquire run");

	let concurrency = config.int("Acquire::Queue-Concurrency", 4).max(1) as usize;
	// Resolved once, here, on the calling thread: Config is a thread-local
	// handle, so a worker thread spawned below can't read it itself.
	let methods_dir = config.dir("Dir::Bin::Methods", "/usr/lib/apt/methods/");
	let next_id = AtomicUsize::new(0);
	let fetched_bytes = AtomicU64::new(0);
	let shared_progress = SharedProgress::new(progress);
	let first_error: Mutex<Option<AcquireError>> = Mutex::new(None);

	for chunk in queues.chunks_mut(concurrency) {
		std::thread::scope(|scope| {
			for q in chunk.iter_mut() {
				let next_id = &next_id;
				let fetched_bytes = &fetched_bytes;
				let shared_progress = &shared_progress;
				let first_error = &first_error;
				let methods_dir = &methods_dir;
				scope.spawn(move || {
					if let Err(err) = worker::run_queue(methods_dir, q, shared_progress, next_id) {
						first_error.lock().unwrap().get_or_insert(err);
					}
					let queue_bytes: u64 = q.items.iter().map(|i| i.expected_size).sum();
					let done_bytes = fetched_bytes.fetch_add(queue_bytes, Ordering::SeqCst) + queue_bytes;
					shared_progress.pulse(&FetchPulse {
						current_bytes: done_bytes,
						total_bytes,
						current_items: next_id.load(Ordering::SeqCst),
						total_items,
						current_cps: 0,
						elapsed_seconds: 0,
					});
				});
			}
		});
	}

	let stop_pulse = FetchPulse {
		current_bytes: fetched_bytes.load(Ordering::SeqCst),
		total_bytes,
		current_items: next_id.load(Ordering::SeqCst),
		total_items,
		current_cps: 0,
		elapsed_seconds: 0,
	};
	let progress = shared_progress.inner.into_inner().unwrap();
	progress.stop(&stop_pulse);

	if let Some(err) = first_error.into_inner().unwrap() {
		return Err(err.into());
	}
	Ok(())
}
