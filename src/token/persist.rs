//! Ordered mirroring of token mutations into durable storage, kept off the state lock.

// crates.io
use tokio::{runtime::Handle, sync::Notify};
// self
use crate::{_prelude::*, obs, store::KeyValueStore};

/// One durable mutation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum StorageWrite {
	Set { key: String, value: String },
	Remove { key: String },
}
impl StorageWrite {
	pub(crate) fn set(key: &str, value: impl Into<String>) -> Self {
		Self::Set { key: key.to_owned(), value: value.into() }
	}

	pub(crate) fn remove(key: &str) -> Self {
		Self::Remove { key: key.to_owned() }
	}
}

#[derive(Default)]
struct Pending {
	writes: VecDeque<StorageWrite>,
	draining: bool,
}

struct Writer {
	domain: String,
	storage: Arc<dyn KeyValueStore>,
	pending: Mutex<Pending>,
	idle: Notify,
}
impl Writer {
	fn drain(&self) {
		loop {
			let write = {
				let mut pending = self.pending.lock();

				match pending.writes.pop_front() {
					Some(write) => write,
					None => {
						pending.draining = false;

						break;
					},
				}
			};

			self.apply(write);
		}

		self.idle.notify_waiters();
	}

	fn apply(&self, write: StorageWrite) {
		let (action, key, result) = match &write {
			StorageWrite::Set { key, value } => ("set", key, self.storage.set(key, value)),
			StorageWrite::Remove { key } => ("remove", key, self.storage.remove(key)),
		};

		if let Err(e) = result {
			obs::log_storage_failure(&self.domain, action, key, &e);
		}
	}

	fn is_idle(&self) -> bool {
		let pending = self.pending.lock();

		pending.writes.is_empty() && !pending.draining
	}
}

/// FIFO queue drained by at most one worker at a time.
///
/// Inside a Tokio runtime the worker runs on the blocking pool; elsewhere the caller drains
/// inline.
pub(crate) struct PersistQueue(Arc<Writer>);
impl PersistQueue {
	pub(crate) fn new(domain: String, storage: Arc<dyn KeyValueStore>) -> Self {
		Self(Arc::new(Writer {
			domain,
			storage,
			pending: Mutex::new(Pending::default()),
			idle: Notify::new(),
		}))
	}

	/// Queues `writes`; returns `true` when the caller must [`start`](Self::start) a worker.
	///
	/// Cheap enough to call under the token-state lock, which keeps storage order equal to
	/// memory order.
	pub(crate) fn enqueue(&self, writes: impl IntoIterator<Item = StorageWrite>) -> bool {
		let mut pending = self.0.pending.lock();

		pending.writes.extend(writes);

		if pending.draining || pending.writes.is_empty() {
			return false;
		}

		pending.draining = true;

		true
	}

	pub(crate) fn start(&self) {
		let writer = self.0.clone();

		match Handle::try_current() {
			Ok(handle) => {
				handle.spawn_blocking(move || writer.drain());
			},
			Err(_) => writer.drain(),
		}
	}

	pub(crate) fn queued(&self) -> usize {
		self.0.pending.lock().writes.len()
	}

	pub(crate) async fn flush(&self) {
		loop {
			let idle = self.0.idle.notified();

			if self.0.is_idle() {
				return;
			}

			idle.await;
		}
	}
}
