//! Thread-safe in-memory [`KeyValueStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{KeyValueStore, StoreError},
};

type EntryMap = Arc<RwLock<HashMap<String, String>>>;

/// Storage backend that keeps entries in-process; clones share the same map.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage(EntryMap);
impl MemoryStorage {
	/// Creates a store pre-populated with `entries`, e.g. to simulate a reload.
	pub fn with_entries<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		let map = entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect();

		Self(Arc::new(RwLock::new(map)))
	}

	/// Returns a sorted copy of every entry.
	pub fn snapshot(&self) -> BTreeMap<String, String> {
		self.0.read().iter().map(|(k, v)| (k.clone(), v.clone())).collect()
	}

	/// Returns `true` when no entries are stored.
	pub fn is_empty(&self) -> bool {
		self.0.read().is_empty()
	}
}
impl KeyValueStore for MemoryStorage {
	fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.0.read().get(key).cloned())
	}

	fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
		self.0.write().insert(key.to_owned(), value.to_owned());

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.0.write().remove(key);

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn clones_share_entries() {
		let store = MemoryStorage::default();
		let view = store.clone();

		store.set("primary.access_token", "a").expect("Memory set should not fail.");

		assert_eq!(
			view.get("primary.access_token").expect("Memory get should not fail."),
			Some("a".into())
		);

		view.remove("primary.access_token").expect("Memory remove should not fail.");
		view.remove("primary.access_token").expect("Removing an absent key should not fail.");

		assert!(store.is_empty());
	}

	#[test]
	fn with_entries_seeds_snapshot() {
		let store = MemoryStorage::with_entries([("b", "2"), ("a", "1")]);
		let snapshot = store.snapshot();

		assert_eq!(snapshot.keys().map(String::as_str).collect::<Vec<_>>(), ["a", "b"]);
	}
}
