//! Per-domain credential holder backed by durable storage.
//!
//! [`TokenStore`] keeps the authoritative [`TokenState`] in memory and mirrors every mutation
//! into a [`KeyValueStore`] so a reloaded process can pick up where it left off. Storage
//! writes run in order behind the in-memory update; failures are logged and swallowed, so a
//! broken disk never signs a running client out.

pub mod claims;
pub mod secret;
pub mod state;

mod persist;

pub use claims::*;
pub use secret::*;
pub use state::*;

// self
use crate::{
	_prelude::*,
	obs,
	store::{KeyValueStore, StorageKeys},
	token::persist::{PersistQueue, StorageWrite},
};

/// Fields to write into a [`TokenStore`]; absent fields are left untouched.
#[derive(Clone, Debug, Default)]
pub struct TokenUpdate {
	/// Replacement access token.
	pub access_token: Option<TokenSecret>,
	/// Replacement refresh token.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime reported alongside the access token, used when its claims carry no expiry.
	pub expires_in: Option<Duration>,
}
impl TokenUpdate {
	/// Starts an update that replaces the access token.
	pub fn access(token: impl Into<String>) -> Self {
		Self { access_token: Some(TokenSecret::new(token)), ..Default::default() }
	}

	/// Adds (or replaces) the refresh token.
	pub fn with_refresh(mut self, token: impl Into<String>) -> Self {
		self.refresh_token = Some(TokenSecret::new(token));

		self
	}

	/// Adds a lifetime hint for opaque access tokens.
	pub fn with_expires_in(mut self, ttl: Duration) -> Self {
		self.expires_in = Some(ttl);

		self
	}

	/// Returns `true` when the update carries no credential.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}
}

/// Authoritative credential state for one token domain.
///
/// Memory is updated under a short lock; durable writes are queued in the same order and
/// applied off the caller's path. Call [`flush`](Self::flush) to wait for them.
pub struct TokenStore {
	domain: String,
	keys: StorageKeys,
	state: Mutex<TokenState>,
	writes: PersistQueue,
}
impl TokenStore {
	/// Loads the domain's credentials from `storage`; unreadable entries are treated as absent.
	pub fn load(
		domain: impl Into<String>,
		keys: StorageKeys,
		storage: Arc<dyn KeyValueStore>,
	) -> Self {
		let domain = domain.into();
		let read = |key: &str| match storage.get(key) {
			Ok(value) => value.filter(|v| !v.is_empty()),
			Err(e) => {
				obs::log_storage_failure(&domain, "get", key, &e);

				None
			},
		};
		let access_token = read(&keys.access_token).map(TokenSecret::new);
		let refresh_token = read(&keys.refresh_token).map(TokenSecret::new);
		let stored_expiry = read(&keys.expires_at)
			.and_then(|raw| raw.parse::<i64>().ok())
			.and_then(|ms| {
				OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000).ok()
			});
		let access_expires_at = access_token.as_ref().map(|token| {
			stored_expiry.unwrap_or_else(|| {
				resolve_expiry(&domain, token, None, OffsetDateTime::now_utc())
			})
		});
		let state = TokenState { access_token, access_expires_at, refresh_token };
		let writes = PersistQueue::new(domain.clone(), storage);

		Self { domain, keys, state: Mutex::new(state), writes }
	}

	/// Returns the domain label this store belongs to.
	pub fn domain(&self) -> &str {
		&self.domain
	}

	/// Returns a snapshot of the current credentials.
	pub fn get(&self) -> TokenState {
		self.state.lock().clone()
	}

	/// Writes the provided fields; writing an access token recomputes its expiry.
	pub fn set(&self, access: Option<&str>, refresh: Option<&str>) {
		self.apply(TokenUpdate {
			access_token: access.map(TokenSecret::new),
			refresh_token: refresh.map(TokenSecret::new),
			expires_in: None,
		});
	}

	/// Applies `update` and queues it for durable storage.
	pub fn apply(&self, update: TokenUpdate) {
		if update.is_empty() {
			return;
		}

		let expires_at = update.access_token.as_ref().map(|access| {
			resolve_expiry(&self.domain, access, update.expires_in, OffsetDateTime::now_utc())
		});
		let start = {
			let mut state = self.state.lock();
			let mut writes = Vec::with_capacity(3);

			if let (Some(access), Some(expires_at)) = (update.access_token, expires_at) {
				writes.push(StorageWrite::set(&self.keys.access_token, access.expose()));
				writes.push(StorageWrite::set(
					&self.keys.expires_at,
					unix_millis(expires_at).to_string(),
				));

				state.access_token = Some(access);
				state.access_expires_at = Some(expires_at);
			}
			if let Some(refresh) = update.refresh_token {
				writes.push(StorageWrite::set(&self.keys.refresh_token, refresh.expose()));

				state.refresh_token = Some(refresh);
			}

			self.writes.enqueue(writes)
		};

		if start {
			self.writes.start();
		}
	}

	/// Drops every credential; returns `true` if anything was held.
	pub fn clear(&self) -> bool {
		let (held, start) = {
			let mut state = self.state.lock();
			let held = !state.is_empty();

			*state = TokenState::default();

			(held, self.writes.enqueue(self.keys.all().map(StorageWrite::remove)))
		};

		if start {
			self.writes.start();
		}

		held
	}

	/// Drops only the refresh token; returns `true` if one was held.
	pub fn clear_refresh(&self) -> bool {
		let (held, start) = {
			let mut state = self.state.lock();
			let held = state.refresh_token.take().is_some();

			(held, self.writes.enqueue([StorageWrite::remove(&self.keys.refresh_token)]))
		};

		if start {
			self.writes.start();
		}

		held
	}

	/// Waits until every queued storage write has been applied.
	pub async fn flush(&self) {
		self.writes.flush().await;
	}
}
impl Debug for TokenStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenStore")
			.field("domain", &self.domain)
			.field("keys", &self.keys)
			.field("state", &*self.state.lock())
			.field("queued_writes", &self.writes.queued())
			.finish()
	}
}

fn resolve_expiry(
	domain: &str,
	access: &TokenSecret,
	fallback: Option<Duration>,
	now: OffsetDateTime,
) -> OffsetDateTime {
	match claims::decode_expiry(access.expose()) {
		Ok(expires_at) => expires_at,
		Err(e) => {
			obs::log_opaque_expiry(domain, &e, fallback);

			fallback.and_then(|ttl| now.checked_add(ttl)).unwrap_or(now)
		},
	}
}

fn unix_millis(instant: OffsetDateTime) -> i64 {
	let millis = instant.unix_timestamp_nanos() / 1_000_000;

	i64::try_from(millis).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
	// std
	use std::{thread, time::Instant};
	// self
	use super::*;
	use crate::{
		_preludet::jwt_expiring_in,
		store::{MemoryStorage, StoreError},
	};

	struct BrokenStorage;
	impl KeyValueStore for BrokenStorage {
		fn get(&self, _: &str) -> Result<Option<String>, StoreError> {
			Err(StoreError::Backend { message: "unavailable".into() })
		}

		fn set(&self, _: &str, _: &str) -> Result<(), StoreError> {
			Err(StoreError::Backend { message: "read-only".into() })
		}

		fn remove(&self, _: &str) -> Result<(), StoreError> {
			Err(StoreError::Backend { message: "read-only".into() })
		}
	}

	struct SlowStorage {
		inner: MemoryStorage,
		delay: std::time::Duration,
	}
	impl KeyValueStore for SlowStorage {
		fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
			self.inner.get(key)
		}

		fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
			thread::sleep(self.delay);

			self.inner.set(key, value)
		}

		fn remove(&self, key: &str) -> Result<(), StoreError> {
			thread::sleep(self.delay);

			self.inner.remove(key)
		}
	}

	fn memory_store() -> (TokenStore, MemoryStorage) {
		let backend = MemoryStorage::default();
		let store = TokenStore::load(
			"primary",
			StorageKeys::prefixed("primary"),
			Arc::new(backend.clone()),
		);

		(store, backend)
	}

	#[test]
	fn set_access_recomputes_expiry_from_claims() {
		let (store, backend) = memory_store();
		let access = jwt_expiring_in(Duration::hours(1), "user");

		store.set(Some(&access), Some("refresh-1"));

		let state = store.get();
		let remaining = state
			.remaining_at(OffsetDateTime::now_utc())
			.expect("Access token should carry an expiry.");

		assert!(remaining > Duration::minutes(59) && remaining <= Duration::hours(1));
		assert_eq!(state.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));
		assert_eq!(backend.snapshot().len(), 3);
	}

	#[test]
	fn set_writes_only_provided_fields() {
		let (store, _) = memory_store();
		let access = jwt_expiring_in(Duration::hours(1), "user");

		store.set(Some(&access), Some("refresh-1"));
		store.set(None, Some("refresh-2"));

		let state = store.get();

		assert_eq!(state.access_token.as_ref().map(TokenSecret::expose), Some(access.as_str()));
		assert_eq!(state.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-2"));
	}

	#[test]
	fn opaque_access_uses_expires_in_or_is_immediately_stale() {
		let (store, _) = memory_store();

		store.apply(TokenUpdate::access("opaque").with_expires_in(Duration::minutes(5)));

		assert!(!store.get().is_stale(Duration::seconds(10)));

		store.set(Some("opaque-2"), None);

		let state = store.get();

		assert!(state.access_expires_at.is_some());
		assert!(state.is_stale(Duration::ZERO));
	}

	#[test]
	fn unrepresentable_lifetime_falls_back_to_stale() {
		let (store, _) = memory_store();

		store.apply(TokenUpdate::access("opaque").with_expires_in(Duration::seconds(i64::MAX)));

		let state = store.get();

		assert!(state.has_access());
		assert!(state.is_stale(Duration::ZERO));
	}

	#[test]
	fn clear_is_atomic_and_purges_storage() {
		let (store, backend) = memory_store();

		store.set(Some(&jwt_expiring_in(Duration::hours(1), "user")), Some("refresh"));

		assert!(store.clear());

		let state = store.get();

		assert!(state.access_token.is_none());
		assert!(state.access_expires_at.is_none());
		assert!(state.refresh_token.is_none());
		assert!(backend.is_empty());
		assert!(!store.clear());
	}

	#[test]
	fn clear_refresh_keeps_access_token() {
		let (store, backend) = memory_store();

		store.set(Some(&jwt_expiring_in(Duration::hours(1), "user")), Some("refresh"));

		assert!(store.clear_refresh());
		assert!(!store.clear_refresh());

		let state = store.get();

		assert!(state.has_access());
		assert!(state.refresh_token.is_none());
		assert!(!backend.snapshot().contains_key("primary.refresh_token"));
	}

	#[test]
	fn reload_restores_state_from_storage() {
		let (store, backend) = memory_store();
		let access = jwt_expiring_in(Duration::minutes(30), "user");

		store.set(Some(&access), Some("refresh"));

		let before = store.get();
		let reloaded =
			TokenStore::load("primary", StorageKeys::prefixed("primary"), Arc::new(backend));
		let after = reloaded.get();

		assert_eq!(after.access_token, before.access_token);
		assert_eq!(after.refresh_token, before.refresh_token);
		assert_eq!(
			after.access_expires_at.map(unix_millis),
			before.access_expires_at.map(unix_millis)
		);
	}

	#[test]
	fn reload_without_stored_expiry_decodes_claims() {
		let access = jwt_expiring_in(Duration::minutes(30), "user");
		let backend = MemoryStorage::with_entries([("primary.access_token", access.as_str())]);
		let store =
			TokenStore::load("primary", StorageKeys::prefixed("primary"), Arc::new(backend));

		assert!(!store.get().is_stale(Duration::minutes(1)));
	}

	#[tokio::test]
	async fn slow_storage_never_blocks_readers() {
		let backend = MemoryStorage::default();
		let slow = SlowStorage { inner: backend.clone(), delay: std::time::Duration::from_millis(200) };
		let store = TokenStore::load("primary", StorageKeys::prefixed("primary"), Arc::new(slow));
		let started = Instant::now();

		store.set(Some(&jwt_expiring_in(Duration::hours(1), "user")), Some("refresh"));

		let state = store.get();
		let persisted_early = !backend.is_empty();
		let elapsed = started.elapsed();

		assert!(state.has_access());
		assert!(elapsed < std::time::Duration::from_millis(200));
		assert!(!persisted_early);

		store.clear_refresh();
		store.flush().await;

		let snapshot = backend.snapshot();

		assert_eq!(snapshot.len(), 2);
		assert!(!snapshot.contains_key("primary.refresh_token"));
	}

	#[test]
	fn storage_failures_never_reach_callers() {
		let store =
			TokenStore::load("primary", StorageKeys::prefixed("primary"), Arc::new(BrokenStorage));

		assert!(store.get().is_empty());

		store.set(Some(&jwt_expiring_in(Duration::hours(1), "user")), Some("refresh"));

		assert!(store.get().has_access());
		assert!(store.clear());
		assert!(store.get().is_empty());
	}
}
