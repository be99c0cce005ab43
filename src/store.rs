//! Durable key-value storage contracts and built-in backends for token state.
//!
//! Storage only exists so credentials survive a process reload. The in-memory
//! [`TokenStore`](crate::token::TokenStore) stays authoritative; backends never see partial
//! token records, only the three string entries named by [`StorageKeys`].

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

// self
use crate::_prelude::*;

/// Synchronous key-value contract implemented by durable storage backends.
pub trait KeyValueStore
where
	Self: Send + Sync,
{
	/// Reads the value stored under `key`, if any.
	fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

	/// Writes `value` under `key`, replacing any previous value.
	fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

	/// Removes `key`; removing an absent key is not an error.
	fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Error type produced by [`KeyValueStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Storage entry names used by one token domain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageKeys {
	/// Entry holding the access token.
	pub access_token: String,
	/// Entry holding the refresh token.
	pub refresh_token: String,
	/// Entry holding the access-token expiry as epoch milliseconds.
	pub expires_at: String,
}
impl StorageKeys {
	/// Builds keys namespaced under `prefix` (e.g. `primary.access_token`).
	pub fn prefixed(prefix: &str) -> Self {
		Self {
			access_token: format!("{prefix}.access_token"),
			refresh_token: format!("{prefix}.refresh_token"),
			expires_at: format!("{prefix}.access_token_expires_at"),
		}
	}

	/// Returns every key so callers can validate or purge them together.
	pub fn all(&self) -> [&str; 3] {
		[self.access_token.as_str(), self.refresh_token.as_str(), self.expires_at.as_str()]
	}

	pub(crate) fn has_empty_key(&self) -> bool {
		self.all().iter().any(|key| key.trim().is_empty())
	}

	pub(crate) fn has_duplicate_key(&self) -> bool {
		self.access_token == self.refresh_token
			|| self.access_token == self.expires_at
			|| self.refresh_token == self.expires_at
	}
}
