//! Snapshot of one token domain's credentials.

// self
use crate::{_prelude::*, token::secret::TokenSecret};

/// Credentials held for a token domain.
///
/// `access_token` and `access_expires_at` are always present or absent together; the
/// [`TokenStore`](crate::token::TokenStore) is the only writer and upholds that pairing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenState {
	/// Short-lived credential attached to outgoing requests.
	pub access_token: Option<TokenSecret>,
	/// Instant at which the access token stops being valid.
	pub access_expires_at: Option<OffsetDateTime>,
	/// Longer-lived credential exchanged for new access tokens.
	pub refresh_token: Option<TokenSecret>,
}
impl TokenState {
	/// Returns `true` when the access token must be renewed before use.
	///
	/// A token is stale once `now + buffer` reaches its expiry; an unknown expiry is always
	/// stale.
	pub fn is_stale_at(&self, buffer: Duration, now: OffsetDateTime) -> bool {
		match self.access_expires_at {
			Some(expires_at) => now + buffer >= expires_at,
			None => true,
		}
	}

	/// Convenience wrapper over [`TokenState::is_stale_at`] using the current UTC clock.
	pub fn is_stale(&self, buffer: Duration) -> bool {
		self.is_stale_at(buffer, OffsetDateTime::now_utc())
	}

	/// Returns `true` when an access token is held.
	pub fn has_access(&self) -> bool {
		self.access_token.is_some()
	}

	/// Returns `true` when no credential of any kind is held.
	pub fn is_empty(&self) -> bool {
		self.access_token.is_none() && self.refresh_token.is_none()
	}

	/// Time left before expiry at `now`, if an expiry is known.
	pub fn remaining_at(&self, now: OffsetDateTime) -> Option<Duration> {
		self.access_expires_at.map(|expires_at| expires_at - now)
	}
}
