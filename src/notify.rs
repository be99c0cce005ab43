//! Failure notification contract handed to the hosting application.
//!
//! The crate never navigates or renders anything. When a domain's credentials become
//! unusable it emits one [`RenewalFailed`] event per failure episode through the
//! [`FailureListener`] supplied at construction, and the host decides what "signed out"
//! looks like.

// self
use crate::{_prelude::*, error::RenewalError};

/// Why the domain's credentials were dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureCause {
	/// Renewal failed; every credential was cleared.
	Renewal(RenewalError),
	/// An ordinary request was rejected; the refresh token was cleared.
	Unauthorized {
		/// HTTP status code of the rejected response.
		status: u16,
	},
}

/// Event emitted once per failure episode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenewalFailed {
	/// Domain whose credentials failed.
	pub domain: String,
	/// Failure that ended the episode.
	pub cause: FailureCause,
	/// Instant the failure was observed.
	pub observed_at: OffsetDateTime,
}
impl RenewalFailed {
	pub(crate) fn now(domain: &str, cause: FailureCause) -> Self {
		Self { domain: domain.to_owned(), cause, observed_at: OffsetDateTime::now_utc() }
	}
}

/// Receiver of renewal-failure notifications.
pub trait FailureListener
where
	Self: Send + Sync,
{
	/// Called synchronously from the task that observed the failure; must not block.
	fn on_renewal_failed(&self, event: &RenewalFailed);
}
impl<F> FailureListener for F
where
	F: Fn(&RenewalFailed) + Send + Sync,
{
	fn on_renewal_failed(&self, event: &RenewalFailed) {
		self(event)
	}
}

/// Listener that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreFailures;
impl FailureListener for IgnoreFailures {
	fn on_renewal_failed(&self, _: &RenewalFailed) {}
}
