//! Optional observability helpers for renewal episodes.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `bearer_relay.renewal` with the `domain`
//!   and `trigger` fields, plus events for ignored storage failures and credential rotation.
//! - Enable `metrics` to increment the `bearer_relay_renewal_total` counter for every
//!   attempt/reuse/renewal/failure, labeled by `trigger` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// What asked the coordinator to check the domain's credentials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenewalTrigger {
	/// Request middleware ensuring freshness before a call.
	Preflight,
	/// Expiry scheduler tick.
	Scheduled,
	/// A request was rejected with 401 and is waiting to be replayed.
	Rejection,
}
impl RenewalTrigger {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RenewalTrigger::Preflight => "preflight",
			RenewalTrigger::Scheduled => "scheduled",
			RenewalTrigger::Rejection => "rejection",
		}
	}
}
impl Display for RenewalTrigger {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each coordinator entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenewalOutcome {
	/// Entry to the coordinator.
	Attempt,
	/// Current credentials were fresh enough; no network call.
	Reused,
	/// Refresh endpoint issued new credentials.
	Renewed,
	/// Renewal failed and the domain was signed out.
	Failed,
}
impl RenewalOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RenewalOutcome::Attempt => "attempt",
			RenewalOutcome::Reused => "reused",
			RenewalOutcome::Renewed => "renewed",
			RenewalOutcome::Failed => "failed",
		}
	}
}
impl Display for RenewalOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
