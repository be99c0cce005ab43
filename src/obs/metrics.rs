// std
use std::time::Duration as StdDuration;
// self
use crate::obs::{RenewalOutcome, RenewalTrigger};

/// Counts one renewal step for `domain`, split by what set the renewal in motion.
///
/// Emits `bearer_relay_renewal_total{domain, trigger, outcome}` when the `metrics` feature is
/// enabled.
pub fn record_renewal_outcome(domain: &str, trigger: RenewalTrigger, outcome: RenewalOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"bearer_relay_renewal_total",
		"domain" => domain.to_owned(),
		"trigger" => trigger.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (domain, trigger, outcome);
}

/// Times one refresh-endpoint round trip.
///
/// Emits `bearer_relay_refresh_seconds{domain, trigger, result}`; `result` is `ok` or `error`.
pub fn record_refresh_round_trip(
	domain: &str,
	trigger: RenewalTrigger,
	elapsed: StdDuration,
	succeeded: bool,
) {
	#[cfg(feature = "metrics")]
	metrics::histogram!(
		"bearer_relay_refresh_seconds",
		"domain" => domain.to_owned(),
		"trigger" => trigger.as_str(),
		"result" => if succeeded { "ok" } else { "error" }
	)
	.record(elapsed.as_secs_f64());

	#[cfg(not(feature = "metrics"))]
	let _ = (domain, trigger, elapsed, succeeded);
}

/// Publishes how many rejected requests are parked behind a renewal.
pub fn record_replay_backlog(domain: &str, depth: usize) {
	#[cfg(feature = "metrics")]
	metrics::gauge!("bearer_relay_queued_replays", "domain" => domain.to_owned()).set(depth as f64);

	#[cfg(not(feature = "metrics"))]
	let _ = (domain, depth);
}
