//! Proactive expiry checks that renew credentials between requests.

// crates.io
use tokio::{
	task::JoinHandle,
	time::{self, Instant, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*, config::DomainConfig, error::RenewalError, obs::RenewalTrigger,
	renewal::TokenManager,
};

/// Result of a single scheduler tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
	/// No access token is held; nothing to check.
	SignedOut,
	/// Credentials were fresh or have been renewed.
	Checked,
	/// Renewal failed; the domain has been signed out and the listener notified.
	Failed(RenewalError),
}

/// Periodic freshness check for one token domain.
#[derive(Clone, Debug)]
pub struct ExpiryScheduler {
	manager: Arc<TokenManager>,
	interval: Duration,
	buffer: Duration,
}
impl ExpiryScheduler {
	/// Creates a scheduler; non-positive intervals fall back to
	/// [`DomainConfig::DEFAULT_CHECK_INTERVAL`].
	pub fn new(manager: Arc<TokenManager>, interval: Duration, buffer: Duration) -> Self {
		let interval =
			if interval.is_positive() { interval } else { DomainConfig::DEFAULT_CHECK_INTERVAL };

		Self { manager, interval, buffer }
	}

	/// Uses the domain's check interval and freshness buffer.
	pub fn from_config(manager: Arc<TokenManager>, config: &DomainConfig) -> Self {
		Self::new(manager, config.check_interval, config.freshness_buffer)
	}

	/// Returns the tick period.
	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Runs one freshness check.
	pub async fn tick(&self) -> TickOutcome {
		if !self.manager.tokens().has_access() {
			return TickOutcome::SignedOut;
		}

		match self.manager.ensure_fresh_with(self.buffer, RenewalTrigger::Scheduled).await {
			Ok(()) => TickOutcome::Checked,
			Err(e) => TickOutcome::Failed(e),
		}
	}

	/// Spawns the check loop on the current Tokio runtime; the first tick fires one interval
	/// from now.
	pub fn spawn(self) -> SchedulerHandle {
		let period = std::time::Duration::try_from(self.interval)
			.unwrap_or(std::time::Duration::from_secs(30));
		let task = tokio::spawn(async move {
			let mut ticker = time::interval_at(Instant::now() + period, period);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				ticker.tick().await;

				self.tick().await;
			}
		});

		SchedulerHandle(task)
	}
}

/// Owns a spawned scheduler loop; dropping the handle stops it.
#[derive(Debug)]
pub struct SchedulerHandle(JoinHandle<()>);
impl SchedulerHandle {
	/// Stops the loop.
	pub fn stop(self) {
		self.0.abort();
	}

	/// Returns `true` once the loop has stopped.
	pub fn is_finished(&self) -> bool {
		self.0.is_finished()
	}
}
impl Drop for SchedulerHandle {
	fn drop(&mut self) {
		self.0.abort();
	}
}
