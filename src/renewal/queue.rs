//! Ordered replay queue for requests rejected while credentials were stale.

// self
use crate::{_prelude::*, error::RenewalError, token::TokenSecret};

/// Outcome delivered to every queued replay when a renewal settles.
pub type ReplayOutcome = Result<TokenSecret, RenewalError>;

/// Deferred replay of a rejected request; invoked exactly once with the renewal outcome.
pub type Replay = Box<dyn FnOnce(ReplayOutcome) + Send>;

/// Role assigned to a caller when its replay is admitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Admission {
	/// No renewal was in flight; the caller must drive one and settle the queue.
	Leader,
	/// A renewal is already in flight; the caller only waits.
	Follower,
}

#[derive(Default)]
struct QueueState {
	in_flight: bool,
	entries: VecDeque<Replay>,
}

/// FIFO of replays waiting on the in-flight renewal.
#[derive(Default)]
pub(crate) struct RetryQueue(Mutex<QueueState>);
impl RetryQueue {
	/// Appends `replay`; the first admission of an episode becomes its leader.
	pub(crate) fn admit(&self, replay: Replay) -> Admission {
		let mut state = self.0.lock();

		state.entries.push_back(replay);

		if state.in_flight {
			Admission::Follower
		} else {
			state.in_flight = true;

			Admission::Leader
		}
	}

	/// Ends the episode and invokes every queued replay in admission order.
	pub(crate) fn settle(&self, outcome: ReplayOutcome) -> usize {
		let entries = {
			let mut state = self.0.lock();

			state.in_flight = false;

			std::mem::take(&mut state.entries)
		};
		let settled = entries.len();

		for replay in entries {
			replay(outcome.clone());
		}

		settled
	}

	pub(crate) fn len(&self) -> usize {
		self.0.lock().entries.len()
	}
}

/// Settles the queue with [`RenewalError::Abandoned`] unless settled explicitly, so followers
/// never hang when the leader's future is dropped mid-renewal.
pub(crate) struct SettleGuard<'a> {
	queue: &'a RetryQueue,
	armed: bool,
}
impl<'a> SettleGuard<'a> {
	pub(crate) fn new(queue: &'a RetryQueue) -> Self {
		Self { queue, armed: true }
	}

	pub(crate) fn settle(mut self, outcome: ReplayOutcome) -> usize {
		self.armed = false;

		self.queue.settle(outcome)
	}
}
impl Drop for SettleGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			self.queue.settle(Err(RenewalError::Abandoned));
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	type Log = Arc<Mutex<Vec<(usize, ReplayOutcome)>>>;

	fn recording(log: &Log, idx: usize) -> Replay {
		let log = log.clone();

		Box::new(move |outcome| log.lock().push((idx, outcome)))
	}

	#[test]
	fn first_admission_leads_and_settle_resets_episode() {
		let queue = RetryQueue::default();
		let log = Log::default();

		assert_eq!(queue.admit(recording(&log, 0)), Admission::Leader);
		assert_eq!(queue.admit(recording(&log, 1)), Admission::Follower);
		assert_eq!(queue.admit(recording(&log, 2)), Admission::Follower);
		assert_eq!(queue.len(), 3);
		assert_eq!(queue.settle(Ok(TokenSecret::new("fresh"))), 3);
		assert_eq!(queue.len(), 0);
		assert_eq!(queue.admit(recording(&log, 3)), Admission::Leader);
	}

	#[test]
	fn replays_run_in_admission_order_with_shared_token() {
		let queue = RetryQueue::default();
		let log = Log::default();

		for idx in 0..5 {
			queue.admit(recording(&log, idx));
		}

		queue.settle(Ok(TokenSecret::new("fresh")));

		let log = log.lock();

		assert_eq!(log.iter().map(|(idx, _)| *idx).collect::<Vec<_>>(), [0, 1, 2, 3, 4]);
		assert!(log.iter().all(|(_, outcome)| outcome == &Ok(TokenSecret::new("fresh"))));
	}

	#[test]
	fn failure_rejects_every_replay() {
		let queue = RetryQueue::default();
		let log = Log::default();
		let failure = RenewalError::Rejected { status: 400, body_preview: String::new() };

		for idx in 0..3 {
			queue.admit(recording(&log, idx));
		}

		queue.settle(Err(failure.clone()));

		let log = log.lock();

		assert_eq!(log.len(), 3);
		assert!(log.iter().all(|(_, outcome)| outcome == &Err(failure.clone())));
	}

	#[test]
	fn dropped_guard_abandons_waiters() {
		let queue = RetryQueue::default();
		let log = Log::default();

		queue.admit(recording(&log, 0));
		queue.admit(recording(&log, 1));

		drop(SettleGuard::new(&queue));

		assert_eq!(queue.len(), 0);
		assert!(log.lock().iter().all(|(_, outcome)| outcome == &Err(RenewalError::Abandoned)));

		let log_after = Log::default();

		queue.admit(recording(&log_after, 0));

		assert_eq!(SettleGuard::new(&queue).settle(Ok(TokenSecret::new("t"))), 1);
		assert_eq!(log_after.lock().len(), 1);
	}
}
