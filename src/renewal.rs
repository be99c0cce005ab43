//! Single-flight credential renewal for one token domain.
//!
//! [`TokenManager`] owns the domain's [`TokenStore`] and serializes every renewal behind one
//! async gate. Callers that arrive while a renewal is in flight wait on the gate and then
//! re-evaluate freshness, so N concurrent stale callers produce exactly one refresh call.
//! Episodes are numbered; a waiter whose episode ended in failure receives that same failure
//! instead of re-running the refresh against a store that was just cleared. Requests rejected
//! with 401 join a retry queue whose replays run in admission order once the episode
//! settles.

mod metrics;
mod queue;
mod refresher;

pub use metrics::RenewalMetrics;
pub use queue::{Replay, ReplayOutcome};
pub use refresher::*;

// std
use std::time::Instant;
// self
use crate::{
	_prelude::*,
	config::DomainConfig,
	error::RenewalError,
	notify::{FailureCause, FailureListener, RenewalFailed},
	obs::{self, RenewalOutcome, RenewalSpan, RenewalTrigger},
	store::KeyValueStore,
	token::{TokenSecret, TokenState, TokenStore, TokenUpdate},
};
use queue::{Admission, RetryQueue, SettleGuard};

#[derive(Debug, Default)]
struct EpisodeLog {
	settled: u64,
	last_failure: Option<RenewalError>,
}

/// Renewal coordinator, rotation sink, and failure notifier for one token domain.
pub struct TokenManager {
	store: TokenStore,
	refresher: Arc<dyn TokenRefresher>,
	listener: Arc<dyn FailureListener>,
	gate: AsyncMutex<()>,
	episodes: Mutex<EpisodeLog>,
	queue: RetryQueue,
	metrics: Arc<RenewalMetrics>,
}
impl TokenManager {
	/// Creates a coordinator around an already-loaded store.
	pub fn new(
		store: TokenStore,
		refresher: Arc<dyn TokenRefresher>,
		listener: Arc<dyn FailureListener>,
	) -> Self {
		Self {
			store,
			refresher,
			listener,
			gate: AsyncMutex::new(()),
			episodes: Mutex::new(EpisodeLog::default()),
			queue: RetryQueue::default(),
			metrics: Default::default(),
		}
	}

	/// Loads the domain's credentials from `storage` using the configured keys.
	pub fn from_config(
		config: &DomainConfig,
		storage: Arc<dyn KeyValueStore>,
		refresher: Arc<dyn TokenRefresher>,
		listener: Arc<dyn FailureListener>,
	) -> Self {
		let store = TokenStore::load(config.name.clone(), config.storage_keys.clone(), storage);

		Self::new(store, refresher, listener)
	}

	/// Returns the domain label.
	pub fn domain(&self) -> &str {
		self.store.domain()
	}

	/// Returns the underlying credential store.
	pub fn store(&self) -> &TokenStore {
		&self.store
	}

	/// Returns a snapshot of the current credentials.
	pub fn tokens(&self) -> TokenState {
		self.store.get()
	}

	/// Returns the renewal counters.
	pub fn metrics(&self) -> Arc<RenewalMetrics> {
		self.metrics.clone()
	}

	/// Stores credentials obtained by an out-of-band sign-in.
	pub fn sign_in(&self, access_token: impl Into<String>, refresh_token: impl Into<String>) {
		self.store.apply(TokenUpdate::access(access_token).with_refresh(refresh_token));
		self.episodes.lock().last_failure = None;
	}

	/// Drops every credential without notifying the failure listener.
	pub fn sign_out(&self) -> bool {
		self.store.clear()
	}

	/// Stores credentials rotated by the server on an ordinary response.
	///
	/// Rotation bypasses the renewal gate; a renewal that settles afterwards overwrites it.
	pub fn apply_rotation(
		&self,
		access_token: Option<TokenSecret>,
		refresh_token: Option<TokenSecret>,
	) -> bool {
		let update = TokenUpdate { access_token, refresh_token, expires_in: None };

		if update.is_empty() {
			return false;
		}

		obs::log_rotation(
			self.domain(),
			update.access_token.is_some(),
			update.refresh_token.is_some(),
		);
		self.store.apply(update);

		true
	}

	/// Ensures the access token stays valid for at least `buffer`, renewing it if needed.
	pub async fn ensure_fresh(&self, buffer: Duration) -> Result<(), RenewalError> {
		self.ensure_fresh_with(buffer, RenewalTrigger::Preflight).await
	}

	/// Same as [`TokenManager::ensure_fresh`] but tags logs and metrics with `trigger`.
	pub async fn ensure_fresh_with(
		&self,
		buffer: Duration,
		trigger: RenewalTrigger,
	) -> Result<(), RenewalError> {
		let span = RenewalSpan::new(self.domain(), trigger);

		obs::record_renewal_outcome(self.domain(), trigger, RenewalOutcome::Attempt);

		span.instrument(async move {
			self.metrics.record_attempt();

			let observed = self.episodes.lock().settled;
			let _gate = self.gate.lock().await;

			if let Some(err) = self.failure_since(observed) {
				return Err(err);
			}

			let state = self.store.get();

			if state.is_empty() {
				return Err(RenewalError::MissingRefreshToken);
			}
			if !state.is_stale_at(buffer, OffsetDateTime::now_utc()) {
				self.record_reuse(trigger);

				return Ok(());
			}

			self.renew_locked(state, trigger).await.map(|_| ())
		})
		.await
	}

	/// Queues `replay` behind the renewal triggered by a 401 on a request that carried
	/// `rejected`.
	///
	/// The first caller of an episode drives the renewal; everyone else only waits. Every
	/// queued replay is invoked exactly once, in admission order, with the episode's outcome.
	pub async fn recover_rejected(&self, rejected: Option<TokenSecret>, replay: Replay) {
		let admission = self.queue.admit(replay);

		obs::record_replay_backlog(self.domain(), self.queue.len());

		if admission == Admission::Follower {
			return;
		}

		let settle = SettleGuard::new(&self.queue);
		let outcome = self.renew_rejected(rejected).await;

		settle.settle(outcome);
		obs::record_replay_backlog(self.domain(), self.queue.len());
	}

	/// Handles a terminal 401: drops the refresh token and notifies once if one was held.
	pub fn reject_credentials(&self, status: u16) -> bool {
		let held = self.store.clear_refresh();

		if held {
			obs::log_unauthorized(self.domain(), status);
			self.listener.on_renewal_failed(&RenewalFailed::now(
				self.domain(),
				FailureCause::Unauthorized { status },
			));
		}

		held
	}

	/// Requests waiting in the retry queue.
	pub fn queued_replays(&self) -> usize {
		self.queue.len()
	}

	async fn renew_rejected(
		&self,
		rejected: Option<TokenSecret>,
	) -> Result<TokenSecret, RenewalError> {
		const TRIGGER: RenewalTrigger = RenewalTrigger::Rejection;

		let span = RenewalSpan::new(self.domain(), TRIGGER);

		obs::record_renewal_outcome(self.domain(), TRIGGER, RenewalOutcome::Attempt);

		span.instrument(async move {
			self.metrics.record_attempt();

			let observed = self.episodes.lock().settled;
			let _gate = self.gate.lock().await;

			if let Some(err) = self.failure_since(observed) {
				return Err(err);
			}

			let state = self.store.get();

			// Credentials were dropped after the rejected request left.
			if state.is_empty() {
				let last_failure = self.episodes.lock().last_failure.clone();

				return Err(last_failure.unwrap_or(RenewalError::MissingRefreshToken));
			}
			// Someone rotated the credential after the rejected request left.
			let rotated = state.access_token.as_ref().filter(|current| {
				rejected.as_ref() != Some(*current)
					&& !state.is_stale_at(Duration::ZERO, OffsetDateTime::now_utc())
			});

			if let Some(current) = rotated {
				self.record_reuse(TRIGGER);

				return Ok(current.clone());
			}

			self.renew_locked(state, TRIGGER).await
		})
		.await
	}

	async fn renew_locked(
		&self,
		state: TokenState,
		trigger: RenewalTrigger,
	) -> Result<TokenSecret, RenewalError> {
		let Some(refresh_token) = state.refresh_token else {
			let err = RenewalError::MissingRefreshToken;

			self.fail_episode(&err, trigger);

			return Err(err);
		};

		self.metrics.record_refresh_call();

		let started = Instant::now();
		let refreshed = self.refresher.refresh(&refresh_token).await;

		obs::record_refresh_round_trip(self.domain(), trigger, started.elapsed(), refreshed.is_ok());

		match refreshed {
			Ok(renewed) => {
				let access_token = renewed.access_token.clone();

				self.store.apply(renewed.into());
				self.settle_episode(None);
				self.metrics.record_success();
				obs::record_renewal_outcome(self.domain(), trigger, RenewalOutcome::Renewed);

				Ok(access_token)
			},
			Err(err) => {
				self.fail_episode(&err, trigger);

				Err(err)
			},
		}
	}

	fn fail_episode(&self, err: &RenewalError, trigger: RenewalTrigger) {
		self.store.clear();
		self.settle_episode(Some(err.clone()));
		self.metrics.record_failure();
		obs::log_renewal_failure(self.domain(), trigger, err);
		obs::record_renewal_outcome(self.domain(), trigger, RenewalOutcome::Failed);
		self.listener.on_renewal_failed(&RenewalFailed::now(
			self.domain(),
			FailureCause::Renewal(err.clone()),
		));
	}

	fn settle_episode(&self, failure: Option<RenewalError>) {
		let mut log = self.episodes.lock();

		log.settled += 1;
		log.last_failure = failure;
	}

	fn failure_since(&self, observed: u64) -> Option<RenewalError> {
		let log = self.episodes.lock();

		if log.settled == observed { None } else { log.last_failure.clone() }
	}

	fn record_reuse(&self, trigger: RenewalTrigger) {
		self.metrics.record_reuse();
		obs::record_renewal_outcome(self.domain(), trigger, RenewalOutcome::Reused);
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("store", &self.store)
			.field("episodes", &*self.episodes.lock())
			.field("queued_replays", &self.queue.len())
			.field("metrics", &self.metrics)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{RecordingListener, ScriptedRefresher, jwt_expiring_in},
		store::{MemoryStorage, StorageKeys},
	};

	fn manager(
		access_ttl: Duration,
		refresher: Arc<ScriptedRefresher>,
	) -> (Arc<TokenManager>, RecordingListener, MemoryStorage) {
		let backend = MemoryStorage::default();
		let listener = RecordingListener::default();
		let store =
			TokenStore::load("primary", StorageKeys::prefixed("primary"), Arc::new(backend.clone()));
		let manager = TokenManager::new(store, refresher, Arc::new(listener.clone()));

		manager.sign_in(jwt_expiring_in(access_ttl, "user"), "refresh-1");

		(Arc::new(manager), listener, backend)
	}

	fn rejected() -> RenewalError {
		RenewalError::Rejected { status: 400, body_preview: "invalid".into() }
	}

	#[tokio::test]
	async fn fresh_token_skips_refresh() {
		let refresher = ScriptedRefresher::renewing("unused");
		let (manager, _, _) = manager(Duration::hours(1), refresher.clone());

		manager.ensure_fresh(Duration::seconds(10)).await.expect("Fresh token should pass.");

		assert_eq!(refresher.calls(), 0);
		assert_eq!(manager.metrics().reuses(), 1);
	}

	#[tokio::test]
	async fn token_inside_buffer_is_renewed() {
		let renewed = jwt_expiring_in(Duration::hours(1), "user");
		let refresher = ScriptedRefresher::renewing(&renewed);
		let (manager, _, _) = manager(Duration::seconds(3), refresher.clone());

		manager.ensure_fresh(Duration::seconds(10)).await.expect("Renewal should succeed.");

		let tokens = manager.tokens();

		assert_eq!(refresher.calls(), 1);
		assert_eq!(refresher.seen(), [TokenSecret::new("refresh-1")]);
		assert_eq!(tokens.access_token.as_ref().map(TokenSecret::expose), Some(renewed.as_str()));
		assert_eq!(tokens.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-2"));
		assert!(!tokens.is_stale(Duration::seconds(10)));
	}

	#[tokio::test]
	async fn concurrent_stale_callers_share_one_refresh() {
		let renewed = jwt_expiring_in(Duration::hours(1), "user");
		let refresher = ScriptedRefresher::renewing(&renewed);
		let (manager, listener, _) = manager(Duration::seconds(3), refresher.clone());
		let handles = (0..5)
			.map(|_| {
				let manager = manager.clone();

				tokio::spawn(async move { manager.ensure_fresh(Duration::seconds(10)).await })
			})
			.collect::<Vec<_>>();

		for handle in handles {
			handle.await.expect("Task should not panic.").expect("Every caller should succeed.");
		}

		assert_eq!(refresher.calls(), 1);
		assert_eq!(manager.metrics().refresh_calls(), 1);
		assert_eq!(manager.metrics().successes(), 1);
		assert_eq!(listener.count(), 0);
	}

	#[tokio::test]
	async fn failure_reaches_every_waiter_and_notifies_once() {
		let refresher = ScriptedRefresher::failing(rejected());
		let (manager, listener, backend) = manager(Duration::seconds(3), refresher.clone());
		let handles = (0..5)
			.map(|_| {
				let manager = manager.clone();

				tokio::spawn(async move { manager.ensure_fresh(Duration::seconds(10)).await })
			})
			.collect::<Vec<_>>();

		for handle in handles {
			let err = handle
				.await
				.expect("Task should not panic.")
				.expect_err("Every caller should observe the failure.");

			assert_eq!(err, rejected());
		}

		assert_eq!(refresher.calls(), 1);
		assert!(manager.tokens().is_empty());

		manager.store().flush().await;

		assert!(backend.is_empty());
		assert_eq!(listener.count(), 1);
		assert_eq!(listener.events()[0].cause, FailureCause::Renewal(rejected()));
		assert_eq!(manager.metrics().failures(), 1);
	}

	#[tokio::test]
	async fn signed_out_domain_fails_without_notification() {
		let refresher = ScriptedRefresher::renewing("unused");
		let (manager, listener, _) = manager(Duration::hours(1), refresher.clone());

		assert!(manager.sign_out());

		let err = manager
			.ensure_fresh(Duration::seconds(10))
			.await
			.expect_err("A signed-out domain cannot be refreshed.");

		assert_eq!(err, RenewalError::MissingRefreshToken);
		assert_eq!(refresher.calls(), 0);
		assert_eq!(listener.count(), 0);
	}

	#[tokio::test]
	async fn stale_access_without_refresh_token_fails_episode() {
		let refresher = ScriptedRefresher::renewing("unused");
		let (manager, listener, _) = manager(Duration::seconds(3), refresher.clone());

		manager.store().clear_refresh();

		let err = manager
			.ensure_fresh(Duration::seconds(10))
			.await
			.expect_err("Renewal needs a refresh token.");

		assert_eq!(err, RenewalError::MissingRefreshToken);
		assert!(manager.tokens().is_empty());
		assert_eq!(listener.count(), 1);
	}

	#[tokio::test]
	async fn rejected_requests_replay_in_order_after_one_refresh() {
		let renewed = jwt_expiring_in(Duration::hours(1), "user");
		let refresher = ScriptedRefresher::renewing(&renewed);
		let (manager, _, _) = manager(Duration::hours(1), refresher.clone());
		let carried = manager.tokens().access_token;
		let log = Arc::new(Mutex::new(Vec::new()));
		let replay = |idx: usize| -> Replay {
			let log = log.clone();

			Box::new(move |outcome: ReplayOutcome| log.lock().push((idx, outcome)))
		};

		tokio::join!(
			manager.recover_rejected(carried.clone(), replay(0)),
			manager.recover_rejected(carried.clone(), replay(1)),
			manager.recover_rejected(carried.clone(), replay(2)),
		);

		let log = log.lock();

		assert_eq!(refresher.calls(), 1);
		assert_eq!(log.iter().map(|(idx, _)| *idx).collect::<Vec<_>>(), [0, 1, 2]);
		assert!(log.iter().all(|(_, outcome)| outcome == &Ok(TokenSecret::new(renewed.clone()))));
		assert_eq!(manager.queued_replays(), 0);
	}

	#[tokio::test]
	async fn rejection_reuses_credential_rotated_meanwhile() {
		let refresher = ScriptedRefresher::renewing("unused");
		let (manager, _, _) = manager(Duration::hours(1), refresher.clone());
		let outcome = Arc::new(Mutex::new(None));
		let sink = outcome.clone();

		manager
			.recover_rejected(
				Some(TokenSecret::new("previous-access")),
				Box::new(move |result: ReplayOutcome| *sink.lock() = Some(result)),
			)
			.await;

		let current = manager.tokens().access_token.expect("Access token should be held.");

		assert_eq!(refresher.calls(), 0);
		assert_eq!(*outcome.lock(), Some(Ok(current)));
	}

	#[tokio::test]
	async fn unauthorized_clears_refresh_token_and_notifies_once() {
		let refresher = ScriptedRefresher::renewing("unused");
		let (manager, listener, _) = manager(Duration::hours(1), refresher);

		assert!(manager.reject_credentials(401));
		assert!(!manager.reject_credentials(401));

		let tokens = manager.tokens();

		assert!(tokens.has_access());
		assert!(tokens.refresh_token.is_none());
		assert_eq!(listener.count(), 1);
		assert_eq!(listener.events()[0].cause, FailureCause::Unauthorized { status: 401 });
	}

	#[test]
	fn rotation_updates_only_delivered_fields() {
		let refresher = ScriptedRefresher::renewing("unused");
		let (manager, _, _) = manager(Duration::hours(1), refresher.clone());
		let rotated = jwt_expiring_in(Duration::hours(2), "user");

		assert!(!manager.apply_rotation(None, None));
		assert!(manager.apply_rotation(Some(TokenSecret::new(rotated.clone())), None));

		let tokens = manager.tokens();

		assert_eq!(tokens.access_token.as_ref().map(TokenSecret::expose), Some(rotated.as_str()));
		assert_eq!(tokens.refresh_token.as_ref().map(TokenSecret::expose), Some("refresh-1"));
		assert_eq!(refresher.calls(), 0);
	}
}
