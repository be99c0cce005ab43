//! Bearer-token lifecycle for authenticated HTTP clients.
//!
//! Each token domain gets its own [`client::AuthenticatedClient`], backed by a
//! [`renewal::TokenManager`] that renews credentials single-flight, absorbs server-side
//! rotation, replays rejected requests in order, and signs the domain out when renewal fails.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod config;
pub mod error;
pub mod notify;
pub mod obs;
pub mod renewal;
pub mod scheduler;
pub mod store;
pub mod token;
pub mod transport;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// crates.io
	use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use crate::{
		error::RenewalError,
		notify::{FailureListener, RenewalFailed},
		renewal::{RefreshFuture, RenewedTokens, TokenRefresher},
		token::TokenSecret,
	};

	/// Builds an unsigned JWT whose payload carries the provided `exp` claim.
	pub fn jwt_expiring_at(expires_at: OffsetDateTime, subject: &str) -> String {
		let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
		let payload = serde_json::json!({ "sub": subject, "exp": expires_at.unix_timestamp() });
		let payload = URL_SAFE_NO_PAD.encode(payload.to_string());

		format!("{header}.{payload}.sig")
	}

	/// Builds an unsigned JWT that expires `ttl` from now.
	pub fn jwt_expiring_in(ttl: Duration, subject: &str) -> String {
		jwt_expiring_at(OffsetDateTime::now_utc() + ttl, subject)
	}

	/// Failure listener that records every notification it receives.
	#[derive(Clone, Debug, Default)]
	pub struct RecordingListener(Arc<Mutex<Vec<RenewalFailed>>>);
	impl RecordingListener {
		/// Returns a snapshot of the recorded notifications.
		pub fn events(&self) -> Vec<RenewalFailed> {
			self.0.lock().clone()
		}

		/// Returns how many notifications were recorded.
		pub fn count(&self) -> usize {
			self.0.lock().len()
		}
	}
	impl FailureListener for RecordingListener {
		fn on_renewal_failed(&self, event: &RenewalFailed) {
			self.0.lock().push(event.clone());
		}
	}

	/// Refresher that answers every call with the same canned outcome after a short delay.
	#[derive(Debug)]
	pub struct ScriptedRefresher {
		calls: AtomicUsize,
		seen: Mutex<Vec<TokenSecret>>,
		delay: std::time::Duration,
		outcome: Result<RenewedTokens, RenewalError>,
	}
	impl ScriptedRefresher {
		/// Issues `access_token` plus the rotated refresh token `refresh-2`.
		pub fn renewing(access_token: &str) -> Arc<Self> {
			Self::answering(Ok(RenewedTokens {
				access_token: TokenSecret::new(access_token),
				refresh_token: Some(TokenSecret::new("refresh-2")),
				expires_in: None,
			}))
		}

		/// Fails every call with `err`.
		pub fn failing(err: RenewalError) -> Arc<Self> {
			Self::answering(Err(err))
		}

		fn answering(outcome: Result<RenewedTokens, RenewalError>) -> Arc<Self> {
			Arc::new(Self {
				calls: AtomicUsize::new(0),
				seen: Mutex::new(Vec::new()),
				delay: std::time::Duration::from_millis(20),
				outcome,
			})
		}

		/// Returns how many refresh calls were made.
		pub fn calls(&self) -> usize {
			self.calls.load(Ordering::SeqCst)
		}

		/// Returns the refresh tokens presented, in call order.
		pub fn seen(&self) -> Vec<TokenSecret> {
			self.seen.lock().clone()
		}
	}
	impl TokenRefresher for ScriptedRefresher {
		fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
			Box::pin(async move {
				self.calls.fetch_add(1, Ordering::SeqCst);
				self.seen.lock().push(refresh_token.clone());
				tokio::time::sleep(self.delay).await;

				self.outcome.clone()
			})
		}
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use ::http as http_types;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
