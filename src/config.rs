//! Token-domain configuration.
//!
//! A [`DomainConfig`] captures everything that differs between two authenticated clients:
//! base URL, refresh endpoint shape, storage keys, credential header names, replay policy,
//! and timing knobs. [`DomainConfigBuilder::primary`] and
//! [`DomainConfigBuilder::subscription`] seed the two shipped domains; both produce the same
//! generic client.

/// Builder for [`DomainConfig`].
pub mod builder;

pub use builder::*;

// self
use crate::{_prelude::*, store::StorageKeys};

/// How a domain reacts when an ordinary request is rejected with 401.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayPolicy {
	#[default]
	/// Only gate requests through pre-flight freshness checks; a 401 is terminal.
	PreflightOnly,
	/// Renew once and replay rejected requests through the retry queue.
	ReplayOnUnauthorized,
}

/// Refresh endpoint contract for a domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshEndpoint {
	/// Absolute URL receiving `POST` renewal calls.
	pub url: Url,
	/// JSON body field carrying the refresh token.
	pub token_field: String,
}
impl RefreshEndpoint {
	/// Default JSON field carrying the refresh token.
	pub const DEFAULT_TOKEN_FIELD: &'static str = "refresh_token";

	/// Creates an endpoint that sends `{"refresh_token": ...}`.
	pub fn new(url: Url) -> Self {
		Self { url, token_field: Self::DEFAULT_TOKEN_FIELD.into() }
	}

	/// Overrides the body field name.
	pub fn with_token_field(mut self, field: impl Into<String>) -> Self {
		self.token_field = field.into();

		self
	}
}

/// Header names used to send and receive credentials.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialHeaders {
	/// Header carrying `Bearer <access>` on requests and rotated access tokens on responses.
	pub access: String,
	/// Header carrying `Bearer <refresh>` on requests and rotated refresh tokens on responses.
	pub refresh: String,
	/// Whether requests also carry the refresh token.
	pub send_refresh: bool,
}
impl Default for CredentialHeaders {
	fn default() -> Self {
		Self { access: "authorization".into(), refresh: "refresh".into(), send_refresh: false }
	}
}

/// Validated configuration for one token domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
	/// Label used in logs, metrics, and failure notifications.
	pub name: String,
	/// Base URL that request paths are resolved against.
	pub base_url: Url,
	/// Refresh endpoint contract.
	pub refresh: RefreshEndpoint,
	/// Durable storage entry names.
	pub storage_keys: StorageKeys,
	/// Credential header names.
	pub headers: CredentialHeaders,
	/// Reaction to 401 responses.
	pub replay: ReplayPolicy,
	/// Access tokens expiring within this window are renewed before use.
	pub freshness_buffer: Duration,
	/// Period of the proactive expiry scheduler.
	pub check_interval: Duration,
	/// Transport-level timeout applied to every request of the domain.
	pub request_timeout: Duration,
}
impl DomainConfig {
	/// Default pre-flight freshness window.
	pub const DEFAULT_FRESHNESS_BUFFER: Duration = Duration::seconds(10);
	/// Default expiry-scheduler period.
	pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::seconds(30);
	/// Default transport timeout.
	pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::seconds(15);

	/// Creates a new builder for the provided domain label.
	pub fn builder(name: impl Into<String>) -> DomainConfigBuilder {
		DomainConfigBuilder::new(name)
	}

	/// Resolves `path` against the base URL.
	pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
		self.base_url.join(path)
	}
}
