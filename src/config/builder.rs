// crates.io
use ::http::HeaderName;
// self
use crate::{
	_prelude::*,
	config::{CredentialHeaders, DomainConfig, RefreshEndpoint, ReplayPolicy},
	store::StorageKeys,
};

/// Errors raised while constructing or validating domain configuration.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum DomainConfigError {
	/// Domain label must be non-empty.
	#[error("Domain name must not be empty.")]
	EmptyName,
	/// Base URL is mandatory.
	#[error("Missing base URL.")]
	MissingBaseUrl,
	/// Refresh endpoint is mandatory.
	#[error("Missing refresh endpoint.")]
	MissingRefreshEndpoint,
	/// Base URL must be able to anchor relative paths.
	#[error("The base URL cannot be used to resolve relative paths: {url}.")]
	OpaqueBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Refresh body field must be non-empty.
	#[error("Refresh token body field must not be empty.")]
	EmptyTokenField,
	/// Header names must be valid HTTP tokens.
	#[error("Header name `{name}` is not a valid HTTP header name.")]
	InvalidHeaderName {
		/// Offending header name.
		name: String,
	},
	/// Access and refresh headers must differ.
	#[error("Access and refresh credentials must use different headers.")]
	SharedHeaderName,
	/// Storage keys must be non-empty and distinct.
	#[error("Storage keys must be non-empty and distinct.")]
	InvalidStorageKeys,
	/// Durations must be strictly positive (the buffer may be zero).
	#[error("The {field} duration must be positive.")]
	NonPositiveDuration {
		/// Which duration failed validation.
		field: &'static str,
	},
}

/// Builder for [`DomainConfig`] values.
#[derive(Debug)]
pub struct DomainConfigBuilder {
	/// Domain label.
	pub name: String,
	/// Base URL that request paths are resolved against.
	pub base_url: Option<Url>,
	/// Refresh endpoint contract.
	pub refresh: Option<RefreshEndpoint>,
	/// Durable storage entry names; defaults to keys prefixed with the domain name.
	pub storage_keys: Option<StorageKeys>,
	/// Credential header names.
	pub headers: CredentialHeaders,
	/// Reaction to 401 responses.
	pub replay: ReplayPolicy,
	/// Pre-flight freshness window.
	pub freshness_buffer: Duration,
	/// Expiry-scheduler period.
	pub check_interval: Duration,
	/// Transport timeout.
	pub request_timeout: Duration,
}
impl DomainConfigBuilder {
	/// Creates a new builder seeded with defaults.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			base_url: None,
			refresh: None,
			storage_keys: None,
			headers: CredentialHeaders::default(),
			replay: ReplayPolicy::default(),
			freshness_buffer: DomainConfig::DEFAULT_FRESHNESS_BUFFER,
			check_interval: DomainConfig::DEFAULT_CHECK_INTERVAL,
			request_timeout: DomainConfig::DEFAULT_REQUEST_TIMEOUT,
		}
	}

	/// Seeds the primary application domain: `Refresh` header on every request, pre-flight
	/// renewal only, 15 second transport timeout.
	pub fn primary() -> Self {
		let mut builder = Self::new("primary").replay(ReplayPolicy::PreflightOnly);

		builder.headers.send_refresh = true;

		builder.request_timeout(Duration::seconds(15))
	}

	/// Seeds the subscription-service domain: access header only, 401 replay through the retry
	/// queue, 30 second transport timeout.
	pub fn subscription() -> Self {
		let mut builder = Self::new("subscription").replay(ReplayPolicy::ReplayOnUnauthorized);

		builder.headers.send_refresh = false;

		builder.request_timeout(Duration::seconds(30))
	}

	/// Sets the base URL.
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Sets the refresh endpoint.
	pub fn refresh_endpoint(mut self, endpoint: RefreshEndpoint) -> Self {
		self.refresh = Some(endpoint);

		self
	}

	/// Overrides the storage keys.
	pub fn storage_keys(mut self, keys: StorageKeys) -> Self {
		self.storage_keys = Some(keys);

		self
	}

	/// Overrides the credential headers.
	pub fn headers(mut self, headers: CredentialHeaders) -> Self {
		self.headers = headers;

		self
	}

	/// Overrides the replay policy.
	pub fn replay(mut self, policy: ReplayPolicy) -> Self {
		self.replay = policy;

		self
	}

	/// Overrides the pre-flight freshness window (defaults to 10 seconds).
	pub fn freshness_buffer(mut self, buffer: Duration) -> Self {
		self.freshness_buffer = buffer;

		self
	}

	/// Overrides the scheduler period (defaults to 30 seconds).
	pub fn check_interval(mut self, interval: Duration) -> Self {
		self.check_interval = interval;

		self
	}

	/// Overrides the transport timeout.
	pub fn request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<DomainConfig, DomainConfigError> {
		let base_url = self.base_url.ok_or(DomainConfigError::MissingBaseUrl)?;
		let refresh = self.refresh.ok_or(DomainConfigError::MissingRefreshEndpoint)?;
		let storage_keys =
			self.storage_keys.unwrap_or_else(|| StorageKeys::prefixed(self.name.trim()));
		let config = DomainConfig {
			name: self.name,
			base_url,
			refresh,
			storage_keys,
			headers: self.headers,
			replay: self.replay,
			freshness_buffer: self.freshness_buffer,
			check_interval: self.check_interval,
			request_timeout: self.request_timeout,
		};

		config.validate()?;

		Ok(config)
	}
}

impl DomainConfig {
	/// Validates invariants for the configuration; deserialized configs should call this too.
	pub fn validate(&self) -> Result<(), DomainConfigError> {
		if self.name.trim().is_empty() {
			return Err(DomainConfigError::EmptyName);
		}
		if self.base_url.cannot_be_a_base() {
			return Err(DomainConfigError::OpaqueBaseUrl { url: self.base_url.to_string() });
		}
		if self.refresh.token_field.trim().is_empty() {
			return Err(DomainConfigError::EmptyTokenField);
		}

		let access = validate_header_name(&self.headers.access)?;
		let refresh = validate_header_name(&self.headers.refresh)?;

		if access == refresh {
			return Err(DomainConfigError::SharedHeaderName);
		}
		if self.storage_keys.has_empty_key() || self.storage_keys.has_duplicate_key() {
			return Err(DomainConfigError::InvalidStorageKeys);
		}
		if self.freshness_buffer.is_negative() {
			return Err(DomainConfigError::NonPositiveDuration { field: "freshness_buffer" });
		}

		validate_positive("check_interval", self.check_interval)?;
		validate_positive("request_timeout", self.request_timeout)?;

		Ok(())
	}
}

pub(crate) fn validate_header_name(name: &str) -> Result<HeaderName, DomainConfigError> {
	HeaderName::from_bytes(name.as_bytes())
		.map_err(|_| DomainConfigError::InvalidHeaderName { name: name.to_owned() })
}

fn validate_positive(field: &'static str, value: Duration) -> Result<(), DomainConfigError> {
	if value.is_positive() { Ok(()) } else { Err(DomainConfigError::NonPositiveDuration { field }) }
}
