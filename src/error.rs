//! Client-level error types shared across token stores, renewal, and the request pipeline.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Durable storage could not be opened.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Credential renewal failed; the domain's tokens have been cleared.
	#[error(transparent)]
	Renewal(#[from] RenewalError),

	/// Server rejected the request's credentials.
	#[error("Request was rejected as unauthorized (HTTP {status}).")]
	Unauthorized {
		/// HTTP status code returned by the server.
		status: u16,
	},
}
impl Error {
	/// Returns the renewal failure carried by this error, if any.
	pub fn as_renewal(&self) -> Option<&RenewalError> {
		match self {
			Self::Renewal(e) => Some(e),
			_ => None,
		}
	}
}

/// Configuration and request-construction failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Domain configuration failed validation.
	#[error(transparent)]
	Domain(#[from] crate::config::DomainConfigError),
	/// Request path could not be resolved against the domain's base URL.
	#[error("Request path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Path supplied by the caller.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Header name is not a valid HTTP token.
	#[error("Header name `{name}` is invalid.")]
	InvalidHeaderName {
		/// Offending header name.
		name: String,
		/// Underlying parsing failure.
		#[source]
		source: ::http::header::InvalidHeaderName,
	},
	/// Header value contains bytes that are not allowed in HTTP headers.
	#[error("Header value is invalid.")]
	InvalidHeaderValue(#[from] ::http::header::InvalidHeaderValue),
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	RequestBody(#[source] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request exceeded the transport's timeout.
	#[error("Request timed out.")]
	TimedOut {
		/// Transport-specific timeout error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}

	/// Wraps a transport-specific timeout error.
	pub fn timed_out(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::TimedOut { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::timed_out(e) } else { Self::network(e) }
	}
}

/// Renewal failures shared verbatim with every waiter and queued replay of an episode.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum RenewalError {
	/// Refresh endpoint answered with a non-success status.
	#[error("Refresh endpoint rejected the refresh token (HTTP {status}).")]
	Rejected {
		/// HTTP status code returned by the refresh endpoint.
		status: u16,
		/// Leading bytes of the response body, for diagnostics.
		body_preview: String,
	},
	/// Refresh endpoint answered 2xx with a body that does not match the contract.
	#[error("Refresh endpoint returned a malformed body at `{path}`: {message}.")]
	MalformedResponse {
		/// JSON path of the offending field (`.` for the document root).
		path: String,
		/// Parser message.
		message: String,
	},
	/// Refresh call never produced a response.
	#[error("Refresh call failed before a response was received: {message}.")]
	Transport {
		/// Transport error rendered as text so the failure can be shared.
		message: String,
	},
	/// No refresh token is held for the domain.
	#[error("No refresh token is available for renewal.")]
	MissingRefreshToken,
	/// The caller driving the renewal was dropped before it settled.
	#[error("Renewal was abandoned before it settled.")]
	Abandoned,
}
impl RenewalError {
	pub(crate) fn transport(err: &TransportError) -> Self {
		let mut message = err.to_string();
		let mut source = StdError::source(err);

		while let Some(inner) = source {
			message.push_str(": ");
			message.push_str(&inner.to_string());

			source = inner.source();
		}

		Self::Transport { message }
	}
}
