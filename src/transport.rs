//! Transport primitives for authenticated calls.
//!
//! [`Transport`] is the crate's only dependency on an HTTP stack. Requests and responses are
//! plain owned values ([`ApiRequest`], [`ApiResponse`]) so a rejected call can be cloned and
//! replayed after renewal, and so test doubles need no network. The futures returned by
//! [`Transport::execute`] own everything they touch, which lets queued replays be dispatched
//! from whichever caller settles a renewal.

// crates.io
use ::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	token::TokenSecret,
};

/// Boxed future returned by [`Transport::execute`].
pub type TransportFuture =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'static + Send>>;

/// Abstraction over HTTP stacks capable of executing owned requests.
pub trait Transport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and resolves once the full response body is available.
	fn execute(&self, request: ApiRequest) -> TransportFuture;
}

/// Owned, cloneable outgoing request.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute target URL.
	pub url: Url,
	/// Request headers.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Vec<u8>>,
}
impl ApiRequest {
	/// Creates a body-less request.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}

	/// Serializes `body` as JSON and sets `content-type: application/json`.
	pub fn json<T>(mut self, body: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let bytes = serde_json::to_vec(body).map_err(ConfigError::RequestBody)?;

		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
		self.body = Some(bytes);

		Ok(self)
	}

	/// Sets a header, replacing existing values.
	pub fn header(mut self, name: &str, value: &str) -> Result<Self, ConfigError> {
		let name = HeaderName::from_bytes(name.as_bytes()).map_err(|source| {
			ConfigError::InvalidHeaderName { name: name.to_owned(), source }
		})?;

		self.headers.insert(name, HeaderValue::from_str(value)?);

		Ok(self)
	}

	/// Sets `name: Bearer <secret>`, marking the value as sensitive.
	pub fn set_bearer(
		&mut self,
		name: &HeaderName,
		secret: &TokenSecret,
	) -> Result<(), ConfigError> {
		let mut value = HeaderValue::from_str(&secret.bearer())?;

		value.set_sensitive(true);
		self.headers.insert(name.clone(), value);

		Ok(())
	}

	/// Reads the bearer credential carried under `name`, if any.
	pub fn bearer(&self, name: &HeaderName) -> Option<TokenSecret> {
		header_secret(&self.headers, name)
	}
}

/// Fully buffered response.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Creates a response with an empty header map.
	pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Returns `true` for 401.
	pub fn is_unauthorized(&self) -> bool {
		self.status == StatusCode::UNAUTHORIZED
	}

	/// Deserializes the body as JSON, reporting the path of the first offending field.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
	}

	/// Reads a credential delivered under `name`, if any.
	pub fn credential(&self, name: &HeaderName) -> Option<TokenSecret> {
		header_secret(&self.headers, name)
	}

	/// Returns up to `limit` characters of the body, lossily decoded.
	pub fn body_preview(&self, limit: usize) -> String {
		String::from_utf8_lossy(&self.body).chars().take(limit).collect()
	}
}

fn header_secret(headers: &HeaderMap, name: &HeaderName) -> Option<TokenSecret> {
	headers.get(name)?.to_str().ok().and_then(TokenSecret::from_header_value)
}

/// Reqwest-backed [`Transport`].
///
/// Redirects are followed per the wrapped client's policy; timeouts configured on the client
/// surface as [`TransportError::TimedOut`].
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client whose requests time out after `timeout`.
	pub fn with_timeout(timeout: Duration) -> Result<Self, ConfigError> {
		let timeout = std::time::Duration::try_from(timeout)
			.map_err(ConfigError::http_client_build)?;
		let client = ReqwestClient::builder().timeout(timeout).build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl Transport for ReqwestTransport {
	fn execute(&self, request: ApiRequest) -> TransportFuture {
		let client = self.0.clone();

		Box::pin(async move {
			let mut builder = client.request(request.method, request.url).headers(request.headers);

			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?.to_vec();

			Ok::<_, TransportError>(ApiResponse { status, headers, body })
		})
	}
}
