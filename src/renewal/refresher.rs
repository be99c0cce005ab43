//! Refresh-endpoint contract: exchange a refresh token for new credentials.

// crates.io
use ::http::Method;
// self
use crate::{
	_prelude::*,
	config::RefreshEndpoint,
	error::RenewalError,
	token::{TokenSecret, TokenUpdate},
	transport::{ApiRequest, ApiResponse, Transport},
};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Boxed future returned by [`TokenRefresher::refresh`].
pub type RefreshFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RenewedTokens, RenewalError>> + 'a + Send>>;

/// Performs the network half of a renewal.
pub trait TokenRefresher
where
	Self: Send + Sync,
{
	/// Exchanges `refresh_token` for new credentials.
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a>;
}

/// Credentials issued by the refresh endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenewedTokens {
	/// New access token.
	pub access_token: TokenSecret,
	/// Rotated refresh token; `None` keeps the current one.
	pub refresh_token: Option<TokenSecret>,
	/// Lifetime reported by the server, used for opaque access tokens.
	pub expires_in: Option<Duration>,
}
impl From<RenewedTokens> for TokenUpdate {
	fn from(renewed: RenewedTokens) -> Self {
		Self {
			access_token: Some(renewed.access_token),
			refresh_token: renewed.refresh_token,
			expires_in: renewed.expires_in,
		}
	}
}

#[derive(Deserialize)]
struct RefreshResponseBody {
	access_token: String,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
}

/// [`TokenRefresher`] that `POST`s `{"<token_field>": "<refresh>"}` as JSON.
pub struct HttpRefresher<T>
where
	T: ?Sized + Transport,
{
	transport: Arc<T>,
	endpoint: RefreshEndpoint,
}
impl<T> HttpRefresher<T>
where
	T: ?Sized + Transport,
{
	/// Creates a refresher that calls `endpoint` through `transport`.
	pub fn new(transport: Arc<T>, endpoint: RefreshEndpoint) -> Self {
		Self { transport, endpoint }
	}

	/// Returns the endpoint contract.
	pub fn endpoint(&self) -> &RefreshEndpoint {
		&self.endpoint
	}
}
impl<T> TokenRefresher for HttpRefresher<T>
where
	T: ?Sized + Transport,
{
	fn refresh<'a>(&'a self, refresh_token: &'a TokenSecret) -> RefreshFuture<'a> {
		Box::pin(async move {
			let body =
				BTreeMap::from([(self.endpoint.token_field.as_str(), refresh_token.expose())]);
			let request = ApiRequest::new(Method::POST, self.endpoint.url.clone())
				.json(&body)
				.map_err(|e| RenewalError::Transport { message: e.to_string() })?;
			let response = self
				.transport
				.execute(request)
				.await
				.map_err(|e| RenewalError::transport(&e))?;

			if !response.is_success() {
				return Err(RenewalError::Rejected {
					status: response.status.as_u16(),
					body_preview: response.body_preview(BODY_PREVIEW_LIMIT),
				});
			}

			parse_refresh_response(&response)
		})
	}
}
impl<T> Debug for HttpRefresher<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpRefresher").field("endpoint", &self.endpoint).finish()
	}
}

fn parse_refresh_response(response: &ApiResponse) -> Result<RenewedTokens, RenewalError> {
	let body = response.json::<RefreshResponseBody>().map_err(|e| {
		RenewalError::MalformedResponse { path: e.path().to_string(), message: e.inner().to_string() }
	})?;

	if body.access_token.trim().is_empty() {
		return Err(malformed("access_token", "access token is empty"));
	}

	let expires_in = match body.expires_in {
		Some(secs) if secs <= 0 => return Err(malformed("expires_in", "lifetime must be positive")),
		Some(secs) => {
			let ttl = Duration::seconds(secs);

			if OffsetDateTime::now_utc().checked_add(ttl).is_none() {
				return Err(malformed("expires_in", "lifetime out of range"));
			}

			Some(ttl)
		},
		None => None,
	};
	let refresh_token =
		body.refresh_token.filter(|token| !token.trim().is_empty()).map(TokenSecret::new);

	Ok(RenewedTokens { access_token: TokenSecret::new(body.access_token), refresh_token, expires_in })
}

fn malformed(path: &str, message: &str) -> RenewalError {
	RenewalError::MalformedResponse { path: path.into(), message: message.into() }
}
