//! Authenticated HTTP client for one token domain.
//!
//! [`AuthenticatedClient`] runs every request through a request middleware chain (by default
//! [`CredentialAttacher`]), sends it through a [`Transport`], runs the response chain (by
//! default [`RotationCapture`]), and then applies the domain's [`ReplayPolicy`] to 401
//! responses. Two clients built from different [`DomainConfig`]s share nothing.

pub mod middleware;

pub use middleware::*;

// crates.io
use ::http::{HeaderName, Method};
use tokio::sync::oneshot;
// self
use crate::{
	_prelude::*,
	config::{DomainConfig, ReplayPolicy, builder},
	error::{ConfigError, RenewalError},
	notify::FailureListener,
	renewal::{HttpRefresher, Replay, ReplayOutcome, TokenManager},
	scheduler::{ExpiryScheduler, SchedulerHandle},
	store::KeyValueStore,
	token::{TokenSecret, TokenState},
	transport::{ApiRequest, ApiResponse, Transport, TransportFuture},
};
#[cfg(feature = "reqwest")] use crate::transport::ReqwestTransport;

/// Domain state shared with middleware.
#[derive(Debug)]
pub struct DomainContext {
	config: DomainConfig,
	manager: Arc<TokenManager>,
	access_header: HeaderName,
	refresh_header: HeaderName,
}
impl DomainContext {
	/// Returns the domain configuration.
	pub fn config(&self) -> &DomainConfig {
		&self.config
	}

	/// Returns the domain's renewal coordinator.
	pub fn manager(&self) -> &Arc<TokenManager> {
		&self.manager
	}

	/// Header carrying the access credential.
	pub fn access_header(&self) -> &HeaderName {
		&self.access_header
	}

	/// Header carrying the refresh credential.
	pub fn refresh_header(&self) -> &HeaderName {
		&self.refresh_header
	}

	/// Attaches `access`, plus `refresh` when the domain sends it, to `request`.
	pub fn authorize(
		&self,
		request: &mut ApiRequest,
		access: &TokenSecret,
		refresh: Option<&TokenSecret>,
	) -> Result<(), ConfigError> {
		request.set_bearer(&self.access_header, access)?;

		if self.config.headers.send_refresh {
			match refresh {
				Some(refresh) => request.set_bearer(&self.refresh_header, refresh)?,
				None => {
					request.headers.remove(&self.refresh_header);
				},
			}
		}

		Ok(())
	}

	fn replay_request(
		&self,
		mut request: ApiRequest,
		access: &TokenSecret,
	) -> Result<ApiRequest, ConfigError> {
		let refresh = self.manager.tokens().refresh_token;

		self.authorize(&mut request, access, refresh.as_ref())?;

		Ok(request)
	}
}

/// HTTP client bound to one token domain.
pub struct AuthenticatedClient<T>
where
	T: ?Sized + Transport,
{
	context: Arc<DomainContext>,
	transport: Arc<T>,
	request_chain: Vec<Arc<dyn RequestMiddleware>>,
	response_chain: Vec<Arc<dyn ResponseMiddleware>>,
}
#[cfg(feature = "reqwest")]
impl AuthenticatedClient<ReqwestTransport> {
	/// Builds a reqwest-backed client whose requests time out after the domain's
	/// `request_timeout`.
	pub fn new(
		config: DomainConfig,
		storage: Arc<dyn KeyValueStore>,
		listener: Arc<dyn FailureListener>,
	) -> Result<Self> {
		let transport = ReqwestTransport::with_timeout(config.request_timeout)?;

		Self::with_transport(config, storage, listener, Arc::new(transport))
	}
}
impl<T> AuthenticatedClient<T>
where
	T: ?Sized + Transport,
{
	/// Builds a client that renews credentials through the domain's refresh endpoint using
	/// `transport`.
	pub fn with_transport(
		config: DomainConfig,
		storage: Arc<dyn KeyValueStore>,
		listener: Arc<dyn FailureListener>,
		transport: Arc<T>,
	) -> Result<Self> {
		config.validate().map_err(ConfigError::from)?;

		let refresher = Arc::new(HttpRefresher::new(transport.clone(), config.refresh.clone()));
		let manager = TokenManager::from_config(&config, storage, refresher, listener);

		Self::with_manager(config, Arc::new(manager), transport)
	}

	/// Builds a client around an existing coordinator.
	pub fn with_manager(
		config: DomainConfig,
		manager: Arc<TokenManager>,
		transport: Arc<T>,
	) -> Result<Self> {
		config.validate().map_err(ConfigError::from)?;

		let access_header =
			builder::validate_header_name(&config.headers.access).map_err(ConfigError::from)?;
		let refresh_header =
			builder::validate_header_name(&config.headers.refresh).map_err(ConfigError::from)?;
		let context = DomainContext { config, manager, access_header, refresh_header };

		Ok(Self {
			context: Arc::new(context),
			transport,
			request_chain: vec![Arc::new(CredentialAttacher)],
			response_chain: vec![Arc::new(RotationCapture)],
		})
	}

	/// Appends a request hook that runs after the built-in ones.
	pub fn with_request_middleware(mut self, middleware: impl 'static + RequestMiddleware) -> Self {
		self.request_chain.push(Arc::new(middleware));

		self
	}

	/// Appends a response hook that runs after the built-in ones.
	pub fn with_response_middleware(
		mut self,
		middleware: impl 'static + ResponseMiddleware,
	) -> Self {
		self.response_chain.push(Arc::new(middleware));

		self
	}

	/// Returns the domain configuration.
	pub fn config(&self) -> &DomainConfig {
		&self.context.config
	}

	/// Returns the domain's renewal coordinator.
	pub fn manager(&self) -> &Arc<TokenManager> {
		&self.context.manager
	}

	/// Returns a snapshot of the current credentials.
	pub fn tokens(&self) -> TokenState {
		self.context.manager.tokens()
	}

	/// Stores credentials obtained by an out-of-band sign-in.
	pub fn sign_in(&self, access_token: impl Into<String>, refresh_token: impl Into<String>) {
		self.context.manager.sign_in(access_token, refresh_token);
	}

	/// Drops every credential held for the domain.
	pub fn sign_out(&self) -> bool {
		self.context.manager.sign_out()
	}

	/// Starts the domain's expiry scheduler on the current Tokio runtime.
	pub fn spawn_scheduler(&self) -> SchedulerHandle {
		ExpiryScheduler::from_config(self.context.manager.clone(), &self.context.config).spawn()
	}

	/// Creates a request for `path`, resolved against the domain's base URL.
	pub fn request(&self, method: Method, path: &str) -> Result<ApiRequest> {
		let url = self
			.context
			.config
			.resolve(path)
			.map_err(|source| ConfigError::InvalidPath { path: path.to_owned(), source })?;

		Ok(ApiRequest::new(method, url))
	}

	/// Shorthand for a `GET` of `path`.
	pub async fn get(&self, path: &str) -> Result<ApiResponse> {
		self.send(self.request(Method::GET, path)?).await
	}

	/// Sends `request` through the middleware chains and the domain's 401 handling.
	///
	/// Non-401 responses are returned as-is, whatever their status.
	pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		for middleware in &self.request_chain {
			request = middleware.on_request(&self.context, request).await?;
		}

		let carried = request.bearer(&self.context.access_header);
		let response = self.transport.execute(request.clone()).await?;
		let response = self.inspect(response).await?;

		if !response.is_unauthorized() {
			return Ok(response);
		}
		if self.context.config.replay == ReplayPolicy::ReplayOnUnauthorized && carried.is_some() {
			return self.replay(request, carried).await;
		}

		Err(self.unauthorized(&response))
	}

	async fn replay(
		&self,
		request: ApiRequest,
		carried: Option<TokenSecret>,
	) -> Result<ApiResponse> {
		let (tx, rx) = oneshot::channel::<Result<TransportFuture>>();
		let context = self.context.clone();
		let transport = self.transport.clone();
		let replay: Replay = Box::new(move |outcome: ReplayOutcome| {
			let dispatched = outcome.map_err(Error::from).and_then(|access| {
				let request = context.replay_request(request, &access)?;

				Ok(transport.execute(request))
			});
			let _ = tx.send(dispatched);
		});

		self.context.manager.recover_rejected(carried, replay).await;

		let dispatched = rx.await.map_err(|_| Error::from(RenewalError::Abandoned))??;
		let response = self.inspect(dispatched.await?).await?;

		// A replay is attempted once; a second rejection is terminal.
		if response.is_unauthorized() {
			return Err(self.unauthorized(&response));
		}

		Ok(response)
	}

	async fn inspect(&self, mut response: ApiResponse) -> Result<ApiResponse> {
		for middleware in &self.response_chain {
			response = middleware.on_response(&self.context, response).await?;
		}

		Ok(response)
	}

	fn unauthorized(&self, response: &ApiResponse) -> Error {
		let status = response.status.as_u16();

		self.context.manager.reject_credentials(status);

		Error::Unauthorized { status }
	}
}
impl<T> Clone for AuthenticatedClient<T>
where
	T: ?Sized + Transport,
{
	fn clone(&self) -> Self {
		Self {
			context: self.context.clone(),
			transport: self.transport.clone(),
			request_chain: self.request_chain.clone(),
			response_chain: self.response_chain.clone(),
		}
	}
}
impl<T> Debug for AuthenticatedClient<T>
where
	T: ?Sized + Transport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthenticatedClient")
			.field("context", &self.context)
			.field("request_middleware", &self.request_chain.len())
			.field("response_middleware", &self.response_chain.len())
			.finish()
	}
}
