//! Request/response middleware chains and the two built-in credential hooks.

// self
use crate::{
	_prelude::*,
	client::DomainContext,
	transport::{ApiRequest, ApiResponse},
};

/// Boxed future returned by middleware hooks.
pub type MiddlewareFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Hook run on every outgoing request, in registration order.
pub trait RequestMiddleware
where
	Self: Send + Sync,
{
	/// Transforms `request` before it reaches the transport.
	fn on_request<'a>(
		&'a self,
		context: &'a DomainContext,
		request: ApiRequest,
	) -> MiddlewareFuture<'a, ApiRequest>;
}

/// Hook run on every response, in registration order, before 401 handling.
pub trait ResponseMiddleware
where
	Self: Send + Sync,
{
	/// Inspects or transforms `response`.
	fn on_response<'a>(
		&'a self,
		context: &'a DomainContext,
		response: ApiResponse,
	) -> MiddlewareFuture<'a, ApiResponse>;
}

/// Ensures freshness and attaches the domain's credentials.
///
/// Requests sent while no access token is held go out unauthenticated.
#[derive(Clone, Copy, Debug, Default)]
pub struct CredentialAttacher;
impl RequestMiddleware for CredentialAttacher {
	fn on_request<'a>(
		&'a self,
		context: &'a DomainContext,
		mut request: ApiRequest,
	) -> MiddlewareFuture<'a, ApiRequest> {
		Box::pin(async move {
			let manager = context.manager();

			if !manager.tokens().has_access() {
				return Ok(request);
			}

			manager.ensure_fresh(context.config().freshness_buffer).await?;

			let tokens = manager.tokens();

			if let Some(access) = tokens.access_token.as_ref() {
				context.authorize(&mut request, access, tokens.refresh_token.as_ref())?;
			}

			Ok(request)
		})
	}
}

/// Stores credentials the server rotates through response headers.
#[derive(Clone, Copy, Debug, Default)]
pub struct RotationCapture;
impl ResponseMiddleware for RotationCapture {
	fn on_response<'a>(
		&'a self,
		context: &'a DomainContext,
		response: ApiResponse,
	) -> MiddlewareFuture<'a, ApiResponse> {
		Box::pin(async move {
			if response.is_success() {
				context.manager().apply_rotation(
					response.credential(context.access_header()),
					response.credential(context.refresh_header()),
				);
			}

			Ok(response)
		})
	}
}
