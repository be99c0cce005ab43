// self
use crate::{
	_prelude::*,
	error::RenewalError,
	obs::RenewalTrigger,
	store::StoreError,
	token::ClaimsError,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRenewal<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRenewal<F> = F;

/// Span wrapper used around coordinator entries.
#[derive(Clone, Debug)]
pub struct RenewalSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RenewalSpan {
	/// Creates a new span tagged with the domain + trigger.
	pub fn new(domain: &str, trigger: RenewalTrigger) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("bearer_relay.renewal", domain, trigger = trigger.as_str());

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (domain, trigger);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRenewal<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Logs a storage write/read that failed and was ignored.
pub fn log_storage_failure(domain: &str, action: &'static str, key: &str, err: &StoreError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(domain, action, key, error = %err, "Ignoring durable storage failure.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (domain, action, key, err);
	}
}

/// Logs an access token whose expiry could not be read from its claims.
pub fn log_opaque_expiry(domain: &str, err: &ClaimsError, fallback: Option<Duration>) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			domain,
			error = %err,
			fallback_secs = fallback.map(|ttl| ttl.whole_seconds()),
			"Access token expiry is not decodable."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (domain, err, fallback);
	}
}

/// Logs a credential rotation delivered on an ordinary response.
pub fn log_rotation(domain: &str, access: bool, refresh: bool) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(domain, access, refresh, "Server rotated credentials via response headers.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (domain, access, refresh);
	}
}

/// Logs a renewal failure that signed the domain out.
pub fn log_renewal_failure(domain: &str, trigger: RenewalTrigger, err: &RenewalError) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(domain, trigger = trigger.as_str(), error = %err, "Credential renewal failed.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (domain, trigger, err);
	}
}

/// Logs a 401 that invalidated the domain's refresh token.
pub fn log_unauthorized(domain: &str, status: u16) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(domain, status, "Request rejected as unauthorized; refresh token cleared.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (domain, status);
	}
}
