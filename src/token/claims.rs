//! Expiry extraction from JWT access tokens.
//!
//! Only the payload's `exp` claim is read. Signatures are not verified; the server remains
//! responsible for rejecting forged or expired credentials.

// crates.io
use base64::{
	Engine,
	engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
// self
use crate::_prelude::*;

/// Reasons an access token's expiry could not be decoded.
#[derive(Debug, ThisError)]
pub enum ClaimsError {
	/// Token is not made of three dot-separated segments.
	#[error("Token is not a compact JWT.")]
	NotAJwt,
	/// Payload segment is not valid base64url.
	#[error("JWT payload is not valid base64url.")]
	Encoding(#[from] base64::DecodeError),
	/// Payload is not a JSON object with a numeric `exp`.
	#[error("JWT payload could not be parsed.")]
	Payload(#[from] serde_json::Error),
	/// Payload has no `exp` claim.
	#[error("JWT payload has no exp claim.")]
	MissingExp,
	/// `exp` does not fit a representable instant.
	#[error("JWT exp claim is out of range.")]
	ExpOutOfRange,
}

#[derive(Deserialize)]
struct ExpiryClaim {
	exp: Option<serde_json::Number>,
}

/// Decodes the `exp` claim of a compact JWT into an instant.
pub fn decode_expiry(token: &str) -> Result<OffsetDateTime, ClaimsError> {
	let mut segments = token.split('.');
	let payload = match (segments.next(), segments.next(), segments.next(), segments.next()) {
		(Some(_), Some(payload), Some(_), None) if !payload.is_empty() => payload,
		_ => return Err(ClaimsError::NotAJwt),
	};
	let bytes = if payload.ends_with('=') {
		URL_SAFE.decode(payload)?
	} else {
		URL_SAFE_NO_PAD.decode(payload)?
	};
	let claim: ExpiryClaim = serde_json::from_slice(&bytes)?;
	let exp = claim.exp.ok_or(ClaimsError::MissingExp)?;
	let nanos = if let Some(secs) = exp.as_i64() {
		i128::from(secs) * 1_000_000_000
	} else {
		let secs = exp.as_f64().ok_or(ClaimsError::ExpOutOfRange)?;

		if !secs.is_finite() {
			return Err(ClaimsError::ExpOutOfRange);
		}

		(secs * 1e9) as i128
	};

	OffsetDateTime::from_unix_timestamp_nanos(nanos).map_err(|_| ClaimsError::ExpOutOfRange)
}
