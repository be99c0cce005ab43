//! Redacted credential wrapper and bearer-scheme helpers.

// self
use crate::_prelude::*;

const BEARER_PREFIX: &str = "Bearer ";

/// Token secret that keeps credential material out of logs.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Extracts the credential from a header value, accepting both `Bearer <token>` and a bare
	/// token. Returns `None` for blank values.
	pub fn from_header_value(raw: &str) -> Option<Self> {
		let raw = raw.trim();
		let token = match raw.get(..BEARER_PREFIX.len()) {
			Some(prefix) if prefix.eq_ignore_ascii_case(BEARER_PREFIX) =>
				raw[BEARER_PREFIX.len()..].trim(),
			_ => raw,
		};

		if token.is_empty() { None } else { Some(Self::new(token)) }
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Formats the secret as an RFC 6750 `Bearer` credential.
	pub fn bearer(&self) -> String {
		format!("{BEARER_PREFIX}{}", self.0)
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
