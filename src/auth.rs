//! Credential data model owned by the credential manager.

pub mod secret;

pub use secret::*;

// self
use crate::_prelude::*;

/// Immutable consumer (application) key pair issued by the API provider.
///
/// The public key doubles as the API key that qualifies unauthenticated calls; the secret
/// participates in every signature. Both are fixed for the process lifetime.
#[derive(Clone, Debug)]
pub struct Consumer {
	/// Public consumer key.
	pub key: String,
	/// Consumer signing secret.
	pub secret: TokenSecret,
}
impl Consumer {
	/// Creates a consumer key pair.
	pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
		Self { key: key.into(), secret: TokenSecret::new(secret) }
	}
}

/// Token pair held while a grant is in flight (temporary token) or after it succeeds (access
/// token). Cleared to absent whenever a grant attempt fails.
#[derive(Clone, Debug)]
pub struct TokenPair {
	/// Public token value.
	pub token: String,
	/// Token signing secret.
	pub secret: TokenSecret,
}
impl TokenPair {
	/// Creates a token pair.
	pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
		Self { token: token.into(), secret: TokenSecret::new(secret) }
	}
}
