//! Endpoint descriptor shared by the credential manager and the request client.
//!
//! The descriptor names the three fixed OAuth 1.0a endpoints plus the REST API base all
//! resource calls resolve against, validated once at build time so the flows can treat the
//! URLs as well-formed.

// self
use crate::_prelude::*;

/// Errors raised while constructing or validating an endpoint descriptor.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ApiEndpointsError {
	/// Request-token endpoint is required for the user grant.
	#[error("Missing request-token endpoint.")]
	MissingRequestTokenEndpoint,
	/// Authorization endpoint is required for the user grant.
	#[error("Missing authorization endpoint.")]
	MissingAuthorizationEndpoint,
	/// Access-token endpoint is required for the user grant.
	#[error("Missing access-token endpoint.")]
	MissingAccessTokenEndpoint,
	/// API base is required for resource and list calls.
	#[error("Missing API base URL.")]
	MissingApiBase,
	/// Non-loopback endpoints must use HTTPS.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// The API base cannot serve as a join base for resource paths.
	#[error("The API base URL cannot be used as a base: {url}.")]
	UnusableApiBase {
		/// API base URL that failed validation.
		url: String,
	},
}

/// Immutable endpoint descriptor consumed by the credential manager and request client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiEndpoints {
	/// Request-token endpoint (signed POST carrying the local callback).
	pub request_token: Url,
	/// Authorization endpoint the user's browser is sent to.
	pub authorization: Url,
	/// Access-token endpoint (signed POST carrying the verifier).
	pub access_token: Url,
	/// Base URL resource and list paths resolve against; always ends with `/`.
	pub api_base: Url,
}
impl ApiEndpoints {
	/// Creates a new builder.
	pub fn builder() -> ApiEndpointsBuilder {
		ApiEndpointsBuilder::default()
	}
}

/// Builder for [`ApiEndpoints`] values.
#[derive(Debug, Default)]
pub struct ApiEndpointsBuilder {
	/// Request-token endpoint.
	pub request_token: Option<Url>,
	/// Authorization endpoint.
	pub authorization: Option<Url>,
	/// Access-token endpoint.
	pub access_token: Option<Url>,
	/// REST API base URL.
	pub api_base: Option<Url>,
}
impl ApiEndpointsBuilder {
	/// Sets the request-token endpoint.
	pub fn request_token(mut self, url: Url) -> Self {
		self.request_token = Some(url);

		self
	}

	/// Sets the authorization endpoint.
	pub fn authorization(mut self, url: Url) -> Self {
		self.authorization = Some(url);

		self
	}

	/// Sets the access-token endpoint.
	pub fn access_token(mut self, url: Url) -> Self {
		self.access_token = Some(url);

		self
	}

	/// Sets the REST API base URL; a missing trailing `/` is appended so path joins resolve
	/// below the base instead of replacing its last segment.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ApiEndpoints, ApiEndpointsError> {
		let request_token =
			self.request_token.ok_or(ApiEndpointsError::MissingRequestTokenEndpoint)?;
		let authorization =
			self.authorization.ok_or(ApiEndpointsError::MissingAuthorizationEndpoint)?;
		let access_token = self.access_token.ok_or(ApiEndpointsError::MissingAccessTokenEndpoint)?;
		let mut api_base = self.api_base.ok_or(ApiEndpointsError::MissingApiBase)?;

		if api_base.cannot_be_a_base() {
			return Err(ApiEndpointsError::UnusableApiBase { url: api_base.to_string() });
		}
		if !api_base.path().ends_with('/') {
			let path = format!("{}/", api_base.path());

			api_base.set_path(&path);
		}

		validate_endpoint("request-token", &request_token)?;
		validate_endpoint("authorization", &authorization)?;
		validate_endpoint("access-token", &access_token)?;
		validate_endpoint("API base", &api_base)?;

		Ok(ApiEndpoints { request_token, authorization, access_token, api_base })
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ApiEndpointsError> {
	if url.scheme() == "https" || is_loopback(url) {
		Ok(())
	} else {
		Err(ApiEndpointsError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

// Loopback HTTP is permitted: the grant redirect listener is loopback by construction, and
// local mock servers follow the same rule.
fn is_loopback(url: &Url) -> bool {
	matches!(url.host_str(), Some("127.0.0.1" | "localhost" | "[::1]"))
}
