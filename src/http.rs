//! Transport primitives for signed and API-key-qualified requests.
//!
//! The module exposes [`ApiHttpClient`] so downstream crates can integrate custom HTTP stacks:
//! the trait is the client's only dependency on a transport, describing a request as
//! method + URL + headers + optional body and a response as status + body text. The default
//! reqwest-backed implementation lives behind the `reqwest` cargo feature.

// std
use std::ops::Deref;
// self
use crate::{_prelude::*, error::TransportError};

/// Name of the authorization header carrying the signed parameter string.
pub const AUTHORIZATION: &str = "Authorization";

/// HTTP methods the client issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
	/// GET: single resources and list pages.
	Get,
	/// POST: token exchanges and resource creation.
	Post,
	/// PUT: resource updates.
	Put,
	/// DELETE: resource removal.
	Delete,
}
impl HttpMethod {
	/// Returns the wire name of the method.
	pub const fn as_str(self) -> &'static str {
		match self {
			HttpMethod::Get => "GET",
			HttpMethod::Post => "POST",
			HttpMethod::Put => "PUT",
			HttpMethod::Delete => "DELETE",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Request body shapes the client sends; each implies its content type.
#[derive(Clone, Debug)]
pub enum ApiBody {
	/// `application/x-www-form-urlencoded` content (token exchanges).
	Form(String),
	/// `application/json` content (resource payloads).
	Json(String),
}
impl ApiBody {
	/// Content-type header value implied by the body shape.
	pub const fn content_type(&self) -> &'static str {
		match self {
			ApiBody::Form(_) => "application/x-www-form-urlencoded",
			ApiBody::Json(_) => "application/json",
		}
	}

	/// Raw body text.
	pub fn text(&self) -> &str {
		match self {
			ApiBody::Form(text) | ApiBody::Json(text) => text,
		}
	}
}

/// Transport-agnostic request description.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: HttpMethod,
	/// Fully-qualified request URL.
	pub url: Url,
	/// Header name/value pairs (typically just the authorization header).
	pub headers: Vec<(String, String)>,
	/// Optional request body.
	pub body: Option<ApiBody>,
}
impl ApiRequest {
	/// Creates a bare request for the method + URL pair.
	pub fn new(method: HttpMethod, url: Url) -> Self {
		Self { method, url, headers: Vec::new(), body: None }
	}

	/// Attaches a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Attaches a body.
	pub fn with_body(mut self, body: ApiBody) -> Self {
		self.body = Some(body);

		self
	}
}

/// Transport-agnostic response: status code plus body text.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Response body decoded as text.
	pub body: String,
}
impl ApiResponse {
	/// Whether the status code is in the 2xx success range.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

/// Future type returned by [`ApiHttpClient::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing client requests.
///
/// Implementations must be `Send + Sync + 'static` so one transport can back both the
/// credential manager's token exchanges and the request client's resource calls. A
/// non-success status is a valid response, not an error; [`TransportError`] is reserved for
/// network and I/O failures.
pub trait ApiHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Executes a request, resolving to the response status and body text.
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
/// Token exchanges should not follow redirects, matching OAuth guidance that token endpoints
/// return results directly instead of delegating to another URI; configure any custom
/// [`ReqwestClient`] accordingly.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiHttpClient for ReqwestHttpClient {
	fn execute(&self, request: ApiRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = match request.method {
				HttpMethod::Get => reqwest::Method::GET,
				HttpMethod::Post => reqwest::Method::POST,
				HttpMethod::Put => reqwest::Method::PUT,
				HttpMethod::Delete => reqwest::Method::DELETE,
			};
			let mut builder = client.request(method, request.url);

			for (name, value) in &request.headers {
				builder = builder.header(name, value);
			}
			if let Some(body) = request.body {
				builder =
					builder.header("Content-Type", body.content_type()).body(body.text().to_owned());
			}

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status().as_u16();
			let body = response.text().await.map_err(TransportError::from)?;

			Ok(ApiResponse { status, body })
		})
	}
}
