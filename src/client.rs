//! Request client: signed or API-key-qualified resource calls with lazy authentication.
//!
//! The client owns one [`CredentialManager`] and one transport. Operations that require a
//! user grant trigger the interactive flow at most once per process (lazily, on the first
//! call that needs it); a failed grant fails that operation without touching the network and
//! leaves the manager unauthenticated so a later call retries. Expected protocol failures
//! (any non-success status) are reported as absent results, never as errors.

pub mod pagination;

// crates.io
use serde_json::Value;
// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	auth::Consumer,
	credentials::CredentialManager,
	error::ConfigError,
	http::{ApiBody, ApiHttpClient, ApiRequest, AUTHORIZATION, HttpMethod},
	listener::GrantListener,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ApiEndpoints,
};

const API_KEY_PARAM: &str = "api_key";
const ID_FIELD: &str = "id";

/// Issues signed and API-key-qualified requests against one API, one user at a time.
///
/// Not internally synchronized: operations take `&mut self` and concurrent use from multiple
/// execution contexts must be serialized by the caller.
#[derive(Clone)]
pub struct RequestClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// HTTP transport used for every outbound request.
	http_client: Arc<C>,
	/// Endpoint descriptor resource paths and token exchanges resolve against.
	endpoints: ApiEndpoints,
	/// Credential state + grant flow owner.
	credentials: CredentialManager,
	/// Optional query parameter appended to authenticated first-page list URLs.
	list_feature_param: Option<(String, String)>,
}
impl<C> RequestClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Creates a client that reuses the caller-provided transport.
	pub fn with_http_client(
		endpoints: ApiEndpoints,
		consumer: Consumer,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			endpoints,
			credentials: CredentialManager::new(consumer),
			list_feature_param: None,
		}
	}

	/// Replaces the grant listener used by the interactive flow (opener + wait bound).
	pub fn with_grant_listener(mut self, listener: GrantListener) -> Self {
		self.credentials = self.credentials.with_listener(listener);

		self
	}

	/// Sets the query parameter appended to the first page URL of authenticated list calls.
	pub fn with_list_feature_param(
		mut self,
		key: impl Into<String>,
		value: impl Into<String>,
	) -> Self {
		self.list_feature_param = Some((key.into(), value.into()));

		self
	}

	/// Whether the interactive grant has completed during this process.
	pub fn is_authenticated(&self) -> bool {
		self.credentials.is_authenticated()
	}

	/// Triggers the interactive grant immediately instead of waiting for the first call that
	/// needs it. Already-authenticated clients return `Ok(true)` without any network traffic.
	pub async fn authenticate(&mut self) -> Result<bool> {
		self.ensure_user_auth().await
	}

	/// Fetches a single resource.
	///
	/// When `requires_user_auth` is set and no grant has completed yet, the interactive flow
	/// runs first; its failure fails this call (`Ok(None)`) without a network request.
	/// Unauthenticated fetches are qualified with the API key instead of a signature.
	pub async fn get_single(
		&mut self,
		blog: &str,
		id: &str,
		requires_user_auth: bool,
	) -> Result<Option<Value>> {
		const KIND: FlowKind = FlowKind::SignedRequest;

		let span = FlowSpan::new(KIND, "get_single");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run_get_single(blog, id, requires_user_auth)).await;

		record_result(KIND, matches!(result, Ok(Some(_))));

		result
	}

	/// Creates a resource from a JSON payload, returning the new identifier.
	pub async fn create(&mut self, blog: &str, payload: &Value) -> Result<Option<String>> {
		const KIND: FlowKind = FlowKind::SignedRequest;

		let span = FlowSpan::new(KIND, "create");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run_write(blog, None, payload)).await;

		record_result(KIND, matches!(result, Ok(Some(_))));

		result
	}

	/// Updates a resource from a JSON payload, returning the affected identifier.
	pub async fn update(
		&mut self,
		blog: &str,
		id: &str,
		payload: &Value,
	) -> Result<Option<String>> {
		const KIND: FlowKind = FlowKind::SignedRequest;

		let span = FlowSpan::new(KIND, "update");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run_write(blog, Some(id), payload)).await;

		record_result(KIND, matches!(result, Ok(Some(_))));

		result
	}

	/// Deletes a resource, returning whether the API reported success.
	pub async fn delete(&mut self, blog: &str, id: &str) -> Result<bool> {
		const KIND: FlowKind = FlowKind::SignedRequest;

		let span = FlowSpan::new(KIND, "delete");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run_delete(blog, id)).await;

		record_result(KIND, matches!(result, Ok(true)));

		result
	}

	async fn run_get_single(
		&mut self,
		blog: &str,
		id: &str,
		requires_user_auth: bool,
	) -> Result<Option<Value>> {
		let mut url = self.blog_url(blog, &format!("posts/{id}"))?;
		let request = if requires_user_auth {
			if !self.ensure_user_auth().await? {
				return Ok(None);
			}

			self.signed_request(HttpMethod::Get, url, None)
		} else {
			self.qualify_with_api_key(&mut url);

			ApiRequest::new(HttpMethod::Get, url)
		};
		let response = self.http_client.execute(request).await?;

		if !response.is_success() {
			obs::record_flow_warning(
				FlowKind::SignedRequest,
				&format!("Resource fetch returned status {}.", response.status),
			);

			return Ok(None);
		}

		Ok(parse_json(&response.body))
	}

	async fn run_write(
		&mut self,
		blog: &str,
		id: Option<&str>,
		payload: &Value,
	) -> Result<Option<String>> {
		if !self.ensure_user_auth().await? {
			return Ok(None);
		}

		let (method, url) = match id {
			Some(id) => (HttpMethod::Put, self.blog_url(blog, &format!("posts/{id}"))?),
			None => (HttpMethod::Post, self.blog_url(blog, "posts")?),
		};
		let request =
			self.signed_request(method, url, Some(ApiBody::Json(payload.to_string())));
		let response = self.http_client.execute(request).await?;

		if !response.is_success() {
			obs::record_flow_warning(
				FlowKind::SignedRequest,
				&format!("Resource write returned status {}.", response.status),
			);

			return Ok(None);
		}

		Ok(parse_json(&response.body).as_ref().and_then(extract_id))
	}

	async fn run_delete(&mut self, blog: &str, id: &str) -> Result<bool> {
		if !self.ensure_user_auth().await? {
			return Ok(false);
		}

		let url = self.blog_url(blog, &format!("posts/{id}"))?;
		let request = self.signed_request(HttpMethod::Delete, url, None);
		let response = self.http_client.execute(request).await?;

		if !response.is_success() {
			obs::record_flow_warning(
				FlowKind::SignedRequest,
				&format!("Resource deletion returned status {}.", response.status),
			);
		}

		Ok(response.is_success())
	}

	async fn ensure_user_auth(&mut self) -> Result<bool> {
		if self.credentials.is_authenticated() {
			return Ok(true);
		}

		self.credentials.authenticate_user(self.http_client.as_ref(), &self.endpoints).await
	}

	fn blog_url(&self, blog: &str, tail: &str) -> Result<Url> {
		self.endpoints
			.api_base
			.join(&format!("blog/{blog}/{tail}"))
			.map_err(|source| ConfigError::InvalidRequestUrl { source }.into())
	}

	fn qualify_with_api_key(&self, url: &mut Url) {
		if !url.query_pairs().any(|(key, _)| key == API_KEY_PARAM) {
			url.query_pairs_mut().append_pair(API_KEY_PARAM, self.credentials.consumer_key());
		}
	}

	fn signed_request(&self, method: HttpMethod, url: Url, body: Option<ApiBody>) -> ApiRequest {
		// Only form-encoded content contributes parameters to the signature.
		let form = match &body {
			Some(ApiBody::Form(text)) => Some(text.as_str()),
			_ => None,
		};
		let header = self.credentials.authorization_header(method, &url, form);
		let mut request = ApiRequest::new(method, url).with_header(AUTHORIZATION, header);

		if let Some(body) = body {
			request = request.with_body(body);
		}

		request
	}
}
#[cfg(feature = "reqwest")]
impl RequestClient<ReqwestHttpClient> {
	/// Creates a new client with the crate's default reqwest transport.
	pub fn new(endpoints: ApiEndpoints, consumer: Consumer) -> Self {
		Self::with_http_client(endpoints, consumer, ReqwestHttpClient::default())
	}
}
impl<C> Debug for RequestClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequestClient")
			.field("endpoints", &self.endpoints)
			.field("authenticated", &self.credentials.is_authenticated())
			.finish()
	}
}

fn record_result(kind: FlowKind, succeeded: bool) {
	if succeeded {
		obs::record_flow_outcome(kind, FlowOutcome::Success);
	} else {
		obs::record_flow_outcome(kind, FlowOutcome::Failure);
	}
}

fn parse_json(body: &str) -> Option<Value> {
	let mut deserializer = serde_json::Deserializer::from_str(body);

	match serde_path_to_error::deserialize(&mut deserializer) {
		Ok(value) => Some(value),
		Err(e) => {
			obs::record_flow_warning(
				FlowKind::SignedRequest,
				&format!("Response body could not be parsed: {e}."),
			);

			None
		},
	}
}

fn extract_id(value: &Value) -> Option<String> {
	match value.get(ID_FIELD)? {
		Value::String(id) => Some(id.clone()),
		Value::Number(id) => Some(id.to_string()),
		_ => None,
	}
}
