//! Credential manager: token state, the three-legged user grant, and header construction.
//!
//! One [`CredentialManager`] value owns the consumer key pair, the (optional) token pair, and
//! the authentication flag for a single user; it is not internally synchronized, so callers
//! serialize access, matching the one-user-per-client contract. Authentication state never
//! expires within the process: it flips to authenticated on the first successful grant and a
//! failed attempt leaves it unauthenticated so the next call that needs auth retries the full
//! flow from scratch.

// crates.io
use rand::{Rng, distr::Alphanumeric};
use time::OffsetDateTime;
// self
use crate::{
	_prelude::*,
	auth::{Consumer, TokenPair},
	http::{ApiBody, ApiHttpClient, ApiRequest, AUTHORIZATION, HttpMethod},
	listener::{self, GrantListener},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	provider::ApiEndpoints,
	signing::{self, ParameterSet},
};

/// Authorization header scheme name.
pub const AUTH_SCHEME: &str = "OAuth";

const OAUTH_CALLBACK: &str = "oauth_callback";
const OAUTH_CONSUMER_KEY: &str = "oauth_consumer_key";
const OAUTH_NONCE: &str = "oauth_nonce";
const OAUTH_SIGNATURE: &str = "oauth_signature";
const OAUTH_SIGNATURE_METHOD: &str = "oauth_signature_method";
const OAUTH_TIMESTAMP: &str = "oauth_timestamp";
const OAUTH_TOKEN: &str = "oauth_token";
const OAUTH_TOKEN_SECRET: &str = "oauth_token_secret";
const OAUTH_VERIFIER: &str = "oauth_verifier";
const OAUTH_VERSION: &str = "oauth_version";
const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const VERSION: &str = "1.0";
const NONCE_LEN: usize = 32;

/// Owns current token state, drives the three-legged exchange, and builds per-request
/// authorization headers.
#[derive(Clone, Debug)]
pub struct CredentialManager {
	consumer: Consumer,
	token: Option<TokenPair>,
	authenticated: bool,
	listener: GrantListener,
}
impl CredentialManager {
	/// Creates a manager for the consumer key pair with the default grant listener.
	pub fn new(consumer: Consumer) -> Self {
		Self { consumer, token: None, authenticated: false, listener: GrantListener::default() }
	}

	/// Replaces the grant listener (opener + wait bound).
	pub fn with_listener(mut self, listener: GrantListener) -> Self {
		self.listener = listener;

		self
	}

	/// Whether a user grant has completed successfully during this process.
	pub fn is_authenticated(&self) -> bool {
		self.authenticated
	}

	/// Public consumer key, doubling as the API key for unauthenticated calls.
	pub fn consumer_key(&self) -> &str {
		&self.consumer.key
	}

	/// Builds the authorization header value for one signed request.
	///
	/// Assembles a fresh protocol parameter skeleton, merges the URL's existing query
	/// parameters, sets a per-request nonce + timestamp and the current token (when one is
	/// held), merges form-body parameters when supplied, then computes the signature over
	/// everything gathered so far and inserts it last. No credential state is mutated.
	pub fn authorization_header(
		&self,
		method: HttpMethod,
		url: &Url,
		form_body: Option<&str>,
	) -> String {
		let mut params = ParameterSet::new();

		params.set(OAUTH_VERSION, VERSION);
		params.set(OAUTH_SIGNATURE_METHOD, SIGNATURE_METHOD);
		params.set(OAUTH_CONSUMER_KEY, &self.consumer.key);

		if let Some(query) = url.query() {
			params.parse_and_merge(query);
		}

		params.set(OAUTH_NONCE, nonce());
		params.set(OAUTH_TIMESTAMP, timestamp().to_string());

		if let Some(token) = &self.token {
			params.set(OAUTH_TOKEN, &token.token);
		}
		if let Some(body) = form_body {
			params.parse_and_merge(body);
		}

		let signature = signing::sign(
			method.as_str(),
			url,
			&params,
			self.consumer.secret.expose(),
			self.token.as_ref().map(|token| token.secret.expose()),
		);

		params.set(OAUTH_SIGNATURE, signature);

		params.authorization_header(AUTH_SCHEME)
	}

	/// Runs the interactive three-legged grant, returning whether the user is now
	/// authenticated.
	///
	/// `Ok(false)` covers every expected failure (a rejected token request, a denied or
	/// timed-out grant, a failed exchange) and always leaves the manager unauthenticated
	/// with no token state, so a later call retries from scratch. Only transport-level
	/// failures return `Err`.
	pub async fn authenticate_user<C>(
		&mut self,
		transport: &C,
		endpoints: &ApiEndpoints,
	) -> Result<bool>
	where
		C: ?Sized + ApiHttpClient,
	{
		const KIND: FlowKind = FlowKind::UserGrant;

		let span = FlowSpan::new(KIND, "authenticate_user");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run_user_grant(transport, endpoints)).await;

		if matches!(result, Ok(true)) {
			obs::record_flow_outcome(KIND, FlowOutcome::Success);
		} else {
			// Any failure collapses back to unauthenticated semantics.
			self.token = None;
			self.authenticated = false;

			obs::record_flow_outcome(KIND, FlowOutcome::Failure);
		}

		result
	}

	async fn run_user_grant<C>(&mut self, transport: &C, endpoints: &ApiEndpoints) -> Result<bool>
	where
		C: ?Sized + ApiHttpClient,
	{
		self.token = None;
		self.authenticated = false;

		let redirect = listener::reserve_redirect_url()?;

		// Request-token leg: the callback travels in the signed form body.
		let callback_body =
			format!("{OAUTH_CALLBACK}={}", signing::percent_encode(redirect.as_str()));
		let header = self.authorization_header(
			HttpMethod::Post,
			&endpoints.request_token,
			Some(&callback_body),
		);
		let request = ApiRequest::new(HttpMethod::Post, endpoints.request_token.clone())
			.with_header(AUTHORIZATION, header)
			.with_body(ApiBody::Form(callback_body));
		let response = transport.execute(request).await?;

		if !response.is_success() {
			obs::record_flow_warning(
				FlowKind::UserGrant,
				&format!("Request-token call returned status {}.", response.status),
			);

			return Ok(false);
		}

		let mut fields = ParameterSet::new();

		fields.parse_and_merge(&response.body);

		let (Some(token), Some(secret)) =
			(fields.get(OAUTH_TOKEN).map(str::to_owned), fields.get(OAUTH_TOKEN_SECRET).map(str::to_owned))
		else {
			obs::record_flow_warning(
				FlowKind::UserGrant,
				"Request-token response is missing the temporary token pair.",
			);

			return Ok(false);
		};

		self.token = Some(TokenPair::new(token.as_str(), secret));

		// User-grant leg: send the browser to the authorization page and capture the verifier.
		let mut authorize = endpoints.authorization.clone();

		authorize.query_pairs_mut().append_pair(OAUTH_TOKEN, &token);

		let Some(verifier) = self.listener.await_grant(&redirect, &authorize).await? else {
			return Ok(false);
		};

		// Exchange leg: the verifier travels as a query parameter on the signed POST.
		let mut exchange_url = endpoints.access_token.clone();

		exchange_url.query_pairs_mut().append_pair(OAUTH_VERIFIER, &verifier);

		let header = self.authorization_header(HttpMethod::Post, &exchange_url, None);
		let request = ApiRequest::new(HttpMethod::Post, exchange_url)
			.with_header(AUTHORIZATION, header);
		let response = transport.execute(request).await?;

		if !response.is_success() {
			obs::record_flow_warning(
				FlowKind::UserGrant,
				&format!("Access-token exchange returned status {}.", response.status),
			);

			return Ok(false);
		}

		fields.clear();
		fields.parse_and_merge(&response.body);

		match (fields.get(OAUTH_TOKEN), fields.get(OAUTH_TOKEN_SECRET)) {
			(Some(token), Some(secret)) => {
				self.token = Some(TokenPair::new(token, secret));
				self.authenticated = true;

				Ok(true)
			},
			_ => {
				obs::record_flow_warning(
					FlowKind::UserGrant,
					"Access-token response is missing the token pair.",
				);

				Ok(false)
			},
		}
	}
}

fn nonce() -> String {
	rand::rng().sample_iter(Alphanumeric).take(NONCE_LEN).map(char::from).collect()
}

fn timestamp() -> i64 {
	OffsetDateTime::now_utc().unix_timestamp()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn manager() -> CredentialManager {
		CredentialManager::new(Consumer::new("consumer-key", "consumer-secret"))
	}

	#[test]
	fn header_carries_the_protocol_skeleton() {
		let url = Url::parse("https://api.example.com/v2/blog/example.tld/posts")
			.expect("Fixture URL should parse successfully.");
		let header = manager().authorization_header(HttpMethod::Get, &url, None);

		assert!(header.starts_with("OAuth "));
		assert!(header.contains("oauth_consumer_key=\"consumer-key\""));
		assert!(header.contains("oauth_signature_method=\"HMAC-SHA1\""));
		assert!(header.contains("oauth_version=\"1.0\""));
		assert!(header.contains("oauth_nonce=\""));
		assert!(header.contains("oauth_timestamp=\""));
		assert!(header.contains("oauth_signature=\""));
		// No token has been issued yet.
		assert!(!header.contains("oauth_token=\""));
	}

	#[test]
	fn header_keys_render_in_ascending_order() {
		let url = Url::parse("https://api.example.com/v2/posts?zebra=1&apple=2")
			.expect("Fixture URL should parse successfully.");
		let header = manager().authorization_header(HttpMethod::Get, &url, None);
		let apple = header.find("apple=").expect("Merged query key should be present.");
		let nonce = header.find("oauth_nonce=").expect("Nonce should be present.");
		let zebra = header.find("zebra=").expect("Merged query key should be present.");

		assert!(apple < nonce);
		assert!(nonce < zebra);
	}

	#[test]
	fn nonce_and_timestamp_are_fresh_per_header() {
		let url = Url::parse("https://api.example.com/v2/posts")
			.expect("Fixture URL should parse successfully.");
		let manager = manager();
		let first = manager.authorization_header(HttpMethod::Get, &url, None);
		let second = manager.authorization_header(HttpMethod::Get, &url, None);

		fn field<'a>(header: &'a str, key: &str) -> &'a str {
			let start = header.find(key).expect("Header field should be present.") + key.len();
			let end = header[start..].find('"').expect("Header field should be quoted.");

			&header[start..start + end]
		}

		assert_ne!(field(&first, "oauth_nonce=\""), field(&second, "oauth_nonce=\""));
		// Signatures differ because the nonce differs even for an identical request.
		assert_ne!(field(&first, "oauth_signature=\""), field(&second, "oauth_signature=\""));
	}

	#[test]
	fn token_response_round_trips_through_parse_and_merge() {
		let mut fields = ParameterSet::new();

		fields.parse_and_merge("oauth_token=T1&oauth_token_secret=S1");

		assert_eq!(fields.get("oauth_token"), Some("T1"));
		assert_eq!(fields.get("oauth_token_secret"), Some("S1"));

		let pair = TokenPair::new(
			fields.get("oauth_token").expect("Token should be present."),
			fields.get("oauth_token_secret").expect("Token secret should be present."),
		);

		assert_eq!(pair.token, "T1");
		assert_eq!(pair.secret.expose(), "S1");
	}

	#[test]
	fn nonce_is_alphanumeric_and_sized() {
		let value = nonce();

		assert_eq!(value.len(), NONCE_LEN);
		assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
		assert_ne!(value, nonce());
	}
}
