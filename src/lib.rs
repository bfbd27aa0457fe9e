//! Rust’s turnkey OAuth 1.0a client—three-legged user grants, HMAC-SHA1 request signing, and
//! cursor-following pagination in one crate built for desktop API tooling.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod client;
pub mod credentials;
pub mod error;
pub mod http;
pub mod listener;
pub mod obs;
pub mod provider;
pub mod signing;
#[cfg(feature = "reqwest")]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; not part of the crate's
	//! supported API surface.

	pub use crate::_prelude::*;

	// std
	use std::io;
	// self
	use crate::{
		auth::Consumer,
		client::RequestClient,
		http::ReqwestHttpClient,
		listener::{GrantListener, UrlOpener},
		provider::ApiEndpoints,
	};

	/// Client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = RequestClient<ReqwestHttpClient>;

	/// Builds a reqwest HTTP client suitable for talking to `httpmock` servers during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client =
			ReqwestClient::builder().build().expect("Failed to build Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`RequestClient`] backed by the test transport and a scripted opener.
	pub fn build_test_client(
		endpoints: ApiEndpoints,
		consumer: Consumer,
		opener: Arc<dyn UrlOpener>,
		grant_timeout: Duration,
	) -> ReqwestTestClient {
		RequestClient::with_http_client(endpoints, consumer, test_reqwest_http_client())
			.with_grant_listener(GrantListener::new(opener, grant_timeout))
	}

	/// Opener double that completes the grant round-trip by issuing the redirect request a real
	/// browser would, carrying the scripted verifier.
	pub struct GrantingOpener {
		verifier: String,
	}
	impl GrantingOpener {
		/// Creates an opener that grants with the provided verifier.
		pub fn new(verifier: impl Into<String>) -> Self {
			Self { verifier: verifier.into() }
		}
	}
	impl UrlOpener for GrantingOpener {
		fn open_authorization(&self, authorize: &Url, callback: &Url) -> io::Result<()> {
			let token = authorize
				.query_pairs()
				.find(|(key, _)| key == "oauth_token")
				.map(|(_, value)| value.into_owned())
				.unwrap_or_default();
			let mut target = callback.clone();

			target
				.query_pairs_mut()
				.append_pair("oauth_verifier", &self.verifier)
				.append_pair("oauth_token", &token);

			tokio::spawn(async move {
				let _ = reqwest::get(target).await;
			});

			Ok(())
		}
	}

	/// Opener double that denies the grant by completing the redirect without a verifier.
	pub struct DenyingOpener;
	impl UrlOpener for DenyingOpener {
		fn open_authorization(&self, _authorize: &Url, callback: &Url) -> io::Result<()> {
			let target = callback.clone();

			tokio::spawn(async move {
				let _ = reqwest::get(target).await;
			});

			Ok(())
		}
	}

	/// Opener double that never completes the redirect, forcing the grant wait to expire.
	pub struct SilentOpener;
	impl UrlOpener for SilentOpener {
		fn open_authorization(&self, _authorize: &Url, _callback: &Url) -> io::Result<()> {
			Ok(())
		}
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
		time::Duration,
	};

	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::Deserialize;
	pub use thiserror::Error as ThisError;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
