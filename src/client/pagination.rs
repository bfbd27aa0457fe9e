//! Cursor-following pagination over list endpoints.

// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	client::RequestClient,
	http::{ApiHttpClient, ApiRequest, HttpMethod},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
};

/// Wire shape of one list page: the items plus the optional next-page link.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageEnvelope {
	#[serde(default)]
	pub items: Vec<Value>,
	#[serde(default)]
	pub links: PageLinks,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageLinks {
	pub next: Option<NextLink>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NextLink {
	pub href: String,
}

impl<C> RequestClient<C>
where
	C: ?Sized + ApiHttpClient,
{
	/// Follows the list endpoint's next-page cursor, merging pages into one ordered result.
	///
	/// Pages are fetched strictly sequentially. The loop terminates when a page carries no
	/// next link, when `limit` is nonzero and the accumulated count reaches it (checked after
	/// merging a page, never mid-page), or when a non-success status arrives; in every case
	/// returning what was accumulated so far. A required-but-failed grant aborts with an
	/// empty result before any network traffic.
	pub async fn list_paginated(
		&mut self,
		blog: &str,
		subpath: &str,
		requires_user_auth: bool,
		limit: usize,
	) -> Result<Vec<Value>> {
		const KIND: FlowKind = FlowKind::Pagination;

		let span = FlowSpan::new(KIND, "list_paginated");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run_list(blog, subpath, requires_user_auth, limit)).await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn run_list(
		&mut self,
		blog: &str,
		subpath: &str,
		requires_user_auth: bool,
		limit: usize,
	) -> Result<Vec<Value>> {
		let mut items = Vec::new();

		if requires_user_auth && !self.ensure_user_auth().await? {
			return Ok(items);
		}

		let mut url = self.blog_url(blog, subpath)?;

		if requires_user_auth {
			if let Some((key, value)) = &self.list_feature_param {
				url.query_pairs_mut().append_pair(key, value);
			}
		} else {
			self.qualify_with_api_key(&mut url);
		}

		loop {
			let request = if requires_user_auth {
				self.signed_request(HttpMethod::Get, url.clone(), None)
			} else {
				ApiRequest::new(HttpMethod::Get, url.clone())
			};
			let response = self.http_client.execute(request).await?;

			if !response.is_success() {
				obs::record_flow_warning(
					FlowKind::Pagination,
					&format!("Page fetch returned status {}; stopping.", response.status),
				);

				break;
			}

			let Some(page) = parse_envelope(&response.body) else {
				break;
			};

			items.extend(page.items);

			// A missing or malformed cursor is normal termination, not an error.
			let Some(next) = page.links.next else {
				break;
			};

			if limit != 0 && items.len() >= limit {
				break;
			}

			let Some(next_url) = resolve_next(&self.endpoints.api_base, &next.href) else {
				break;
			};

			url = next_url;

			if !requires_user_auth {
				self.qualify_with_api_key(&mut url);
			}
		}

		Ok(items)
	}
}

/// Resolves a next-page link, joining relative links against the API base.
fn resolve_next(api_base: &Url, href: &str) -> Option<Url> {
	if href.is_empty() {
		return None;
	}

	match Url::parse(href) {
		Ok(url) => Some(url),
		Err(url::ParseError::RelativeUrlWithoutBase) => api_base.join(href).ok(),
		Err(_) => None,
	}
}

fn parse_envelope(body: &str) -> Option<PageEnvelope> {
	let mut deserializer = serde_json::Deserializer::from_str(body);

	match serde_path_to_error::deserialize(&mut deserializer) {
		Ok(envelope) => Some(envelope),
		Err(e) => {
			obs::record_flow_warning(
				FlowKind::Pagination,
				&format!("Page envelope could not be parsed: {e}; stopping."),
			);

			None
		},
	}
}
