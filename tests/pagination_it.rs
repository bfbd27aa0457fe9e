#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use serde_json::{Value, json};
// self
use oauth1_courier::{_preludet::*, auth::Consumer, provider::ApiEndpoints};

const CONSUMER_KEY: &str = "consumer-page";
const CONSUMER_SECRET: &str = "secret-page";
const BLOG: &str = "example.tld";
const GRANT_TIMEOUT: Duration = Duration::from_secs(5);

fn build_endpoints(server: &MockServer) -> ApiEndpoints {
	ApiEndpoints::builder()
		.request_token(
			Url::parse(&server.url("/oauth/request_token"))
				.expect("Mock request-token endpoint should parse successfully."),
		)
		.authorization(
			Url::parse(&server.url("/oauth/authorize"))
				.expect("Mock authorization endpoint should parse successfully."),
		)
		.access_token(
			Url::parse(&server.url("/oauth/access_token"))
				.expect("Mock access-token endpoint should parse successfully."),
		)
		.api_base(
			Url::parse(&server.url("/v2/")).expect("Mock API base should parse successfully."),
		)
		.build()
		.expect("Endpoint descriptor should build successfully.")
}

fn unauthenticated_client(endpoints: ApiEndpoints) -> ReqwestTestClient {
	build_test_client(
		endpoints,
		Consumer::new(CONSUMER_KEY, CONSUMER_SECRET),
		Arc::new(SilentOpener),
		GRANT_TIMEOUT,
	)
}

fn page_body(first_id: u64, count: u64, next: Option<&str>) -> String {
	let items: Vec<Value> =
		(first_id..first_id + count).map(|id| json!({ "id": id })).collect();
	let mut envelope = json!({ "items": items });

	if let Some(next) = next {
		envelope["links"] = json!({ "next": { "href": next } });
	}

	envelope.to_string()
}

fn ids(items: &[Value]) -> Vec<u64> {
	items.iter().map(|item| item["id"].as_u64().expect("Item should carry an id.")).collect()
}

#[tokio::test]
async fn limit_is_enforced_after_merging_whole_pages() {
	let server = MockServer::start_async().await;
	let endpoints = build_endpoints(&server);
	// Relative next links resolve against the API base and are re-qualified with the API key.
	let first_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v2/blog/example.tld/posts")
				.query_param("api_key", CONSUMER_KEY);
			then.status(200)
				.header("content-type", "application/json")
				.body(page_body(1, 5, Some("blog/example.tld/posts-p2")));
		})
		.await;
	let second_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v2/blog/example.tld/posts-p2")
				.query_param("api_key", CONSUMER_KEY);
			then.status(200)
				.header("content-type", "application/json")
				.body(page_body(6, 5, Some("blog/example.tld/posts-p3")));
		})
		.await;
	let third_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/blog/example.tld/posts-p3");
			then.status(200)
				.header("content-type", "application/json")
				.body(page_body(11, 5, None));
		})
		.await;
	let mut client = unauthenticated_client(endpoints);
	let items = client
		.list_paginated(BLOG, "posts", false, 8)
		.await
		.expect("Pagination should not fail fatally.");

	// Pages of [5, 5, 5] with limit 8: exactly two fetches, ten items, in arrival order.
	assert_eq!(ids(&items), (1..=10).collect::<Vec<_>>());

	first_mock.assert_hits_async(1).await;
	second_mock.assert_hits_async(1).await;
	third_mock.assert_hits_async(0).await;
}

#[tokio::test]
async fn missing_next_link_terminates_after_merging_the_page() {
	let server = MockServer::start_async().await;
	let endpoints = build_endpoints(&server);
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/blog/example.tld/posts");
			then.status(200)
				.header("content-type", "application/json")
				.body(page_body(1, 3, None));
		})
		.await;
	let mut client = unauthenticated_client(endpoints);
	let items = client
		.list_paginated(BLOG, "posts", false, 0)
		.await
		.expect("Pagination should not fail fatally.");

	assert_eq!(ids(&items), vec![1, 2, 3]);

	mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn non_success_status_returns_the_accumulated_prefix() {
	let server = MockServer::start_async().await;
	let endpoints = build_endpoints(&server);
	let _first_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/blog/example.tld/posts");
			then.status(200)
				.header("content-type", "application/json")
				.body(page_body(1, 5, Some("blog/example.tld/posts-p2")));
		})
		.await;
	let second_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/blog/example.tld/posts-p2");
			then.status(502).body("bad gateway");
		})
		.await;
	let mut client = unauthenticated_client(endpoints);
	let items = client
		.list_paginated(BLOG, "posts", false, 0)
		.await
		.expect("A failed page fetch must be reported, not raised.");

	assert_eq!(ids(&items), vec![1, 2, 3, 4, 5]);

	second_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn malformed_envelope_terminates_with_the_accumulated_prefix() {
	let server = MockServer::start_async().await;
	let endpoints = build_endpoints(&server);
	let _first_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/blog/example.tld/posts");
			then.status(200)
				.header("content-type", "application/json")
				.body(page_body(1, 4, Some("blog/example.tld/posts-p2")));
		})
		.await;
	let second_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/blog/example.tld/posts-p2");
			then.status(200).header("content-type", "application/json").body("not json");
		})
		.await;
	let mut client = unauthenticated_client(endpoints);
	let items = client
		.list_paginated(BLOG, "posts", false, 0)
		.await
		.expect("A malformed envelope must be reported, not raised.");

	assert_eq!(ids(&items), vec![1, 2, 3, 4]);

	second_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn absolute_next_links_are_followed_verbatim() {
	let server = MockServer::start_async().await;
	let endpoints = build_endpoints(&server);
	let next = server.url("/v2/blog/example.tld/posts-p2");
	let _first_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/blog/example.tld/posts");
			then.status(200)
				.header("content-type", "application/json")
				.body(page_body(1, 2, Some(&next)));
		})
		.await;
	let second_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v2/blog/example.tld/posts-p2")
				.query_param("api_key", CONSUMER_KEY);
			then.status(200)
				.header("content-type", "application/json")
				.body(page_body(3, 2, None));
		})
		.await;
	let mut client = unauthenticated_client(endpoints);
	let items = client
		.list_paginated(BLOG, "posts", false, 0)
		.await
		.expect("Pagination should not fail fatally.");

	assert_eq!(ids(&items), vec![1, 2, 3, 4]);

	second_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn authenticated_lists_are_signed_and_flagged() {
	let server = MockServer::start_async().await;
	let endpoints = build_endpoints(&server);

	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/request_token");
			then.status(200).body("oauth_token=tmp-token&oauth_token_secret=tmp-secret");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/access_token");
			then.status(200).body("oauth_token=access-token&oauth_token_secret=access-secret");
		})
		.await;

	let first_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v2/blog/example.tld/posts")
				.query_param("npf", "true")
				.header_exists("authorization");
			then.status(200)
				.header("content-type", "application/json")
				.body(page_body(1, 2, Some("blog/example.tld/posts-p2")));
		})
		.await;
	let second_mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/v2/blog/example.tld/posts-p2")
				.header_exists("authorization");
			then.status(200)
				.header("content-type", "application/json")
				.body(page_body(3, 2, None));
		})
		.await;
	let mut client = build_test_client(
		endpoints,
		Consumer::new(CONSUMER_KEY, CONSUMER_SECRET),
		Arc::new(GrantingOpener::new("verifier-page")),
		GRANT_TIMEOUT,
	)
	.with_list_feature_param("npf", "true");
	let items = client
		.list_paginated(BLOG, "posts", true, 0)
		.await
		.expect("Authenticated pagination should not fail fatally.");

	assert!(client.is_authenticated());
	assert_eq!(ids(&items), vec![1, 2, 3, 4]);

	first_mock.assert_hits_async(1).await;
	second_mock.assert_hits_async(1).await;
}

#[tokio::test]
async fn required_auth_failure_aborts_with_an_empty_result() {
	let server = MockServer::start_async().await;
	let endpoints = build_endpoints(&server);
	let _request_token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/oauth/request_token");
			then.status(401).body("oauth_problem=consumer_key_rejected");
		})
		.await;
	let list_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/v2/blog/example.tld/posts");
			then.status(200)
				.header("content-type", "application/json")
				.body(page_body(1, 5, None));
		})
		.await;
	let mut client = unauthenticated_client(endpoints);
	let items = client
		.list_paginated(BLOG, "posts", true, 0)
		.await
		.expect("Auth failure should be reported, not raised.");

	assert!(items.is_empty());

	list_mock.assert_hits_async(0).await;
}
