//! Lists posts without a user grant, following the pagination cursor with an item cap.
//!
//! Unauthenticated list calls are qualified with the API key (the consumer key), so this demo
//! needs no browser interaction at all.

// crates.io
use color_eyre::Result;
use url::Url;
// self
use oauth1_courier::{auth::Consumer, client::RequestClient, provider::ApiEndpoints};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let endpoints = ApiEndpoints::builder()
		.request_token(Url::parse("https://provider.example.com/oauth/request_token")?)
		.authorization(Url::parse("https://provider.example.com/oauth/authorize")?)
		.access_token(Url::parse("https://provider.example.com/oauth/access_token")?)
		.api_base(Url::parse("https://api.example.com/v2/")?)
		.build()?;
	let consumer = Consumer::new("your-consumer-key", "your-consumer-secret");
	let mut client = RequestClient::new(endpoints, consumer);
	let posts = client.list_paginated("demo-blog.example.com", "posts", false, 25).await?;

	println!("Fetched {} posts.", posts.len());

	for post in &posts {
		let id = post.get("id").map(ToString::to_string).unwrap_or_else(|| "<no id>".into());
		let title = post.get("title").and_then(|title| title.as_str()).unwrap_or("<untitled>");

		println!("- {id}: {title}");
	}

	Ok(())
}
