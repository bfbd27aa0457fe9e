//! Walks through the interactive three-legged grant and issues a signed write with the
//! resulting credentials.
//!
//! Point the endpoints at a real OAuth 1.0a provider and supply your registered consumer key
//! pair; the default system opener will pop the authorization page in your browser and the
//! loopback listener captures the redirect.

// crates.io
use color_eyre::Result;
use serde_json::json;
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

	println!("Starting the interactive grant; your browser should open shortly.");

	if !client.authenticate().await? {
		eprintln!("The grant was denied or timed out; nothing was written.");

		return Ok(());
	}

	println!("Authenticated. Creating a post.");

	let payload = json!({ "title": "Hello from oauth1-courier", "body": "Signed with HMAC-SHA1." });

	match client.create("demo-blog.example.com", &payload).await? {
		Some(id) => println!("Created post {id}."),
		None => eprintln!("The API rejected the post."),
	}

	Ok(())
}
