//! Ephemeral loopback capture listener used during the interactive user grant.
//!
//! The listener exists only for the duration of one grant attempt: it binds the redirect URL
//! announced to the provider, sends the user's browser to the authorization page, and waits,
//! bounded by a timeout, for the single redirect request carrying the verifier. Every exit
//! path (grant, denial, timeout, failure) releases the socket before returning.

// std
use std::{io, net::TcpListener as StdTcpListener};
// crates.io
use tokio::{
	io::{AsyncReadExt, AsyncWriteExt},
	net::{TcpListener, TcpStream},
	time,
};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	obs::{self, FlowKind},
	signing::ParameterSet,
};

const VERIFIER_KEY: &str = "oauth_verifier";
const REQUEST_HEAD_LIMIT: usize = 8 * 1024;
const SUCCESS_PAGE: &str = "<!DOCTYPE html><html><head><title>Authorization complete</title></head>\
	<body><h1>Authorization complete</h1>\
	<p>Access was granted. You can close this window and return to the application.</p>\
	</body></html>";
const DENIAL_PAGE: &str = "<!DOCTYPE html><html><head><title>Authorization declined</title></head>\
	<body><h1>Authorization declined</h1>\
	<p>No verifier was returned. You can close this window.</p>\
	</body></html>";

/// Capability for sending the user to the authorization page.
///
/// `callback` is the local redirect target the authorization service returns the user to;
/// real implementations ignore it (the provider already learned it during the request-token
/// leg), while scripted test doubles use it to complete the round-trip themselves.
pub trait UrlOpener
where
	Self: Send + Sync,
{
	/// Opens the authorization URL in the user's agent.
	fn open_authorization(&self, authorize: &Url, callback: &Url) -> io::Result<()>;
}

/// Default opener delegating to the operating system's URL handler; the platform-specific
/// launch strategy lives in the `open` crate.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemOpener;
impl UrlOpener for SystemOpener {
	fn open_authorization(&self, authorize: &Url, _callback: &Url) -> io::Result<()> {
		open::that(authorize.as_str())
	}
}

/// One-shot redirect-capture server for the interactive grant step.
#[derive(Clone)]
pub struct GrantListener {
	opener: Arc<dyn UrlOpener>,
	timeout: Duration,
}
impl GrantListener {
	/// Default bound on the interactive wait.
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

	/// Creates a listener with the provided opener and wait bound.
	pub fn new(opener: Arc<dyn UrlOpener>, timeout: Duration) -> Self {
		Self { opener, timeout }
	}

	/// Waits for the user grant redirect and returns the verifier, or `None` on denial or
	/// timeout.
	///
	/// Binds exactly the provided redirect URL, launches the opener at `authorize` (a launch
	/// failure is logged, not fatal; the user may navigate manually), then serves exactly one
	/// inbound request: a success confirmation page when `oauth_verifier` is present, a denial
	/// page otherwise. The listener socket is dropped on every exit path.
	pub async fn await_grant(&self, redirect: &Url, authorize: &Url) -> Result<Option<String>> {
		let host = redirect
			.host_str()
			.ok_or_else(|| ConfigError::RedirectUnaddressable { url: redirect.to_string() })?;
		let port = redirect
			.port_or_known_default()
			.ok_or_else(|| ConfigError::RedirectUnaddressable { url: redirect.to_string() })?;
		let listener = TcpListener::bind((host, port)).await.map_err(TransportError::Io)?;

		if let Err(e) = self.opener.open_authorization(authorize, redirect) {
			obs::record_flow_warning(
				FlowKind::UserGrant,
				&format!("Failed to launch the system opener: {e}."),
			);
		}

		match time::timeout(self.timeout, capture_verifier(&listener)).await {
			// Timed out with no redirect received.
			Err(_) => Ok(None),
			Ok(Err(e)) => Err(TransportError::Io(e).into()),
			Ok(Ok(verifier)) => Ok(verifier),
		}
	}
}
impl Default for GrantListener {
	fn default() -> Self {
		Self::new(Arc::new(SystemOpener), Self::DEFAULT_TIMEOUT)
	}
}
impl Debug for GrantListener {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GrantListener").field("timeout", &self.timeout).finish()
	}
}

/// Reserves an OS-assigned ephemeral loopback port without holding the socket.
///
/// The redirect URL must be announced to the provider before the capture listener starts, so
/// the port is learned bind-then-release; the grant listener re-binds it moments later.
pub fn reserve_loopback_port() -> io::Result<u16> {
	let listener = StdTcpListener::bind("127.0.0.1:0")?;

	Ok(listener.local_addr()?.port())
}

/// Reserves an ephemeral loopback port and renders it as the local redirect URL.
pub fn reserve_redirect_url() -> Result<Url> {
	let port = reserve_loopback_port().map_err(TransportError::Io)?;

	Url::parse(&format!("http://127.0.0.1:{port}/"))
		.map_err(|source| ConfigError::InvalidRedirect { source }.into())
}

async fn capture_verifier(listener: &TcpListener) -> io::Result<Option<String>> {
	let (mut stream, _) = listener.accept().await?;
	let head = read_request_head(&mut stream).await?;
	let verifier = head.lines().next().and_then(parse_request_line);
	let page = if verifier.is_some() { SUCCESS_PAGE } else { DENIAL_PAGE };
	let response = format!(
		"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
		page.len(),
		page
	);

	stream.write_all(response.as_bytes()).await?;
	stream.flush().await?;
	stream.shutdown().await?;

	Ok(verifier)
}

async fn read_request_head(stream: &mut TcpStream) -> io::Result<String> {
	let mut head = Vec::new();
	let mut buf = [0_u8; 1024];

	loop {
		let read = stream.read(&mut buf).await?;

		if read == 0 {
			break;
		}

		head.extend_from_slice(&buf[..read]);

		if head.windows(4).any(|window| window == b"\r\n\r\n") || head.len() >= REQUEST_HEAD_LIMIT {
			break;
		}
	}

	Ok(String::from_utf8_lossy(&head).into_owned())
}

/// Extracts `oauth_verifier` from a `GET <path>?<query> HTTP/1.1` request line, reusing the
/// protocol parameter parsing rules.
fn parse_request_line(line: &str) -> Option<String> {
	let target = line.split_whitespace().nth(1)?;
	let (_, query) = target.split_once('?')?;
	let mut params = ParameterSet::new();

	params.parse_and_merge(query);

	params.get(VERIFIER_KEY).filter(|verifier| !verifier.is_empty()).map(str::to_owned)
}
