//! HMAC-SHA1 request signing per RFC 5849.
//!
//! The module owns the three deterministic building blocks of the protocol: the percent-encoding
//! variant the signature base string requires, request URL normalization, and the keyed digest
//! itself. Everything here is pure; nonce and timestamp generation live with the credential
//! manager so a fixed [`ParameterSet`] always signs to the same value.

pub mod params;

pub use params::ParameterSet;

// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;
// self
use crate::_prelude::*;

type HmacSha1 = Hmac<Sha1>;

/// RFC 5849 §3.6 encode set: everything except `A-Z a-z 0-9 - _ . ~` becomes uppercase `%XX`.
const SIGNATURE_ENCODE_SET: &AsciiSet =
	&NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Percent-encodes a string with the RFC 5849 unreserved set.
///
/// Unreserved input passes through unchanged; every other byte (including each byte of a
/// multi-byte UTF-8 sequence) is rendered as `%XX` with uppercase hex digits.
pub fn percent_encode(value: &str) -> String {
	utf8_percent_encode(value, SIGNATURE_ENCODE_SET).to_string()
}

/// Computes the HMAC-SHA1 signature for a request description.
///
/// The signature covers the uppercased method, the normalized request URL, and the canonical
/// parameter string; the `oauth_signature` parameter itself must not be present in `params`
/// when this is called; it is inserted into the set afterward by the caller. The returned
/// value is the raw base64 digest; the canonical renderers apply RFC 5849 percent-encoding
/// when the signature is emitted, yielding `percentEncode(base64(hmac))` on the wire.
pub fn sign(
	method: &str,
	url: &Url,
	params: &ParameterSet,
	consumer_secret: &str,
	token_secret: Option<&str>,
) -> String {
	let base = signature_base_string(method, url, params);
	let key =
		format!("{}&{}", percent_encode(consumer_secret), percent_encode(token_secret.unwrap_or("")));
	// HMAC accepts keys of any length, so construction cannot fail.
	let mut mac = HmacSha1::new_from_slice(key.as_bytes()).unwrap_or_else(|_| unreachable!());

	mac.update(base.as_bytes());

	STANDARD.encode(mac.finalize().into_bytes())
}

/// Assembles the three-part signature base string of RFC 5849 §3.4.1.
pub fn signature_base_string(method: &str, url: &Url, params: &ParameterSet) -> String {
	format!(
		"{}&{}&{}",
		method.to_uppercase(),
		percent_encode(&normalize_url(url)),
		percent_encode(&params.canonical("&"))
	)
}

/// Normalizes a request URL for signing: scheme, host, the port only when it is not the
/// scheme's default, and the path. Query string and fragment are stripped.
pub fn normalize_url(url: &Url) -> String {
	let mut normalized = format!("{}://", url.scheme());

	if let Some(host) = url.host_str() {
		normalized.push_str(host);
	}
	// The `url` crate already drops ports matching the scheme default at parse time.
	if let Some(port) = url.port() {
		normalized.push(':');
		normalized.push_str(&port.to_string());
	}

	normalized.push_str(url.path());

	normalized
}
