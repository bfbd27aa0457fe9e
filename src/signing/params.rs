//! Ordered, duplicate-resistant protocol parameter collection.

// crates.io
use percent_encoding::percent_decode_str;
// self
use crate::{_prelude::*, signing::percent_encode};

/// Protocol parameter set with first-write-wins inserts and sorted canonical rendering.
///
/// Values are stored in decoded form and percent-encoded at render time, so a query string
/// merged from a request URL is encoded exactly once in the canonical output. Keys render in
/// ascending order regardless of insertion order.
#[derive(Clone, Debug, Default)]
pub struct ParameterSet(BTreeMap<String, String>);
impl ParameterSet {
	/// Creates an empty parameter set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Inserts a parameter only if the key is absent; a later `set` for an existing key is a
	/// silent no-op (first value wins).
	///
	/// Consequence worth knowing: a query or body parameter that was merged earlier under a
	/// protocol parameter's name (even `oauth_signature`) shadows the value a later `set`
	/// would have established.
	pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.0.entry(key.into()).or_insert_with(|| value.into());
	}

	/// Parses a query-string or form-body string and merges each pair with the
	/// first-write-wins rule.
	///
	/// A leading `?` is stripped, segments split on `&`, and each segment on its first `=`;
	/// bare tokens become a key with an empty value. Both halves are percent-decoded.
	pub fn parse_and_merge(&mut self, raw: &str) {
		let raw = raw.strip_prefix('?').unwrap_or(raw);

		for segment in raw.split('&').filter(|segment| !segment.is_empty()) {
			let (key, value) = segment.split_once('=').unwrap_or((segment, ""));

			self.set(decode(key), decode(value));
		}
	}

	/// Returns the stored value for a key, if present.
	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.get(key).map(String::as_str)
	}

	/// Renders sorted `key=value` pairs joined with `separator`, percent-encoding both halves.
	pub fn canonical(&self, separator: &str) -> String {
		self.0
			.iter()
			.map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
			.collect::<Vec<_>>()
			.join(separator)
	}

	/// Renders the authorization header value: the scheme name followed by sorted
	/// `key="value"` pairs joined with `, `, values percent-encoded.
	pub fn authorization_header(&self, scheme: &str) -> String {
		let pairs = self
			.0
			.iter()
			.map(|(key, value)| format!("{}=\"{}\"", percent_encode(key), percent_encode(value)))
			.collect::<Vec<_>>()
			.join(", ");

		format!("{scheme} {pairs}")
	}

	/// Removes all entries, resetting the set between independent protocol steps.
	pub fn clear(&mut self) {
		self.0.clear();
	}

	/// Returns `true` when the set holds no parameters.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Number of parameters currently held.
	pub fn len(&self) -> usize {
		self.0.len()
	}
}

fn decode(raw: &str) -> String {
	percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn first_write_wins() {
		let mut params = ParameterSet::new();

		params.set("a", "1");
		params.set("a", "2");

		assert_eq!(params.get("a"), Some("1"));
		assert_eq!(params.len(), 1);
	}

	#[test]
	fn canonical_sorts_ascending_regardless_of_insertion_order() {
		let mut params = ParameterSet::new();

		params.set("zeta", "last");
		params.set("alpha", "first");
		params.set("mid", "between");

		assert_eq!(params.canonical("&"), "alpha=first&mid=between&zeta=last");
		assert_eq!(params.canonical(","), "alpha=first,mid=between,zeta=last");
	}

	#[test]
	fn canonical_percent_encodes_keys_and_values() {
		let mut params = ParameterSet::new();

		params.set("redirect url", "http://127.0.0.1:8080/");

		assert_eq!(params.canonical("&"), "redirect%20url=http%3A%2F%2F127.0.0.1%3A8080%2F");
	}

	#[test]
	fn parse_and_merge_handles_query_shapes() {
		let mut params = ParameterSet::new();

		params.parse_and_merge("?b=2&a=1&flag&empty=");

		assert_eq!(params.get("a"), Some("1"));
		assert_eq!(params.get("b"), Some("2"));
		assert_eq!(params.get("flag"), Some(""));
		assert_eq!(params.get("empty"), Some(""));
		assert_eq!(params.canonical("&"), "a=1&b=2&empty=&flag=");
	}

	#[test]
	fn parse_and_merge_decodes_and_respects_first_write() {
		let mut params = ParameterSet::new();

		params.set("oauth_callback", "http://127.0.0.1:9999/");
		params.parse_and_merge("oauth_callback=http%3A%2F%2Fattacker.example%2F&note=a%20b");

		assert_eq!(params.get("oauth_callback"), Some("http://127.0.0.1:9999/"));
		assert_eq!(params.get("note"), Some("a b"));
	}

	#[test]
	fn authorization_header_quotes_values() {
		let mut params = ParameterSet::new();

		params.set("oauth_token", "nnch734d00sl2jdk");
		params.set("oauth_signature", "tR3+Ty81lMeYAr/Fid0kMTYa/WM=");

		assert_eq!(
			params.authorization_header("OAuth"),
			"OAuth oauth_signature=\"tR3%2BTy81lMeYAr%2FFid0kMTYa%2FWM%3D\", \
			oauth_token=\"nnch734d00sl2jdk\""
		);
	}

	#[test]
	fn clear_resets_state_between_steps() {
		let mut params = ParameterSet::new();

		params.parse_and_merge("oauth_token=T1&oauth_token_secret=S1");

		assert!(!params.is_empty());

		params.clear();

		assert!(params.is_empty());
		assert_eq!(params.get("oauth_token"), None);
	}
}
