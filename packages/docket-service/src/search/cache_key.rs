//! Cache key derivation for search responses.
//!
//! The key is a blake3 digest of a versioned JSON fingerprint of the request.
//! Bump the schema version whenever the result shape changes so stale entries
//! from an older build miss instead of deserializing wrongly.

use serde_json::json;

use crate::{Error, Result, search::SearchOptions};

pub const SEARCH_CACHE_SCHEMA_VERSION: u32 = 1;

pub fn build_search_cache_key(query: &str, opts: &SearchOptions) -> Result<String> {
	let fingerprint = json!({
		"schema": SEARCH_CACHE_SCHEMA_VERSION,
		"query": query.trim().to_lowercase(),
		"limit": opts.limit,
		"threshold": opts.threshold,
		"text_query": opts.text_query,
		"entity_type": opts.entity_type,
		"case_id": opts.case_id,
		"content_type": opts.content_type,
	});
	let encoded = serde_json::to_string(&fingerprint).map_err(|err| Error::Storage {
		message: format!("Failed to encode search cache fingerprint: {err}"),
	})?;

	Ok(hash_cache_key(&encoded))
}

fn hash_cache_key(payload: &str) -> String {
	blake3::hash(payload.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn key_is_stable_across_query_casing_and_whitespace() {
		let opts = SearchOptions::default();
		let a = build_search_cache_key("Breach Of Contract", &opts).unwrap();
		let b = build_search_cache_key("  breach of contract  ", &opts).unwrap();

		assert_eq!(a, b);
	}

	#[test]
	fn key_varies_with_options() {
		let base = SearchOptions::default();
		let narrowed = SearchOptions { entity_type: Some("case".to_string()), ..base.clone() };
		let a = build_search_cache_key("fraud", &base).unwrap();
		let b = build_search_cache_key("fraud", &narrowed).unwrap();

		assert_ne!(a, b);
	}
}
