use std::time::Duration;

use color_eyre::Result;
use reqwest::{Client, header::CONTENT_TYPE};
use serde_json::Value;

/// Uploads raw document bytes under a deterministic key and returns the
/// stored object's URL.
pub async fn upload(
	cfg: &lore_config::BlobProviderConfig,
	key: &str,
	bytes: &[u8],
	content_type: &str,
) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = object_url(&cfg.api_base, &cfg.bucket, key);
	let res = client
		.put(&url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.header(CONTENT_TYPE, content_type)
		.body(bytes.to_vec())
		.send()
		.await?;
	let res = res.error_for_status()?;

	// Providers that mint their own public URL report it back; otherwise the
	// object URL we wrote to is the canonical one.
	if let Ok(json) = res.json::<Value>().await
		&& let Some(reported) = json.get("url").and_then(|v| v.as_str())
	{
		return Ok(reported.to_string());
	}

	Ok(url)
}

fn object_url(api_base: &str, bucket: &str, key: &str) -> String {
	let base = api_base.trim_end_matches('/');

	format!("{base}/{bucket}/{key}")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn object_url_joins_cleanly() {
		assert_eq!(
			object_url("https://blob.example.com/", "docs", "a/b-doc-1-catalog.md"),
			"https://blob.example.com/docs/a/b-doc-1-catalog.md"
		);
	}
}
