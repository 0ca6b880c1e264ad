use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Fetches a source URL through the crawl provider and returns the
/// aggregated page content as markdown/plain text.
pub async fn fetch(cfg: &lore_config::CrawlerProviderConfig, source_url: &str) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "url": source_url });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_crawl_response(json)
}

fn parse_crawl_response(json: Value) -> Result<String> {
	// Single-page providers return { content } or { markdown }; multi-page
	// providers return { data: [{ content | markdown }, ...] }.
	if let Some(content) = page_text(&json) {
		return Ok(content);
	}

	if let Some(pages) = json.get("data").and_then(|v| v.as_array()) {
		let mut parts = Vec::with_capacity(pages.len());

		for page in pages {
			if let Some(content) = page_text(page) {
				parts.push(content);
			}
		}

		if !parts.is_empty() {
			return Ok(parts.join("\n\n"));
		}
	}

	Err(eyre::eyre!("Crawl response contained no usable content."))
}

fn page_text(value: &Value) -> Option<String> {
	for field in ["markdown", "content"] {
		if let Some(text) = value.get(field).and_then(|v| v.as_str()) {
			let trimmed = text.trim();

			if !trimmed.is_empty() {
				return Some(trimmed.to_string());
			}
		}
	}

	None
}
