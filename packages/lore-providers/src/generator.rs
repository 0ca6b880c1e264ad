use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

use crate::TokenUsage;

/// One chat completion round-trip. Returns the raw content string; callers
/// own any further parsing of that content.
pub async fn complete(
	cfg: &lore_config::GeneratorProviderConfig,
	messages: &[Value],
) -> Result<(String, TokenUsage)> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let usage = TokenUsage::from_response(&json);
	let content = parse_completion_content(json)?;

	Ok((content, usage))
}

fn parse_completion_content(json: Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| eyre::eyre!("Generator response is missing message content."))?;

	if content.trim().is_empty() {
		return Err(eyre::eyre!("Generator returned empty content."));
	}

	Ok(content.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_choice_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "# Analysis\n\nBody." } }
			]
		});
		let content = parse_completion_content(json).expect("parse failed");
		assert!(content.starts_with("# Analysis"));
	}

	#[test]
	fn rejects_empty_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "   " } }
			]
		});

		assert!(parse_completion_content(json).is_err());
	}

	#[test]
	fn rejects_missing_choices() {
		assert!(parse_completion_content(serde_json::json!({})).is_err());
	}
}
