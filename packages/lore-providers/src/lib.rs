pub mod billing;
pub mod blob;
pub mod crawler;
pub mod embedding;
pub mod generator;

use color_eyre::{Result, eyre};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName};
use serde_json::{Map, Value};

/// Token usage reported by a provider call, forwarded to billing.
#[derive(Clone, Copy, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct TokenUsage {
	pub prompt_tokens: u64,
	pub completion_tokens: u64,
	pub total_tokens: u64,
}
impl TokenUsage {
	pub fn from_response(json: &Value) -> Self {
		let usage = json.get("usage");
		let field = |name: &str| {
			usage.and_then(|value| value.get(name)).and_then(|value| value.as_u64()).unwrap_or(0)
		};

		Self {
			prompt_tokens: field("prompt_tokens"),
			completion_tokens: field("completion_tokens"),
			total_tokens: field("total_tokens"),
		}
	}
}

pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();
	headers.insert(AUTHORIZATION, format!("Bearer {api_key}").parse()?);
	for (key, value) in default_headers {
		let Some(raw) = value.as_str() else {
			return Err(eyre::eyre!("Default header values must be strings."));
		};
		headers.insert(HeaderName::from_bytes(key.as_bytes())?, raw.parse()?);
	}
	Ok(headers)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn usage_parses_openai_shape() {
		let json = serde_json::json!({
			"usage": { "prompt_tokens": 12, "completion_tokens": 34, "total_tokens": 46 }
		});
		let usage = TokenUsage::from_response(&json);

		assert_eq!(usage.prompt_tokens, 12);
		assert_eq!(usage.completion_tokens, 34);
		assert_eq!(usage.total_tokens, 46);
	}

	#[test]
	fn usage_defaults_to_zero_when_missing() {
		let usage = TokenUsage::from_response(&serde_json::json!({}));

		assert_eq!(usage.total_tokens, 0);
	}
}
