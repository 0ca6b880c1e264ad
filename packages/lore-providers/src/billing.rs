use std::time::Duration;

use color_eyre::Result;
use reqwest::Client;
use serde::Serialize;

use crate::TokenUsage;

/// One metered usage event. Billing ingestion is best-effort; callers log
/// failures instead of aborting their unit of work.
#[derive(Clone, Debug, Serialize)]
pub struct UsageEvent {
	pub owner_id: String,
	pub purpose: String,
	pub usage: TokenUsage,
}

pub async fn ingest(cfg: &lore_config::BillingProviderConfig, event: &UsageEvent) -> Result<()> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);

	client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(event)
		.send()
		.await?
		.error_for_status()?;

	Ok(())
}
