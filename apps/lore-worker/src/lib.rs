use clap::Parser;
use tokio::sync::mpsc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

pub mod worker;

mod error;

pub use error::{Error, Result};

use lore_providers::billing;
use lore_service::LoreService;
use lore_storage::{db::Db, qdrant::KnowledgeStore};

const BILLING_QUEUE_DEPTH: usize = 256;

#[derive(Debug, Parser)]
#[command(version, rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = lore_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;
	db.ensure_schema().await?;

	let store = KnowledgeStore::new(&config.storage.qdrant)?;
	store.ensure_collections().await?;

	let billing_cfg = config.providers.billing.clone();
	let (billing_tx, mut billing_rx) = mpsc::channel(BILLING_QUEUE_DEPTH);

	// Usage metering drains off the critical path; a failed ingest is logged
	// and the event dropped.
	tokio::spawn(async move {
		while let Some(event) = billing_rx.recv().await {
			if let Err(err) = billing::ingest(&billing_cfg, &event).await {
				warn!(error = %err, "Failed to ingest billing event.");
			}
		}
	});

	let service = LoreService::new(config, db, store).with_billing(billing_tx);

	worker::run_worker(service).await
}
