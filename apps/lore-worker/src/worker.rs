use std::{str::FromStr, time::Duration};

use time::OffsetDateTime;
use tokio::{sync::watch, time as tokio_time};
use tracing::{error, info, warn};
use uuid::Uuid;

use lore_domain::{KnowledgeKind, OwnerKind};
use lore_service::{IngestRequest, LoreService};
use lore_storage::{jobs, models::IngestionJob, owners};

use crate::{Error, Result};

pub async fn run_worker(service: LoreService) -> color_eyre::Result<()> {
	let poll_interval = Duration::from_millis(service.cfg.ingestion.poll_interval_ms);

	info!("Ingestion worker started.");

	loop {
		match next_job(&service).await {
			Ok(Some(job)) => {
				process_job(&service, job).await;

				// Immediately look for more work while the queue is hot.
				continue;
			},
			Ok(None) => {},
			Err(err) => {
				error!(error = %err, "Failed to claim an ingestion job.");
			},
		}

		tokio_time::sleep(poll_interval).await;
	}
}

async fn next_job(service: &LoreService) -> Result<Option<IngestionJob>> {
	let job = jobs::claim_next(
		&service.db.pool,
		OffsetDateTime::now_utc(),
		service.cfg.ingestion.claim_lease_seconds,
		service.cfg.ingestion.max_attempts,
	)
	.await?;

	Ok(job)
}

async fn process_job(service: &LoreService, job: IngestionJob) {
	info!(job_id = %job.job_id, owner_id = %job.owner_id, attempts = job.attempts, "Processing ingestion job.");

	match run_job(service, &job).await {
		Ok(chunk_count) => {
			info!(job_id = %job.job_id, chunk_count, "Ingestion job completed.");

			if let Err(err) = jobs::mark_done(&service.db.pool, job.job_id).await {
				error!(job_id = %job.job_id, error = %err, "Failed to mark job done.");
			}
		},
		Err(err) => {
			warn!(job_id = %job.job_id, error = %err, "Ingestion job failed.");

			if let Err(err) =
				jobs::mark_failed(&service.db.pool, job.job_id, job.attempts, &err.to_string())
					.await
			{
				error!(job_id = %job.job_id, error = %err, "Failed to mark job failed.");
			}
		},
	}
}

async fn run_job(service: &LoreService, job: &IngestionJob) -> Result<usize> {
	let kind = OwnerKind::from_str(&job.owner_kind)?;
	let owner = owners::fetch_owner(&service.db.pool, kind, job.owner_id).await?;

	if owner.is_none() {
		return Err(Error::Message(format!(
			"Owner {} no longer exists; dropping job.",
			job.owner_id
		)));
	}

	// Re-runs replace: prior knowledge for this owner is dropped up front so
	// a changed source cannot leave stale chunks behind.
	let removed = service
		.delete_by_owner_and_kind(kind, job.owner_id, KnowledgeKind::Document)
		.await?;

	if removed > 0 {
		info!(owner_id = %job.owner_id, removed, "Removed prior knowledge records before re-indexing.");
	}

	let (cancel_tx, cancel_rx) = watch::channel(false);
	let watcher = tokio::spawn(owner_watcher(
		service.db.pool.clone(),
		kind,
		job.owner_id,
		Duration::from_millis(service.cfg.ingestion.poll_interval_ms),
		cancel_tx,
	));
	let heartbeat = tokio::spawn(lease_heartbeat(
		service.db.pool.clone(),
		job.job_id,
		service.cfg.ingestion.claim_lease_seconds,
	));
	let request = IngestRequest {
		owner_id: job.owner_id,
		owner_kind: kind,
		requester_id: job.requester_id.clone(),
		source_url: job.source_url.clone(),
	};
	let result = service.run_ingestion(&request, &cancel_rx).await;

	watcher.abort();
	heartbeat.abort();

	Ok(result?.chunk_count)
}

/// Renews the claim lease while a run is in flight. A run can legitimately
/// outlast one lease window, and without renewal another worker would
/// reclaim the job mid-run and interleave same-owner writes.
async fn lease_heartbeat(pool: sqlx::PgPool, job_id: Uuid, lease_seconds: i64) {
	let interval = Duration::from_secs(lease_seconds.max(2) as u64 / 2);

	loop {
		tokio_time::sleep(interval).await;

		match jobs::extend_lease(&pool, job_id, OffsetDateTime::now_utc(), lease_seconds).await {
			Ok(true) => {},
			Ok(false) => {
				warn!(job_id = %job_id, "Job is no longer RUNNING; stopping lease renewal.");

				return;
			},
			Err(err) => {
				warn!(job_id = %job_id, error = %err, "Failed to renew the job lease.");
			},
		}
	}
}

/// Trips the cancel flag if the owner row disappears mid-run, so a deleted
/// brand or competitor stops costing provider calls.
async fn owner_watcher(
	pool: sqlx::PgPool,
	kind: OwnerKind,
	owner_id: Uuid,
	interval: Duration,
	cancel: watch::Sender<bool>,
) {
	loop {
		tokio_time::sleep(interval).await;

		match owners::fetch_owner(&pool, kind, owner_id).await {
			Ok(Some(_)) => {},
			Ok(None) => {
				warn!(owner_id = %owner_id, "Owner deleted mid-run; cancelling ingestion.");

				let _ = cancel.send(true);

				return;
			},
			Err(err) => {
				warn!(owner_id = %owner_id, error = %err, "Owner existence check failed.");
			},
		}
	}
}
