use std::str::FromStr;

use tracing::{info, warn};
use uuid::Uuid;

use lore_domain::{IngestionStatus, OwnerKind};
use lore_storage::owners;

use crate::LoreService;

/// One status change as seen by live observers.
#[derive(Clone, Debug)]
pub struct StatusEvent {
	pub owner_id: Uuid,
	pub owner_kind: OwnerKind,
	pub status: IngestionStatus,
	pub message: Option<String>,
}

/// Fan-out seam for status changes. The worker uses the log publisher; an
/// API front end can swap in one that pushes to connected clients.
pub trait StatusPublisher
where
	Self: Send + Sync,
{
	fn publish(&self, event: &StatusEvent);
}

pub struct LogStatusPublisher;

impl StatusPublisher for LogStatusPublisher {
	fn publish(&self, event: &StatusEvent) {
		info!(
			owner_id = %event.owner_id,
			owner_kind = event.owner_kind.as_str(),
			status = event.status.as_str(),
			message = event.message.as_deref().unwrap_or_default(),
			"Ingestion status changed.",
		);
	}
}

impl LoreService {
	/// Moves the owner's status column through the ingestion state machine
	/// and publishes the change.
	///
	/// Illegal transitions are rejected. A vanished owner row or a failed
	/// write is logged, not fatal: status is advisory state for readers and
	/// must never abort the pipeline itself. The publish still fires so
	/// observers see what the run attempted.
	pub async fn track_status(
		&self,
		kind: OwnerKind,
		owner_id: Uuid,
		next: IngestionStatus,
		message: Option<&str>,
	) -> bool {
		if let Some(current) = self.current_status(kind, owner_id).await
			&& !current.can_transition(next)
		{
			warn!(
				owner_id = %owner_id,
				from = current.as_str(),
				to = next.as_str(),
				"Skipping illegal ingestion status transition.",
			);

			return false;
		}

		let recorded = match owners::set_ingestion_status(
			&self.db.pool,
			kind,
			owner_id,
			next.as_str(),
			message,
		)
		.await
		{
			Ok(0) => {
				warn!(owner_id = %owner_id, status = next.as_str(), "Owner row missing; status not recorded.");

				false
			},
			Ok(_) => true,
			Err(err) => {
				warn!(owner_id = %owner_id, status = next.as_str(), error = %err, "Failed to record ingestion status.");

				false
			},
		};

		self.status.publish(&StatusEvent {
			owner_id,
			owner_kind: kind,
			status: next,
			message: message.map(str::to_string),
		});

		recorded
	}

	async fn current_status(&self, kind: OwnerKind, owner_id: Uuid) -> Option<IngestionStatus> {
		let record = owners::fetch_owner(&self.db.pool, kind, owner_id).await.ok()??;

		IngestionStatus::from_str(&record.ingestion_status).ok()
	}
}
