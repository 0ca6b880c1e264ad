use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

/// One row in `brand_agents` or `competitors`; the owner kind picks the
/// table, the shapes are identical.
#[derive(Debug, sqlx::FromRow)]
pub struct OwnerRecord {
	pub owner_id: Uuid,
	pub display_name: String,
	pub website_url: Option<String>,
	pub ingestion_status: String,
	pub status_message: Option<String>,
	pub uploaded_files: Value,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

/// Lightweight metadata for one uploaded document; the raw content lives in
/// blob storage only. `uploaded_at` is an RFC 3339 string so the JSONB
/// round-trip stays format-stable.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct UploadedFile {
	pub file_name: String,
	pub file_url: String,
	pub uploaded_at: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct IngestionJob {
	pub job_id: Uuid,
	pub owner_id: Uuid,
	pub owner_kind: String,
	pub requester_id: String,
	pub source_url: String,
	pub status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
