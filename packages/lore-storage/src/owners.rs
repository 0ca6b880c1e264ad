use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use lore_domain::OwnerKind;

use crate::{
	Result,
	models::{OwnerRecord, UploadedFile},
};

/// Table routing for the two owner kinds. Static names only; they are
/// interpolated into SQL.
pub fn table_for(kind: OwnerKind) -> &'static str {
	match kind {
		OwnerKind::Brand => "brand_agents",
		OwnerKind::Competitor => "competitors",
	}
}

pub async fn fetch_owner(
	pool: &PgPool,
	kind: OwnerKind,
	owner_id: Uuid,
) -> Result<Option<OwnerRecord>> {
	let sql = format!("SELECT * FROM {} WHERE owner_id = $1", table_for(kind));
	let owner = sqlx::query_as(&sql).bind(owner_id).fetch_optional(pool).await?;

	Ok(owner)
}

pub async fn insert_owner(
	pool: &PgPool,
	kind: OwnerKind,
	owner_id: Uuid,
	display_name: &str,
	website_url: Option<&str>,
) -> Result<()> {
	let sql = format!(
		"INSERT INTO {} (owner_id, display_name, website_url) VALUES ($1, $2, $3)",
		table_for(kind)
	);

	sqlx::query(&sql).bind(owner_id).bind(display_name).bind(website_url).execute(pool).await?;

	Ok(())
}

pub async fn delete_owner(pool: &PgPool, kind: OwnerKind, owner_id: Uuid) -> Result<u64> {
	let sql = format!("DELETE FROM {} WHERE owner_id = $1", table_for(kind));
	let result = sqlx::query(&sql).bind(owner_id).execute(pool).await?;

	Ok(result.rows_affected())
}

/// Flips the owner's ingestion status column. Returns the number of rows
/// touched so callers can tell a missing owner apart from a write.
pub async fn set_ingestion_status(
	pool: &PgPool,
	kind: OwnerKind,
	owner_id: Uuid,
	status: &str,
	message: Option<&str>,
) -> Result<u64> {
	let sql = format!(
		"UPDATE {} SET ingestion_status = $1, status_message = $2, updated_at = $3 \
		 WHERE owner_id = $4",
		table_for(kind)
	);
	let result = sqlx::query(&sql)
		.bind(status)
		.bind(message)
		.bind(OffsetDateTime::now_utc())
		.bind(owner_id)
		.execute(pool)
		.await?;

	Ok(result.rows_affected())
}

/// Replaces the owner's uploaded-file metadata wholesale. Re-indexing is a
/// full overwrite, so the previous run's entries are dropped, not merged.
pub async fn set_uploaded_files(
	pool: &PgPool,
	kind: OwnerKind,
	owner_id: Uuid,
	files: &[UploadedFile],
) -> Result<u64> {
	let payload = serde_json::to_value(files)?;
	let sql = format!(
		"UPDATE {} SET uploaded_files = $1, updated_at = $2 WHERE owner_id = $3",
		table_for(kind)
	);
	let result = sqlx::query(&sql)
		.bind(payload)
		.bind(OffsetDateTime::now_utc())
		.bind(owner_id)
		.execute(pool)
		.await?;

	Ok(result.rows_affected())
}
