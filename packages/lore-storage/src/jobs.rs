use sqlx::PgPool;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Result, models::IngestionJob};

const BASE_BACKOFF_MS: i64 = 1_000;
const MAX_BACKOFF_MS: i64 = 60_000;
const MAX_JOB_ERROR_CHARS: usize = 1_024;

#[derive(Clone, Debug)]
pub struct NewJob {
	pub owner_id: Uuid,
	pub owner_kind: String,
	pub requester_id: String,
	pub source_url: String,
}

pub async fn enqueue(pool: &PgPool, job: &NewJob) -> Result<Uuid> {
	let job_id = Uuid::new_v4();
	let now = OffsetDateTime::now_utc();

	sqlx::query(
		"\
INSERT INTO ingestion_jobs (
	job_id,
	owner_id,
	owner_kind,
	requester_id,
	source_url,
	status,
	attempts,
	available_at,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, 'PENDING', 0, $6, $6, $6)",
	)
	.bind(job_id)
	.bind(job.owner_id)
	.bind(job.owner_kind.as_str())
	.bind(job.requester_id.as_str())
	.bind(job.source_url.as_str())
	.bind(now)
	.execute(pool)
	.await?;

	Ok(job_id)
}

/// Claims the next runnable job and leases it for `lease_seconds`.
///
/// A job is runnable when it is PENDING or FAILED (with backoff elapsed and
/// attempts below the cap), or RUNNING with an expired lease (a worker
/// died). Owners with a live RUNNING job are skipped entirely, which is
/// what serializes ingestion runs per owner.
pub async fn claim_next(
	pool: &PgPool,
	now: OffsetDateTime,
	lease_seconds: i64,
	max_attempts: i32,
) -> Result<Option<IngestionJob>> {
	let mut tx = pool.begin().await?;
	let row: Option<IngestionJob> = sqlx::query_as(
		"\
SELECT j.*
FROM ingestion_jobs j
WHERE ((j.status IN ('PENDING', 'FAILED') AND j.attempts < $2)
		OR (j.status = 'RUNNING' AND j.available_at <= $1))
	AND j.available_at <= $1
	AND NOT EXISTS (
		SELECT 1
		FROM ingestion_jobs running
		WHERE running.owner_id = j.owner_id
			AND running.job_id <> j.job_id
			AND running.status = 'RUNNING'
			AND running.available_at > $1
	)
ORDER BY j.available_at ASC
LIMIT 1
FOR UPDATE OF j SKIP LOCKED",
	)
	.bind(now)
	.bind(max_attempts)
	.fetch_optional(&mut *tx)
	.await?;

	let job = if let Some(mut job) = row {
		let lease_until = now + Duration::seconds(lease_seconds);

		sqlx::query(
			"UPDATE ingestion_jobs SET status = 'RUNNING', available_at = $1, updated_at = $2 \
			 WHERE job_id = $3",
		)
		.bind(lease_until)
		.bind(now)
		.bind(job.job_id)
		.execute(&mut *tx)
		.await?;

		job.status = "RUNNING".to_string();
		job.available_at = lease_until;
		job.updated_at = now;

		Some(job)
	} else {
		None
	};

	tx.commit().await?;

	Ok(job)
}

/// Pushes a RUNNING job's lease forward another `lease_seconds` from `now`.
/// Long runs renew periodically so a live worker is never mistaken for a
/// dead one. Returns false when the job is no longer RUNNING, meaning the
/// lease already expired and someone else may own the job.
pub async fn extend_lease(
	pool: &PgPool,
	job_id: Uuid,
	now: OffsetDateTime,
	lease_seconds: i64,
) -> Result<bool> {
	let lease_until = now + Duration::seconds(lease_seconds);
	let result = sqlx::query(
		"UPDATE ingestion_jobs SET available_at = $1, updated_at = $2 \
		 WHERE job_id = $3 AND status = 'RUNNING'",
	)
	.bind(lease_until)
	.bind(now)
	.bind(job_id)
	.execute(pool)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn mark_done(pool: &PgPool, job_id: Uuid) -> Result<()> {
	let now = OffsetDateTime::now_utc();

	sqlx::query(
		"UPDATE ingestion_jobs SET status = 'DONE', last_error = NULL, updated_at = $1 \
		 WHERE job_id = $2",
	)
	.bind(now)
	.bind(job_id)
	.execute(pool)
	.await?;

	Ok(())
}

pub async fn mark_failed(pool: &PgPool, job_id: Uuid, attempts: i32, error: &str) -> Result<()> {
	let next_attempts = attempts.saturating_add(1);
	let now = OffsetDateTime::now_utc();
	let available_at = now + backoff_for_attempt(next_attempts);
	let error_text = sanitize_job_error(error);

	sqlx::query(
		"\
UPDATE ingestion_jobs
SET status = 'FAILED',
	attempts = $1,
	last_error = $2,
	available_at = $3,
	updated_at = $4
WHERE job_id = $5",
	)
	.bind(next_attempts)
	.bind(error_text)
	.bind(available_at)
	.bind(now)
	.bind(job_id)
	.execute(pool)
	.await?;

	Ok(())
}

pub fn backoff_for_attempt(attempt: i32) -> Duration {
	let attempts = attempt.max(1) as u32;
	let exp = attempts.saturating_sub(1).min(6);
	let base = BASE_BACKOFF_MS.saturating_mul(1 << exp);

	Duration::milliseconds(base.min(MAX_BACKOFF_MS))
}

/// Strips credential-looking values from an error before it lands in a
/// queryable column, and caps the length.
pub fn sanitize_job_error(text: &str) -> String {
	let mut parts = Vec::new();
	let mut redact_next = false;

	for raw in text.split_whitespace() {
		if redact_next {
			parts.push("[REDACTED]".to_string());

			redact_next = false;

			continue;
		}
		if raw.eq_ignore_ascii_case("bearer") {
			redact_next = true;

			parts.push(raw.to_string());

			continue;
		}

		let lowered = raw.to_ascii_lowercase();
		let secret_assignment = ["api_key", "apikey", "password", "secret", "token"]
			.iter()
			.any(|key| lowered.contains(key))
			&& (raw.contains('=') || raw.contains(':'));

		if secret_assignment {
			let sep = if raw.contains('=') { '=' } else { ':' };
			let prefix = raw.split(sep).next().unwrap_or(raw);

			parts.push(format!("{prefix}{sep}[REDACTED]"));
		} else {
			parts.push(raw.to_string());
		}
	}

	let mut out = parts.join(" ");

	if out.chars().count() > MAX_JOB_ERROR_CHARS {
		out = out.chars().take(MAX_JOB_ERROR_CHARS).collect();
		out.push_str("...");
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_doubles_and_caps() {
		assert_eq!(backoff_for_attempt(1), Duration::milliseconds(1_000));
		assert_eq!(backoff_for_attempt(2), Duration::milliseconds(2_000));
		assert_eq!(backoff_for_attempt(3), Duration::milliseconds(4_000));
		assert_eq!(backoff_for_attempt(20), Duration::milliseconds(60_000));
		assert_eq!(backoff_for_attempt(0), Duration::milliseconds(1_000));
	}

	#[test]
	fn sanitize_redacts_secret_assignments() {
		let sanitized = sanitize_job_error("request failed api_key=sk-123 status=500");

		assert!(sanitized.contains("api_key=[REDACTED]"));
		assert!(sanitized.contains("status=500"));
	}

	#[test]
	fn sanitize_redacts_bearer_values() {
		let sanitized = sanitize_job_error("Authorization: Bearer sk-live-secret failed");

		assert!(!sanitized.contains("sk-live-secret"));
		assert!(sanitized.contains("[REDACTED]"));
	}

	#[test]
	fn sanitize_caps_length() {
		let long = "x".repeat(5_000);
		let sanitized = sanitize_job_error(&long);

		assert!(sanitized.chars().count() <= MAX_JOB_ERROR_CHARS + 3);
		assert!(sanitized.ends_with("..."));
	}
}
