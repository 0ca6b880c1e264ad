/// Idempotent DDL for the relational side: the two owner tables (status +
/// uploaded-file metadata live on the owner row) and the ingestion job
/// queue. Vectors live in Qdrant, not Postgres.
pub const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS brand_agents (
	owner_id UUID PRIMARY KEY,
	display_name TEXT NOT NULL DEFAULT '',
	website_url TEXT,
	ingestion_status TEXT NOT NULL DEFAULT 'pending',
	status_message TEXT,
	uploaded_files JSONB NOT NULL DEFAULT '[]',
	created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS competitors (
	owner_id UUID PRIMARY KEY,
	display_name TEXT NOT NULL DEFAULT '',
	website_url TEXT,
	ingestion_status TEXT NOT NULL DEFAULT 'pending',
	status_message TEXT,
	uploaded_files JSONB NOT NULL DEFAULT '[]',
	created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS ingestion_jobs (
	job_id UUID PRIMARY KEY,
	owner_id UUID NOT NULL,
	owner_kind TEXT NOT NULL,
	requester_id TEXT NOT NULL,
	source_url TEXT NOT NULL,
	status TEXT NOT NULL DEFAULT 'PENDING',
	attempts INTEGER NOT NULL DEFAULT 0,
	last_error TEXT,
	available_at TIMESTAMPTZ NOT NULL,
	created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
	updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX IF NOT EXISTS idx_ingestion_jobs_claim
	ON ingestion_jobs (status, available_at);

CREATE INDEX IF NOT EXISTS idx_ingestion_jobs_owner
	ON ingestion_jobs (owner_id, status)";
