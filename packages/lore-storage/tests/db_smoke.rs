use std::str::FromStr;

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use lore_domain::OwnerKind;
use lore_storage::{
	db::Db,
	jobs::{self, NewJob},
	models::UploadedFile,
	owners,
};

async fn test_db() -> Option<lore_testkit::TestDatabase> {
	let dsn = lore_testkit::env_dsn()?;

	Some(lore_testkit::TestDatabase::new(&dsn).await.expect("Failed to create test database."))
}

async fn connect(dsn: &str) -> Db {
	let cfg = lore_config::Postgres { dsn: dsn.to_string(), pool_max_conns: 4 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to test database.");

	db.ensure_schema().await.expect("Failed to apply schema.");

	db
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set LORE_PG_DSN to run."]
async fn owner_status_and_uploaded_files_round_trip() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping owner_status_and_uploaded_files_round_trip; set LORE_PG_DSN to run.");

		return;
	};
	let db = connect(test_db.dsn()).await;
	let owner_id = Uuid::new_v4();

	owners::insert_owner(&db.pool, OwnerKind::Brand, owner_id, "Acme", Some("https://acme.test"))
		.await
		.expect("Failed to insert owner.");

	let fetched = owners::fetch_owner(&db.pool, OwnerKind::Brand, owner_id)
		.await
		.expect("Failed to fetch owner.")
		.expect("Owner missing after insert.");

	assert_eq!(fetched.ingestion_status, "pending");
	assert_eq!(fetched.uploaded_files, serde_json::json!([]));

	let touched = owners::set_ingestion_status(
		&db.pool,
		OwnerKind::Brand,
		owner_id,
		"analyzing",
		None,
	)
	.await
	.expect("Failed to set status.");

	assert_eq!(touched, 1);

	let files = vec![UploadedFile {
		file_name: "brand-doc-1-identity-profile.md".to_string(),
		file_url: "https://blobs.test/brand-doc-1-identity-profile.md".to_string(),
		uploaded_at: "2026-01-01T00:00:00Z".to_string(),
	}];

	owners::set_uploaded_files(&db.pool, OwnerKind::Brand, owner_id, &files)
		.await
		.expect("Failed to set uploaded files.");

	let fetched = owners::fetch_owner(&db.pool, OwnerKind::Brand, owner_id)
		.await
		.expect("Failed to fetch owner.")
		.expect("Owner missing.");

	assert_eq!(fetched.ingestion_status, "analyzing");
	assert_eq!(fetched.uploaded_files[0]["file_name"], "brand-doc-1-identity-profile.md");

	// A missing owner reports zero rows, not an error.
	let touched =
		owners::set_ingestion_status(&db.pool, OwnerKind::Brand, Uuid::new_v4(), "failed", None)
			.await
			.expect("Failed to run status update.");

	assert_eq!(touched, 0);

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set LORE_PG_DSN to run."]
async fn job_claims_serialize_per_owner() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping job_claims_serialize_per_owner; set LORE_PG_DSN to run.");

		return;
	};
	let db = connect(test_db.dsn()).await;
	let owner_id = Uuid::new_v4();
	let job = NewJob {
		owner_id,
		owner_kind: OwnerKind::Competitor.as_str().to_string(),
		requester_id: "user-1".to_string(),
		source_url: "https://rival.test".to_string(),
	};
	let first_id = jobs::enqueue(&db.pool, &job).await.expect("Failed to enqueue.");
	let _second_id = jobs::enqueue(&db.pool, &job).await.expect("Failed to enqueue.");
	let now = OffsetDateTime::now_utc();
	let claimed = jobs::claim_next(&db.pool, now, 60, 3)
		.await
		.expect("Failed to claim.")
		.expect("Expected a claimable job.");

	assert_eq!(claimed.job_id, first_id);
	assert_eq!(claimed.status, "RUNNING");

	// The second job targets the same owner and must wait for the first.
	let blocked = jobs::claim_next(&db.pool, now, 60, 3).await.expect("Failed to claim.");

	assert!(blocked.is_none());

	jobs::mark_failed(&db.pool, claimed.job_id, claimed.attempts, "boom api_key=sk-1")
		.await
		.expect("Failed to mark failed.");

	let failed: lore_storage::models::IngestionJob =
		sqlx::query_as("SELECT * FROM ingestion_jobs WHERE job_id = $1")
			.bind(claimed.job_id)
			.fetch_one(&db.pool)
			.await
			.expect("Failed to reload job.");

	assert_eq!(failed.status, "FAILED");
	assert_eq!(failed.attempts, 1);
	assert!(failed.last_error.as_deref().unwrap_or_default().contains("api_key=[REDACTED]"));

	// Failed jobs back off; claiming far enough in the future picks one up.
	let later = OffsetDateTime::now_utc() + Duration::seconds(120);
	let reclaimed = jobs::claim_next(&db.pool, later, 60, 3)
		.await
		.expect("Failed to claim.")
		.expect("Expected a claimable job after backoff.");

	assert_eq!(reclaimed.owner_id, owner_id);

	jobs::mark_done(&db.pool, reclaimed.job_id).await.expect("Failed to mark done.");

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set LORE_PG_DSN to run."]
async fn lease_renewal_defers_reclaim() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping lease_renewal_defers_reclaim; set LORE_PG_DSN to run.");

		return;
	};
	let db = connect(test_db.dsn()).await;
	let job = NewJob {
		owner_id: Uuid::new_v4(),
		owner_kind: OwnerKind::Brand.as_str().to_string(),
		requester_id: "user-1".to_string(),
		source_url: "https://acme.test".to_string(),
	};

	jobs::enqueue(&db.pool, &job).await.expect("Failed to enqueue.");

	let start = OffsetDateTime::now_utc();
	let claimed = jobs::claim_next(&db.pool, start, 60, 3)
		.await
		.expect("Failed to claim.")
		.expect("Expected a claimable job.");

	// A renewal inside the lease window pushes the expiry past the point
	// where the original lease would have lapsed.
	let renewed =
		jobs::extend_lease(&db.pool, claimed.job_id, start + Duration::seconds(50), 60)
			.await
			.expect("Failed to extend lease.");

	assert!(renewed);

	let reclaimed = jobs::claim_next(&db.pool, start + Duration::seconds(90), 60, 3)
		.await
		.expect("Failed to claim.");

	assert!(reclaimed.is_none(), "A renewed lease must not be reclaimed.");

	// Once renewals stop, the lease lapses and the job becomes claimable.
	let reclaimed = jobs::claim_next(&db.pool, start + Duration::seconds(200), 60, 3)
		.await
		.expect("Failed to claim.")
		.expect("Expected the expired lease to be reclaimed.");

	assert_eq!(reclaimed.job_id, claimed.job_id);

	jobs::mark_done(&db.pool, reclaimed.job_id).await.expect("Failed to mark done.");

	// Renewal only applies to RUNNING jobs.
	let renewed = jobs::extend_lease(&db.pool, reclaimed.job_id, OffsetDateTime::now_utc(), 60)
		.await
		.expect("Failed to run lease extension.");

	assert!(!renewed);

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set LORE_PG_DSN to run."]
async fn deleted_owners_stop_accepting_status_writes() {
	let Some(dsn) = lore_testkit::env_dsn() else {
		eprintln!("Skipping deleted_owners_stop_accepting_status_writes; set LORE_PG_DSN to run.");

		return;
	};
	let outcome = lore_testkit::with_test_db(&dsn, |test_db| {
		let dsn = test_db.dsn().to_string();

		async move {
			let db = connect(&dsn).await;
			let owner_id = Uuid::new_v4();

			owners::insert_owner(&db.pool, OwnerKind::Competitor, owner_id, "Rival", None)
				.await
				.expect("Failed to insert owner.");

			let removed = owners::delete_owner(&db.pool, OwnerKind::Competitor, owner_id)
				.await
				.expect("Failed to delete owner.");

			assert_eq!(removed, 1);
			assert!(
				owners::fetch_owner(&db.pool, OwnerKind::Competitor, owner_id)
					.await
					.expect("Failed to fetch owner.")
					.is_none()
			);

			let touched = owners::set_ingestion_status(
				&db.pool,
				OwnerKind::Competitor,
				owner_id,
				"analyzing",
				None,
			)
			.await
			.expect("Failed to run status update.");

			assert_eq!(touched, 0);

			db.pool.close().await;

			Ok(())
		}
	})
	.await;

	outcome.expect("Test database run failed.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set LORE_PG_DSN to run."]
async fn exhausted_jobs_are_not_reclaimed() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping exhausted_jobs_are_not_reclaimed; set LORE_PG_DSN to run.");

		return;
	};
	let db = connect(test_db.dsn()).await;
	let job = NewJob {
		owner_id: Uuid::new_v4(),
		owner_kind: OwnerKind::Brand.as_str().to_string(),
		requester_id: "user-1".to_string(),
		source_url: "https://acme.test".to_string(),
	};

	jobs::enqueue(&db.pool, &job).await.expect("Failed to enqueue.");

	let max_attempts = 2;

	for _ in 0..max_attempts {
		let later = OffsetDateTime::now_utc() + Duration::seconds(600);
		let claimed = jobs::claim_next(&db.pool, later, 60, max_attempts)
			.await
			.expect("Failed to claim.")
			.expect("Expected a claimable job.");

		jobs::mark_failed(&db.pool, claimed.job_id, claimed.attempts, "unreachable host")
			.await
			.expect("Failed to mark failed.");
	}

	let later = OffsetDateTime::now_utc() + Duration::seconds(3_600);
	let claimed = jobs::claim_next(&db.pool, later, 60, max_attempts).await.expect("Failed to claim.");

	assert!(claimed.is_none());

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set LORE_PG_DSN to run."]
async fn owner_kind_on_job_rows_parses() {
	let Some(test_db) = test_db().await else {
		eprintln!("Skipping owner_kind_on_job_rows_parses; set LORE_PG_DSN to run.");

		return;
	};
	let db = connect(test_db.dsn()).await;
	let job = NewJob {
		owner_id: Uuid::new_v4(),
		owner_kind: OwnerKind::Competitor.as_str().to_string(),
		requester_id: "user-2".to_string(),
		source_url: "https://rival.test".to_string(),
	};

	jobs::enqueue(&db.pool, &job).await.expect("Failed to enqueue.");

	let claimed = jobs::claim_next(&db.pool, OffsetDateTime::now_utc(), 60, 3)
		.await
		.expect("Failed to claim.")
		.expect("Expected a claimable job.");
	let kind = OwnerKind::from_str(&claimed.owner_kind).expect("Stored owner kind must parse.");

	assert_eq!(kind, OwnerKind::Competitor);

	jobs::mark_done(&db.pool, claimed.job_id).await.expect("Failed to mark done.");

	db.pool.close().await;
	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
