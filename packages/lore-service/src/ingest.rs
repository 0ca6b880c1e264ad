use std::{future::Future, time::Duration};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::{sync::watch, time::timeout};
use tracing::info;
use uuid::Uuid;

use lore_chunking::ChunkingConfig;
use lore_domain::{IngestionStatus, KnowledgeKind, OwnerKind};
use lore_storage::{models::UploadedFile, owners};

use crate::{KnowledgeTarget, LoreService, NewKnowledgeRecord, ServiceError, ServiceResult};

/// Cooperative cancellation for a running ingestion. The sender side flips
/// the flag; the pipeline checks it between stages.
pub type CancelToken = watch::Receiver<bool>;

#[derive(Clone, Debug)]
pub struct IngestRequest {
	pub owner_id: Uuid,
	pub owner_kind: OwnerKind,
	pub requester_id: String,
	pub source_url: String,
}

#[derive(Clone, Copy, Debug)]
pub struct IngestReport {
	pub chunk_count: usize,
}

impl LoreService {
	/// Runs the full pipeline for one owner: crawl, synthesize, upload,
	/// chunk, embed, store. On success the owner lands in `Completed`; any
	/// error records `Failed` (best-effort) before propagating.
	pub async fn run_ingestion(
		&self,
		request: &IngestRequest,
		cancel: &CancelToken,
	) -> ServiceResult<IngestReport> {
		let target = KnowledgeTarget::for_kind(request.owner_kind);

		match self.run_pipeline(&target, request, cancel).await {
			Ok(report) => {
				self.track_status(
					target.kind,
					request.owner_id,
					IngestionStatus::Completed,
					Some(&completion_message(report.chunk_count)),
				)
				.await;

				Ok(report)
			},
			Err(err) => {
				self.track_status(
					target.kind,
					request.owner_id,
					IngestionStatus::Failed,
					Some(&err.to_string()),
				)
				.await;

				Err(err)
			},
		}
	}

	async fn run_pipeline(
		&self,
		target: &KnowledgeTarget,
		request: &IngestRequest,
		cancel: &CancelToken,
	) -> ServiceResult<IngestReport> {
		let owner_id = request.owner_id;

		self.track_status(target.kind, owner_id, IngestionStatus::Analyzing, None).await;
		ensure_active(cancel)?;

		let crawled = self
			.stage("crawl", self.providers.crawler.fetch(&self.cfg.providers.crawler, &request.source_url))
			.await??;

		if crawled.trim().is_empty() {
			return Err(ServiceError::Provider {
				message: format!("Crawler returned no content for {}.", request.source_url),
			});
		}

		ensure_active(cancel)?;

		let analysis = self.stage("analysis", self.synthesize_analysis(owner_id, &crawled)).await??;

		ensure_active(cancel)?;

		let documents = self.stage("documents", self.generate_documents(owner_id, &analysis)).await??;

		self.track_status(target.kind, owner_id, IngestionStatus::Chunking, None).await;

		let chunking = ChunkingConfig {
			max_words: self.cfg.chunking.max_words,
			overlap_words: self.cfg.chunking.overlap_words,
		};
		let mut uploaded = Vec::with_capacity(documents.len());
		let mut records = Vec::new();

		for (index, document) in documents.iter().enumerate() {
			ensure_active(cancel)?;

			let key = target.storage_key(owner_id, index, document.doc_type);
			let file_url = self
				.stage(
					"upload",
					self.providers.blob.upload(
						&self.cfg.providers.blob,
						&key,
						document.content.as_bytes(),
						"text/markdown",
					),
				)
				.await??;
			let chunks = lore_chunking::split_markdown(&document.content, &chunking);

			if chunks.is_empty() {
				return Err(ServiceError::Validation {
					message: format!("Document {key} produced no chunks."),
				});
			}

			info!(owner_id = %owner_id, key, chunks = chunks.len(), "Document uploaded and chunked.");

			uploaded.push(UploadedFile {
				file_name: file_name_of(&key),
				file_url,
				uploaded_at: now_rfc3339()?,
			});

			for chunk in chunks {
				records.push(NewKnowledgeRecord {
					owner_id,
					source_id: key.clone(),
					chunk_index: chunk.chunk_index,
					kind: KnowledgeKind::Document,
					chunk_text: chunk.text,
					website_url: Some(request.source_url.clone()),
					embedding: None,
				});
			}
		}

		// Readers resolve file URLs from the owner row, so losing this write
		// would strand the uploads. Unlike status flips it is fatal.
		owners::set_uploaded_files(&self.db.pool, target.kind, owner_id, &uploaded)
			.await
			.map_err(ServiceError::from)?;

		ensure_active(cancel)?;

		let chunk_count = records.len();

		self.stage("embedding", self.bulk_insert_with_embeddings(target.kind, records)).await??;

		Ok(IngestReport { chunk_count })
	}

	/// Clamps one external stage to the configured deadline.
	async fn stage<F, T>(&self, name: &str, fut: F) -> ServiceResult<T>
	where
		F: Future<Output = T>,
	{
		let deadline = Duration::from_millis(self.cfg.ingestion.stage_timeout_ms);

		timeout(deadline, fut)
			.await
			.map_err(|_| ServiceError::Timeout { stage: name.to_string() })
	}
}

fn ensure_active(cancel: &CancelToken) -> ServiceResult<()> {
	if *cancel.borrow() {
		return Err(ServiceError::Cancelled);
	}

	Ok(())
}

pub(crate) fn completion_message(chunk_count: usize) -> String {
	format!("Successfully processed {chunk_count} document chunks")
}

fn file_name_of(key: &str) -> String {
	key.rsplit('/').next().unwrap_or(key).to_string()
}

fn now_rfc3339() -> ServiceResult<String> {
	OffsetDateTime::now_utc().format(&Rfc3339).map_err(|_| ServiceError::InvalidRequest {
		message: "Failed to format timestamp.".to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn completion_message_counts_chunks() {
		assert_eq!(completion_message(12), "Successfully processed 12 document chunks");
	}

	#[test]
	fn file_name_strips_the_owner_prefix() {
		assert_eq!(
			file_name_of("9f1c/brand-doc-1-identity-profile.md"),
			"brand-doc-1-identity-profile.md"
		);
		assert_eq!(file_name_of("plain.md"), "plain.md");
	}

	#[test]
	fn cancellation_is_observed() {
		let (tx, rx) = watch::channel(false);

		assert!(ensure_active(&rx).is_ok());

		tx.send(true).unwrap();

		assert!(matches!(ensure_active(&rx), Err(ServiceError::Cancelled)));
	}
}
