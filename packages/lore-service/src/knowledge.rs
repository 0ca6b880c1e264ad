use qdrant_client::{
	Payload,
	qdrant::{Condition, Filter, PointStruct, ScoredPoint},
};
use serde_json::Value;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use lore_domain::{KnowledgeKind, OwnerKind};
use lore_providers::TokenUsage;

use crate::{LoreService, ServiceError, ServiceResult};

/// One chunk headed for the vector store. The embedding is filled in by the
/// insert operations when absent.
#[derive(Clone, Debug)]
pub struct NewKnowledgeRecord {
	pub owner_id: Uuid,
	/// Stable identity of the source the chunk came from, typically the blob
	/// storage key of the synthesized document.
	pub source_id: String,
	pub chunk_index: i32,
	pub kind: KnowledgeKind,
	pub chunk_text: String,
	pub website_url: Option<String>,
	pub embedding: Option<Vec<f32>>,
}

#[derive(Clone, Copy, Debug)]
pub struct SearchOptions {
	pub limit: u32,
	/// Hits must score strictly greater than this to be returned.
	pub similarity_threshold: f32,
	pub kind: Option<KnowledgeKind>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchResult {
	pub owner_id: Uuid,
	pub source_id: String,
	pub kind: Option<KnowledgeKind>,
	pub chunk_text: String,
	pub similarity: f32,
}

impl LoreService {
	/// Embeds and stores a single record. Point identity is deterministic,
	/// so storing the same (owner, source, chunk) again overwrites.
	pub async fn insert_with_embedding(
		&self,
		owner_kind: OwnerKind,
		record: NewKnowledgeRecord,
	) -> ServiceResult<Uuid> {
		let mut ids = self.bulk_insert_with_embeddings(owner_kind, vec![record]).await?;

		ids.pop().ok_or_else(|| ServiceError::Storage {
			message: "Insert produced no point id.".to_string(),
		})
	}

	/// Embeds and stores a batch in one pass: one embedding call, one
	/// upsert. Any failure leaves the batch entirely unwritten; there are no
	/// partial inserts to clean up.
	pub async fn bulk_insert_with_embeddings(
		&self,
		owner_kind: OwnerKind,
		records: Vec<NewKnowledgeRecord>,
	) -> ServiceResult<Vec<Uuid>> {
		if records.is_empty() {
			return Ok(Vec::new());
		}

		let embedded = records.iter().filter(|record| record.embedding.is_none());
		let pending = embedded.clone().map(|record| record.chunk_text.clone()).collect::<Vec<_>>();
		let computed = if pending.is_empty() {
			Vec::new()
		} else {
			let (vectors, usage) =
				self.providers.embedding.embed(&self.cfg.providers.embedding, &pending).await?;

			for (owner_id, share) in
				usage_by_owner(embedded.map(|record| record.owner_id), usage)
			{
				self.emit_billing(owner_id, "embedding", share);
			}

			if vectors.len() != pending.len() {
				return Err(ServiceError::Validation {
					message: format!(
						"Embedding count mismatch: {} texts, {} vectors.",
						pending.len(),
						vectors.len()
					),
				});
			}

			vectors
		};
		let mut computed = computed.into_iter();
		let expected_dim = self.cfg.storage.qdrant.vector_dim as usize;
		let mut ids = Vec::with_capacity(records.len());
		let mut points = Vec::with_capacity(records.len());
		let created_at = format_timestamp(OffsetDateTime::now_utc())?;

		for record in &records {
			let vector = match &record.embedding {
				Some(vector) => vector.clone(),
				None => computed.next().ok_or_else(|| ServiceError::Validation {
					message: "Embedding batch ran out of vectors.".to_string(),
				})?,
			};

			check_dimension(vector.len(), expected_dim)?;

			let point_id = point_id_for(record.owner_id, &record.source_id, record.chunk_index);

			points.push(build_point(point_id, record, vector, &created_at));
			ids.push(point_id);
		}

		self.store.upsert(owner_kind, points).await?;

		Ok(ids)
	}

	/// Drops every stored chunk for one owner and knowledge kind. Returns
	/// the removed count.
	pub async fn delete_by_owner_and_kind(
		&self,
		owner_kind: OwnerKind,
		owner_id: Uuid,
		kind: KnowledgeKind,
	) -> ServiceResult<u64> {
		let deleted =
			self.store.delete_by_owner_and_kind(owner_kind, &owner_id.to_string(), kind).await?;

		Ok(deleted)
	}

	/// Embeds the query once and searches the kind's collection, scoped to
	/// the given owners. Results score strictly greater than the threshold,
	/// descending, at most `limit`.
	pub async fn search_by_text(
		&self,
		owner_kind: OwnerKind,
		query: &str,
		owners: &[Uuid],
		opts: SearchOptions,
	) -> ServiceResult<Vec<SearchResult>> {
		if owners.is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "Search requires at least one owner id.".to_string(),
			});
		}
		if query.trim().is_empty() {
			return Err(ServiceError::InvalidRequest {
				message: "Search query must not be empty.".to_string(),
			});
		}

		let texts = [query.to_string()];
		let (mut vectors, _usage) =
			self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;
		let vector = vectors.pop().ok_or_else(|| ServiceError::Provider {
			message: "Embedding provider returned no vector for the query.".to_string(),
		})?;

		check_dimension(vector.len(), self.cfg.storage.qdrant.vector_dim as usize)?;

		let filter = owner_filter(owners, opts.kind);
		let hits =
			self.store.query(owner_kind, vector, filter, u64::from(opts.limit)).await?;
		let results = hits.into_iter().map(result_from_point).collect();

		Ok(rank_results(results, opts.similarity_threshold, opts.limit as usize))
	}
}

/// Deterministic point identity: re-indexing the same chunk of the same
/// source for the same owner lands on the same id.
pub(crate) fn point_id_for(owner_id: Uuid, source_id: &str, chunk_index: i32) -> Uuid {
	let name = format!("{owner_id}:{source_id}:{chunk_index}");

	Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes())
}

pub(crate) fn owner_filter(owners: &[Uuid], kind: Option<KnowledgeKind>) -> Filter {
	let owner_ids = owners.iter().map(Uuid::to_string).collect::<Vec<_>>();
	let mut must = vec![Condition::matches("owner_id", owner_ids)];

	if let Some(kind) = kind {
		must.push(Condition::matches("kind", kind.as_str().to_string()));
	}

	Filter::must(must)
}

/// Threshold is exclusive: equal scores are dropped.
pub(crate) fn rank_results(
	mut results: Vec<SearchResult>,
	threshold: f32,
	limit: usize,
) -> Vec<SearchResult> {
	results.retain(|result| result.similarity > threshold);
	results.sort_by(|a, b| {
		b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal)
	});
	results.truncate(limit);

	results
}

fn build_point(
	point_id: Uuid,
	record: &NewKnowledgeRecord,
	vector: Vec<f32>,
	created_at: &str,
) -> PointStruct {
	let mut payload = Payload::new();

	payload.insert("owner_id", record.owner_id.to_string());
	payload.insert("source_id", record.source_id.clone());
	payload.insert("kind", record.kind.as_str());
	payload.insert("chunk_index", Value::from(i64::from(record.chunk_index)));
	payload.insert("chunk_text", record.chunk_text.clone());
	payload.insert(
		"website_url",
		record.website_url.clone().map(Value::String).unwrap_or(Value::Null),
	);
	payload.insert("created_at", created_at.to_string());

	PointStruct::new(point_id.to_string(), vector, payload)
}

fn result_from_point(point: ScoredPoint) -> SearchResult {
	let text_field = |name: &str| {
		point.payload.get(name).and_then(|value| value.as_str()).map(|raw| raw.to_string())
	};

	SearchResult {
		owner_id: text_field("owner_id")
			.and_then(|raw| raw.parse().ok())
			.unwrap_or(Uuid::nil()),
		source_id: text_field("source_id").unwrap_or_default(),
		kind: text_field("kind").and_then(|raw| raw.parse().ok()),
		chunk_text: text_field("chunk_text").unwrap_or_default(),
		similarity: point.score,
	}
}

/// Splits one batch's token usage across the owners whose chunks were
/// embedded, proportional to each owner's chunk count. Cumulative division
/// keeps the shares summing exactly to the reported totals.
fn usage_by_owner(
	owners: impl Iterator<Item = Uuid>,
	usage: TokenUsage,
) -> Vec<(Uuid, TokenUsage)> {
	let mut counts: Vec<(Uuid, u64)> = Vec::new();

	for owner_id in owners {
		match counts.iter_mut().find(|(id, _)| *id == owner_id) {
			Some((_, count)) => *count += 1,
			None => counts.push((owner_id, 1)),
		}
	}

	let total: u64 = counts.iter().map(|(_, count)| count).sum();

	if total == 0 {
		return Vec::new();
	}

	let mut shares = Vec::with_capacity(counts.len());
	let mut taken = 0_u64;
	let mut taken_usage = TokenUsage::default();

	for (owner_id, count) in counts {
		taken += count;

		let cumulative = TokenUsage {
			prompt_tokens: usage.prompt_tokens * taken / total,
			completion_tokens: usage.completion_tokens * taken / total,
			total_tokens: usage.total_tokens * taken / total,
		};
		let share = TokenUsage {
			prompt_tokens: cumulative.prompt_tokens - taken_usage.prompt_tokens,
			completion_tokens: cumulative.completion_tokens - taken_usage.completion_tokens,
			total_tokens: cumulative.total_tokens - taken_usage.total_tokens,
		};

		taken_usage = cumulative;

		shares.push((owner_id, share));
	}

	shares
}

fn check_dimension(got: usize, expected: usize) -> ServiceResult<()> {
	if got != expected {
		return Err(ServiceError::Validation {
			message: format!("Embedding dimension mismatch: expected {expected}, got {got}."),
		});
	}

	Ok(())
}

fn format_timestamp(ts: OffsetDateTime) -> ServiceResult<String> {
	ts.format(&Rfc3339).map_err(|_| ServiceError::InvalidRequest {
		message: "Failed to format timestamp.".to_string(),
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	fn result(similarity: f32) -> SearchResult {
		SearchResult {
			owner_id: Uuid::nil(),
			source_id: "s".to_string(),
			kind: Some(KnowledgeKind::Document),
			chunk_text: "text".to_string(),
			similarity,
		}
	}

	#[test]
	fn point_ids_are_deterministic_per_chunk() {
		let owner = Uuid::new_v4();
		let id = point_id_for(owner, "owner/brand-doc-1-catalog.md", 0);

		assert_eq!(id, point_id_for(owner, "owner/brand-doc-1-catalog.md", 0));
		assert_ne!(id, point_id_for(owner, "owner/brand-doc-1-catalog.md", 1));
		assert_ne!(id, point_id_for(Uuid::new_v4(), "owner/brand-doc-1-catalog.md", 0));
	}

	#[test]
	fn ranking_is_strictly_greater_and_descending() {
		let results = vec![result(0.70), result(0.91), result(0.85), result(0.69)];
		let ranked = rank_results(results, 0.70, 10);

		assert_eq!(
			ranked.iter().map(|r| r.similarity).collect::<Vec<_>>(),
			vec![0.91, 0.85]
		);
	}

	#[test]
	fn ranking_applies_the_limit_after_sorting() {
		let results = vec![result(0.5), result(0.9), result(0.8), result(0.7)];
		let ranked = rank_results(results, 0.0, 2);

		assert_eq!(
			ranked.iter().map(|r| r.similarity).collect::<Vec<_>>(),
			vec![0.9, 0.8]
		);
	}

	#[test]
	fn owner_filter_scopes_by_id_set_and_kind() {
		let owners = vec![Uuid::new_v4(), Uuid::new_v4()];
		let filter = owner_filter(&owners, Some(KnowledgeKind::Feature));

		assert_eq!(filter.must.len(), 2);

		let filter = owner_filter(&owners, None);

		assert_eq!(filter.must.len(), 1);
	}

	#[test]
	fn dimension_check_rejects_mismatch() {
		assert!(check_dimension(1_536, 1_536).is_ok());
		assert!(check_dimension(768, 1_536).is_err());
	}

	#[test]
	fn search_results_decode_stored_payloads() {
		let owner_id = Uuid::new_v4();
		let payload = [
			("owner_id", owner_id.to_string()),
			("source_id", "owner/brand-doc-1-catalog.md".to_string()),
			("kind", "document".to_string()),
			("chunk_text", "Espresso blends and cold brew kits.".to_string()),
		]
		.into_iter()
		.map(|(name, value)| (name.to_string(), qdrant_client::qdrant::Value::from(value)))
		.collect();
		let point = ScoredPoint { payload, score: 0.82, ..Default::default() };
		let result = result_from_point(point);

		assert_eq!(result.owner_id, owner_id);
		assert_eq!(result.source_id, "owner/brand-doc-1-catalog.md");
		assert_eq!(result.kind, Some(KnowledgeKind::Document));
		assert_eq!(result.chunk_text, "Espresso blends and cold brew kits.");
		assert_eq!(result.similarity, 0.82);
	}

	#[test]
	fn batch_usage_is_metered_per_owner() {
		let a = Uuid::new_v4();
		let b = Uuid::new_v4();
		let usage =
			TokenUsage { prompt_tokens: 10, completion_tokens: 0, total_tokens: 10 };
		let owners = [a, a, b, a].into_iter();
		let shares = usage_by_owner(owners, usage);

		assert_eq!(shares.len(), 2);
		assert_eq!(shares[0].0, a);
		assert_eq!(shares[1].0, b);
		assert!(shares[0].1.total_tokens > shares[1].1.total_tokens);
		assert_eq!(
			shares.iter().map(|(_, share)| share.total_tokens).sum::<u64>(),
			usage.total_tokens
		);
	}

	#[test]
	fn single_owner_batches_keep_the_full_usage() {
		let owner = Uuid::new_v4();
		let usage =
			TokenUsage { prompt_tokens: 7, completion_tokens: 0, total_tokens: 7 };
		let shares = usage_by_owner([owner, owner].into_iter(), usage);

		assert_eq!(shares.len(), 1);
		assert_eq!(shares[0].1.total_tokens, 7);
		assert!(usage_by_owner(std::iter::empty(), usage).is_empty());
	}
}
