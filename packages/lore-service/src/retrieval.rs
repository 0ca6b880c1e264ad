use uuid::Uuid;

use lore_domain::{KnowledgeKind, OwnerKind};

use crate::{KnowledgeTarget, LoreService, SearchOptions, SearchResult, ServiceResult};

/// Caller-facing retrieval request. Limit and threshold fall back to the
/// per-kind configured defaults when unset.
#[derive(Clone, Debug, Default)]
pub struct RetrievalQuery {
	pub keywords: Vec<String>,
	pub kind: Option<KnowledgeKind>,
	pub limit: Option<u32>,
	pub similarity_threshold: Option<f32>,
}

impl LoreService {
	/// Looks up a single brand's own knowledge, held to the stricter brand
	/// threshold.
	pub async fn brand_lookup(
		&self,
		owner_id: Uuid,
		query: RetrievalQuery,
	) -> ServiceResult<Vec<SearchResult>> {
		self.lookup(OwnerKind::Brand, &[owner_id], query).await
	}

	/// Looks up knowledge across a set of tracked competitors. The looser
	/// competitor threshold applies unless the caller overrides it.
	pub async fn competitor_lookup(
		&self,
		owner_ids: &[Uuid],
		query: RetrievalQuery,
	) -> ServiceResult<Vec<SearchResult>> {
		self.lookup(OwnerKind::Competitor, owner_ids, query).await
	}

	async fn lookup(
		&self,
		kind: OwnerKind,
		owner_ids: &[Uuid],
		query: RetrievalQuery,
	) -> ServiceResult<Vec<SearchResult>> {
		let target = KnowledgeTarget::for_kind(kind);
		let opts = SearchOptions {
			limit: query.limit.unwrap_or_else(|| target.default_limit(&self.cfg.retrieval)),
			similarity_threshold: query
				.similarity_threshold
				.unwrap_or_else(|| target.default_threshold(&self.cfg.retrieval)),
			kind: query.kind,
		};
		let text = join_keywords(&query.keywords);

		self.search_by_text(kind, &text, owner_ids, opts).await
	}
}

/// Keywords collapse into one query string; empty and whitespace-only
/// entries are dropped first.
pub(crate) fn join_keywords(keywords: &[String]) -> String {
	keywords
		.iter()
		.map(|keyword| keyword.trim())
		.filter(|keyword| !keyword.is_empty())
		.collect::<Vec<_>>()
		.join(" ")
}
