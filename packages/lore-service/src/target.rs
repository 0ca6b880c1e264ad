use uuid::Uuid;

use lore_config::Retrieval;
use lore_domain::{DocumentType, OwnerKind, storage_key};

/// Per-kind knowledge routing, resolved once at the start of a run or a
/// lookup. Brand and competitor knowledge differ only in where documents and
/// vectors land and in retrieval defaults; everything downstream takes a
/// target instead of re-matching on the kind.
#[derive(Clone, Copy, Debug)]
pub struct KnowledgeTarget {
	pub kind: OwnerKind,
}
impl KnowledgeTarget {
	pub fn for_kind(kind: OwnerKind) -> Self {
		Self { kind }
	}

	/// Deterministic blob key for one synthesized document.
	pub fn storage_key(&self, owner_id: Uuid, index: usize, doc_type: DocumentType) -> String {
		storage_key(owner_id, self.kind, index, doc_type)
	}

	/// Brand lookups are held to the stricter threshold; competitor
	/// knowledge is noisier, so its cut-off sits lower.
	pub fn default_threshold(&self, cfg: &Retrieval) -> f32 {
		match self.kind {
			OwnerKind::Brand => cfg.brand_similarity_threshold,
			OwnerKind::Competitor => cfg.competitor_similarity_threshold,
		}
	}

	pub fn default_limit(&self, cfg: &Retrieval) -> u32 {
		match self.kind {
			OwnerKind::Brand => cfg.brand_limit,
			OwnerKind::Competitor => cfg.competitor_limit,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn retrieval() -> Retrieval {
		Retrieval {
			brand_limit: 30,
			brand_similarity_threshold: 0.7,
			competitor_limit: 30,
			competitor_similarity_threshold: 0.35,
		}
	}

	#[test]
	fn brand_defaults_are_stricter() {
		let cfg = retrieval();
		let brand = KnowledgeTarget::for_kind(OwnerKind::Brand);
		let competitor = KnowledgeTarget::for_kind(OwnerKind::Competitor);

		assert!(brand.default_threshold(&cfg) > competitor.default_threshold(&cfg));
		assert_eq!(brand.default_limit(&cfg), 30);
	}

	#[test]
	fn storage_keys_route_by_target_kind() {
		let owner_id = Uuid::new_v4();
		let brand = KnowledgeTarget::for_kind(OwnerKind::Brand);
		let competitor = KnowledgeTarget::for_kind(OwnerKind::Competitor);

		assert_eq!(
			brand.storage_key(owner_id, 0, DocumentType::Catalog),
			format!("{owner_id}/brand-doc-1-catalog.md")
		);
		assert_eq!(
			competitor.storage_key(owner_id, 2, DocumentType::MarketReport),
			format!("{owner_id}/comp-doc-3-market-report.md")
		);
	}
}
