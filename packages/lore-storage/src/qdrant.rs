use qdrant_client::qdrant::{
	Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
	DeletePointsBuilder, Distance, FieldType, Filter, PointStruct, Query, QueryPointsBuilder,
	ScoredPoint, UpsertPointsBuilder, VectorParamsBuilder,
};

use lore_domain::{KnowledgeKind, OwnerKind};

use crate::Result;

pub struct KnowledgeStore {
	pub client: qdrant_client::Qdrant,
	pub brand_collection: String,
	pub competitor_collection: String,
	pub vector_dim: u32,
}
impl KnowledgeStore {
	pub fn new(cfg: &lore_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			brand_collection: cfg.brand_collection.clone(),
			competitor_collection: cfg.competitor_collection.clone(),
			vector_dim: cfg.vector_dim,
		})
	}

	pub fn collection_for(&self, kind: OwnerKind) -> &str {
		match kind {
			OwnerKind::Brand => &self.brand_collection,
			OwnerKind::Competitor => &self.competitor_collection,
		}
	}

	/// Creates both collections and their payload indexes if absent.
	///
	/// Safe to call on every startup; existing collections are left alone.
	pub async fn ensure_collections(&self) -> Result<()> {
		for collection in [self.brand_collection.clone(), self.competitor_collection.clone()] {
			if self.client.collection_exists(&collection).await? {
				continue;
			}

			self.client
				.create_collection(CreateCollectionBuilder::new(collection.clone()).vectors_config(
					VectorParamsBuilder::new(self.vector_dim.into(), Distance::Cosine),
				))
				.await?;

			for field in ["owner_id", "kind"] {
				self.client
					.create_field_index(CreateFieldIndexCollectionBuilder::new(
						collection.clone(),
						field,
						FieldType::Keyword,
					))
					.await?;
			}
		}

		Ok(())
	}

	pub async fn upsert(&self, kind: OwnerKind, points: Vec<PointStruct>) -> Result<()> {
		if points.is_empty() {
			return Ok(());
		}

		self.client
			.upsert_points(
				UpsertPointsBuilder::new(self.collection_for(kind).to_string(), points).wait(true),
			)
			.await?;

		Ok(())
	}

	/// Removes every point an owner holds for the given knowledge kind and
	/// reports how many were removed.
	pub async fn delete_by_owner_and_kind(
		&self,
		owner_kind: OwnerKind,
		owner_id: &str,
		kind: KnowledgeKind,
	) -> Result<u64> {
		let collection = self.collection_for(owner_kind).to_string();
		let filter = Filter::must([
			Condition::matches("owner_id", owner_id.to_string()),
			Condition::matches("kind", kind.as_str().to_string()),
		]);
		let count = self
			.client
			.count(CountPointsBuilder::new(collection.clone()).filter(filter.clone()).exact(true))
			.await?
			.result
			.map(|r| r.count)
			.unwrap_or(0);

		if count > 0 {
			self.client
				.delete_points(DeletePointsBuilder::new(collection).points(filter).wait(true))
				.await?;
		}

		Ok(count)
	}

	pub async fn query(
		&self,
		owner_kind: OwnerKind,
		vector: Vec<f32>,
		filter: Filter,
		limit: u64,
	) -> Result<Vec<ScoredPoint>> {
		let response = self
			.client
			.query(
				QueryPointsBuilder::new(self.collection_for(owner_kind).to_string())
					.query(Query::new_nearest(vector))
					.filter(filter)
					.limit(limit)
					.with_payload(true),
			)
			.await?;

		Ok(response.result)
	}
}
