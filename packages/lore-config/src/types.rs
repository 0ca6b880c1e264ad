use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub chunking: Chunking,
	pub ingestion: Ingestion,
	pub retrieval: Retrieval,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub brand_collection: String,
	pub competitor_collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub generator: GeneratorProviderConfig,
	pub crawler: CrawlerProviderConfig,
	pub blob: BlobProviderConfig,
	pub billing: BillingProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlobProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub bucket: String,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BillingProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chunking {
	pub max_words: u32,
	pub overlap_words: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ingestion {
	/// Number of typed documents the generator must return per run.
	pub document_count: u32,
	/// Deadline applied to every external stage of the pipeline.
	pub stage_timeout_ms: u64,
	pub poll_interval_ms: u64,
	pub claim_lease_seconds: i64,
	pub max_attempts: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	pub brand_limit: u32,
	pub brand_similarity_threshold: f32,
	pub competitor_limit: u32,
	pub competitor_similarity_threshold: f32,
}
