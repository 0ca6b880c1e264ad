pub mod ingest;
pub mod knowledge;
pub mod retrieval;
pub mod status;
pub mod synthesis;
pub mod target;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

pub use ingest::{CancelToken, IngestReport, IngestRequest};
pub use knowledge::{NewKnowledgeRecord, SearchOptions, SearchResult};
pub use retrieval::RetrievalQuery;
pub use status::{LogStatusPublisher, StatusEvent, StatusPublisher};
pub use synthesis::GeneratedDocument;
pub use target::KnowledgeTarget;

use lore_config::{
	BlobProviderConfig, Config, CrawlerProviderConfig, EmbeddingProviderConfig,
	GeneratorProviderConfig,
};
use lore_providers::{TokenUsage, billing::UsageEvent, blob, crawler, embedding, generator};
use lore_storage::{db::Db, qdrant::KnowledgeStore};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<(Vec<Vec<f32>>, TokenUsage)>>;
}

pub trait GeneratorProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a GeneratorProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<(String, TokenUsage)>>;
}

pub trait CrawlerProvider
where
	Self: Send + Sync,
{
	fn fetch<'a>(
		&'a self,
		cfg: &'a CrawlerProviderConfig,
		source_url: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait BlobProvider
where
	Self: Send + Sync,
{
	fn upload<'a>(
		&'a self,
		cfg: &'a BlobProviderConfig,
		key: &'a str,
		bytes: &'a [u8],
		content_type: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

#[derive(Debug)]
pub enum ServiceError {
	InvalidRequest { message: String },
	Validation { message: String },
	Provider { message: String },
	Storage { message: String },
	Qdrant { message: String },
	Timeout { stage: String },
	Cancelled,
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub generator: Arc<dyn GeneratorProvider>,
	pub crawler: Arc<dyn CrawlerProvider>,
	pub blob: Arc<dyn BlobProvider>,
}

pub struct LoreService {
	pub cfg: Config,
	pub db: Db,
	pub store: KnowledgeStore,
	pub providers: Providers,
	pub status: Arc<dyn StatusPublisher>,
	/// Usage events drain through here to the billing provider. `None`
	/// disables metering entirely.
	pub billing: Option<mpsc::Sender<UsageEvent>>,
}

struct DefaultProviders;

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::Validation { message } => write!(f, "Validation error: {message}"),
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::Storage { message } => write!(f, "Storage error: {message}"),
			Self::Qdrant { message } => write!(f, "Qdrant error: {message}"),
			Self::Timeout { stage } => write!(f, "Stage {stage} timed out."),
			Self::Cancelled => write!(f, "Ingestion run was cancelled."),
		}
	}
}

impl std::error::Error for ServiceError {}

impl From<sqlx::Error> for ServiceError {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<lore_storage::Error> for ServiceError {
	fn from(err: lore_storage::Error) -> Self {
		match err {
			lore_storage::Error::Qdrant(inner) => Self::Qdrant { message: inner.to_string() },
			other => Self::Storage { message: other.to_string() },
		}
	}
}

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<(Vec<Vec<f32>>, TokenUsage)>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl GeneratorProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a GeneratorProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<(String, TokenUsage)>> {
		Box::pin(generator::complete(cfg, messages))
	}
}

impl CrawlerProvider for DefaultProviders {
	fn fetch<'a>(
		&'a self,
		cfg: &'a CrawlerProviderConfig,
		source_url: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(crawler::fetch(cfg, source_url))
	}
}

impl BlobProvider for DefaultProviders {
	fn upload<'a>(
		&'a self,
		cfg: &'a BlobProviderConfig,
		key: &'a str,
		bytes: &'a [u8],
		content_type: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(blob::upload(cfg, key, bytes, content_type))
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		generator: Arc<dyn GeneratorProvider>,
		crawler: Arc<dyn CrawlerProvider>,
		blob: Arc<dyn BlobProvider>,
	) -> Self {
		Self { embedding, generator, crawler, blob }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);
		Self {
			embedding: provider.clone(),
			generator: provider.clone(),
			crawler: provider.clone(),
			blob: provider,
		}
	}
}

impl LoreService {
	pub fn new(cfg: Config, db: Db, store: KnowledgeStore) -> Self {
		Self {
			cfg,
			db,
			store,
			providers: Providers::default(),
			status: Arc::new(LogStatusPublisher),
			billing: None,
		}
	}

	pub fn with_providers(cfg: Config, db: Db, store: KnowledgeStore, providers: Providers) -> Self {
		Self {
			cfg,
			db,
			store,
			providers,
			status: Arc::new(LogStatusPublisher),
			billing: None,
		}
	}

	pub fn with_status_publisher(mut self, publisher: Arc<dyn StatusPublisher>) -> Self {
		self.status = publisher;

		self
	}

	pub fn with_billing(mut self, sender: mpsc::Sender<UsageEvent>) -> Self {
		self.billing = Some(sender);

		self
	}

	/// Best-effort usage metering. A full or closed channel drops the event
	/// with a warning; billing never blocks or fails the caller's work.
	pub(crate) fn emit_billing(&self, owner_id: uuid::Uuid, purpose: &str, usage: TokenUsage) {
		let Some(sender) = &self.billing else {
			return;
		};
		let event =
			UsageEvent { owner_id: owner_id.to_string(), purpose: purpose.to_string(), usage };

		if let Err(err) = sender.try_send(event) {
			warn!(purpose, error = %err, "Dropping billing event.");
		}
	}
}
