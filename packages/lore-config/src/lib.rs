mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	BillingProviderConfig, BlobProviderConfig, Chunking, Config, CrawlerProviderConfig,
	EmbeddingProviderConfig, GeneratorProviderConfig, Ingestion, Postgres, Providers, Qdrant,
	Retrieval, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation { message: "service.log_level must be non-empty.".to_string() });
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.brand_collection.trim().is_empty()
		|| cfg.storage.qdrant.competitor_collection.trim().is_empty()
	{
		return Err(Error::Validation {
			message: "storage.qdrant collection names must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.brand_collection == cfg.storage.qdrant.competitor_collection {
		return Err(Error::Validation {
			message: "storage.qdrant.brand_collection and competitor_collection must differ."
				.to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.chunking.max_words == 0 {
		return Err(Error::Validation {
			message: "chunking.max_words must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.overlap_words >= cfg.chunking.max_words {
		return Err(Error::Validation {
			message: "chunking.overlap_words must be less than chunking.max_words.".to_string(),
		});
	}
	if cfg.ingestion.document_count == 0 {
		return Err(Error::Validation {
			message: "ingestion.document_count must be greater than zero.".to_string(),
		});
	}
	if cfg.ingestion.stage_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "ingestion.stage_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.ingestion.claim_lease_seconds <= 0 {
		return Err(Error::Validation {
			message: "ingestion.claim_lease_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.ingestion.max_attempts <= 0 {
		return Err(Error::Validation {
			message: "ingestion.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.brand_limit == 0 || cfg.retrieval.competitor_limit == 0 {
		return Err(Error::Validation {
			message: "retrieval limits must be greater than zero.".to_string(),
		});
	}

	for (label, threshold) in [
		("retrieval.brand_similarity_threshold", cfg.retrieval.brand_similarity_threshold),
		(
			"retrieval.competitor_similarity_threshold",
			cfg.retrieval.competitor_similarity_threshold,
		),
	] {
		if !threshold.is_finite() {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number."),
			});
		}
		if !(-1.0..=1.0).contains(&threshold) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range -1.0 to 1.0."),
			});
		}
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("generator", &cfg.providers.generator.api_key),
		("crawler", &cfg.providers.crawler.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	for base in [
		&mut cfg.providers.embedding.api_base,
		&mut cfg.providers.generator.api_base,
		&mut cfg.providers.crawler.api_base,
		&mut cfg.providers.blob.api_base,
		&mut cfg.providers.billing.api_base,
	] {
		while base.ends_with('/') {
			base.pop();
		}
	}
}
