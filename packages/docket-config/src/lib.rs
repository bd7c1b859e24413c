mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Postgres, Providers, Qdrant, Retrieval, Search, SearchCache,
	Service, Storage, Sync,
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
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.url must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
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
	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_key must be non-empty.".to_string(),
		});
	}
	if cfg.search.default_limit == 0 {
		return Err(Error::Validation {
			message: "search.default_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.large_query_limit == 0 {
		return Err(Error::Validation {
			message: "search.large_query_limit must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("search.default_threshold", cfg.search.default_threshold),
		("search.hybrid_threshold", cfg.search.hybrid_threshold),
		("search.vector_weight", cfg.search.vector_weight),
		("search.text_weight", cfg.search.text_weight),
	] {
		if !value.is_finite() {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number."),
			});
		}
		if !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if cfg.search.vector_weight + cfg.search.text_weight <= 0.0 {
		return Err(Error::Validation {
			message: "search.vector_weight and search.text_weight must not both be zero."
				.to_string(),
		});
	}
	if cfg.search.backend_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.backend_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.search.cache.ttl_minutes <= 0 {
		return Err(Error::Validation {
			message: "search.cache.ttl_minutes must be greater than zero.".to_string(),
		});
	}
	if cfg.sync.batch_size == 0 {
		return Err(Error::Validation {
			message: "sync.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.sync.bulk_page_size == 0 {
		return Err(Error::Validation {
			message: "sync.bulk_page_size must be greater than zero.".to_string(),
		});
	}
	if cfg.sync.max_retries == 0 {
		return Err(Error::Validation {
			message: "sync.max_retries must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("sync.poll_interval_secs", cfg.sync.poll_interval_secs),
		("sync.full_sync_interval_secs", cfg.sync.full_sync_interval_secs),
		("sync.cache_sweep_interval_secs", cfg.sync.cache_sweep_interval_secs),
		("sync.metrics_interval_secs", cfg.sync.metrics_interval_secs),
	] {
		if value <= 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.retrieval.top_sources == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_sources must be greater than zero.".to_string(),
		});
	}

	for (label, value) in [
		("retrieval.min_personal_relevance", cfg.retrieval.min_personal_relevance),
		("retrieval.min_global_relevance", cfg.retrieval.min_global_relevance),
		("retrieval.min_knowledge_base_relevance", cfg.retrieval.min_knowledge_base_relevance),
		("retrieval.merge_floor", cfg.retrieval.merge_floor),
	] {
		if !value.is_finite() {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number."),
			});
		}
		if !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
}
