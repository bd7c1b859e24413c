use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub sync: Sync,
	#[serde(default)]
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

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Search {
	pub default_limit: u32,
	pub default_threshold: f32,
	/// Requests above this limit route to the external index even without filters.
	pub large_query_limit: u32,
	pub vector_weight: f32,
	pub text_weight: f32,
	pub hybrid_threshold: f32,
	pub backend_timeout_ms: u64,
	pub cache: SearchCache,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			default_limit: 10,
			default_threshold: 0.7,
			large_query_limit: 50,
			vector_weight: 0.7,
			text_weight: 0.3,
			hybrid_threshold: 0.6,
			backend_timeout_ms: 5_000,
			cache: SearchCache::default(),
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchCache {
	pub enabled: bool,
	pub ttl_minutes: i64,
}
impl Default for SearchCache {
	fn default() -> Self {
		Self { enabled: true, ttl_minutes: 60 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Sync {
	pub batch_size: u32,
	pub max_retries: u32,
	pub retry_delay_ms: u64,
	pub process_interval_ms: u64,
	pub bulk_page_size: u32,
	pub poll_enabled: bool,
	pub poll_interval_secs: i64,
	pub full_sync_interval_secs: i64,
	pub cache_sweep_interval_secs: i64,
	pub metrics_interval_secs: i64,
}
impl Default for Sync {
	fn default() -> Self {
		Self {
			batch_size: 50,
			max_retries: 3,
			retry_delay_ms: 5_000,
			process_interval_ms: 1_000,
			bulk_page_size: 100,
			poll_enabled: true,
			poll_interval_secs: 30,
			full_sync_interval_secs: 3_600,
			cache_sweep_interval_secs: 900,
			metrics_interval_secs: 300,
		}
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub personal_fetch_limit: u32,
	pub personal_top: u32,
	pub global_top: u32,
	pub knowledge_base_top: u32,
	pub min_personal_relevance: f32,
	pub min_global_relevance: f32,
	pub min_knowledge_base_relevance: f32,
	pub merge_floor: f32,
	pub top_sources: u32,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			personal_fetch_limit: 20,
			personal_top: 6,
			global_top: 6,
			knowledge_base_top: 5,
			min_personal_relevance: 0.15,
			min_global_relevance: 0.1,
			min_knowledge_base_relevance: 0.15,
			merge_floor: 0.05,
			top_sources: 10,
		}
	}
}
