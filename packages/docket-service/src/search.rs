//! Search router over the primary store and the external vector index.
//!
//! Strategy: requests with filters or a large limit try the external index
//! first and fall back to the primary store; everything else goes straight to
//! the primary store. A `text_query` switches to the hybrid combined-score
//! statement on the primary store. Responses are cached by a normalized
//! request fingerprint.

pub mod cache_key;

use std::{cmp::Ordering, sync::Arc, time::Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use docket_config::Config;
use docket_domain::boost;
use docket_storage::{cache::MemoryCache, models::VectorHit};

use crate::{EmbeddingProvider, Error, RecordStore, Result, SearchFilters, VectorIndex};

#[derive(Debug, Clone)]
pub struct SearchOptions {
	pub limit: u32,
	pub threshold: f32,
	pub text_query: Option<String>,
	pub entity_type: Option<String>,
	pub case_id: Option<Uuid>,
	pub content_type: Option<String>,
	pub use_cache: bool,
}
impl SearchOptions {
	pub fn has_filters(&self) -> bool {
		self.entity_type.is_some() || self.case_id.is_some() || self.content_type.is_some()
	}

	fn filters(&self) -> SearchFilters {
		SearchFilters {
			entity_type: self.entity_type.clone(),
			case_id: self.case_id,
			content_type: self.content_type.clone(),
		}
	}
}
impl Default for SearchOptions {
	fn default() -> Self {
		Self {
			limit: 10,
			threshold: 0.7,
			text_query: None,
			entity_type: None,
			case_id: None,
			content_type: None,
			use_cache: true,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSource {
	Cache,
	Postgresql,
	Qdrant,
}
impl SearchSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Cache => "cache",
			Self::Postgresql => "postgresql",
			Self::Qdrant => "qdrant",
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
	pub source: SearchSource,
	pub index_used: String,
	pub fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
	pub record_id: Uuid,
	pub entity_type: String,
	pub entity_id: String,
	pub content_type: String,
	pub text_content: String,
	pub similarity: f32,
	pub confidence: Option<f32>,
	pub case_id: Option<Uuid>,
	pub metadata: Value,
	pub rank: u32,
	pub explanation: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
	pub results: Vec<SearchResult>,
	pub provenance: Provenance,
	pub query_time_ms: u64,
}

pub struct SearchRouter {
	cfg: Arc<Config>,
	cache: Arc<MemoryCache>,
	embedding: Arc<dyn EmbeddingProvider>,
	store: Arc<dyn RecordStore>,
	index: Arc<dyn VectorIndex>,
}
impl SearchRouter {
	pub fn new(
		cfg: Arc<Config>,
		cache: Arc<MemoryCache>,
		embedding: Arc<dyn EmbeddingProvider>,
		store: Arc<dyn RecordStore>,
		index: Arc<dyn VectorIndex>,
	) -> Self {
		Self { cfg, cache, embedding, store, index }
	}

	pub async fn search(&self, query: &str, opts: &SearchOptions) -> Result<SearchResponse> {
		let started = Instant::now();
		let trimmed = query.trim();

		if trimmed.is_empty() {
			return Err(Error::InvalidRequest { message: "Query must be non-empty.".to_string() });
		}

		let cache_enabled = opts.use_cache && self.cfg.search.cache.enabled;
		let key = if cache_enabled {
			Some(cache_key::build_search_cache_key(trimmed, opts)?)
		} else {
			None
		};

		if let Some(key) = key.as_deref() {
			let now = OffsetDateTime::now_utc();

			if let Some(value) = self.cache.get(key, now) {
				// A malformed cached payload falls through to a fresh search.
				if let Ok(results) = serde_json::from_value::<Vec<SearchResult>>(value) {
					tracing::debug!(query = %trimmed, "Search served from cache.");

					return Ok(SearchResponse {
						results,
						provenance: Provenance {
							source: SearchSource::Cache,
							index_used: "cache".to_string(),
							fallback: false,
						},
						query_time_ms: started.elapsed().as_millis() as u64,
					});
				}
			}
		}

		let vector = self.embed_query(trimmed).await?;
		let (hits, provenance) = match opts.text_query.as_deref() {
			Some(text_query) => self.run_hybrid(&vector, text_query, opts).await?,
			None => self.route_vector(&vector, opts, None).await?,
		};
		let results = build_results(hits, &provenance, opts.limit);

		if let Some(key) = key
			&& !results.is_empty()
		{
			let encoded = serde_json::to_value(&results).map_err(|err| Error::Storage {
				message: format!("Failed to encode cached search results: {err}"),
			})?;

			self.cache.insert(
				key,
				encoded,
				Duration::minutes(self.cfg.search.cache.ttl_minutes),
				opts.case_id,
				OffsetDateTime::now_utc(),
			);
		}

		Ok(SearchResponse {
			results,
			provenance,
			query_time_ms: started.elapsed().as_millis() as u64,
		})
	}

	/// Reuses a stored record's vector as the query vector. Never cached; the
	/// source record is excluded from its own results.
	pub async fn find_similar(
		&self,
		entity_type: &str,
		entity_id: &str,
		opts: &SearchOptions,
	) -> Result<SearchResponse> {
		let started = Instant::now();
		let stored = self
			.store
			.fetch_record(entity_type, entity_id)
			.await
			.map_err(|err| Error::BackendUnavailable {
				backend: "postgresql",
				message: err.to_string(),
			})?
			.ok_or_else(|| Error::NotFound {
				message: format!("No embedding record for {entity_type}/{entity_id}."),
			})?;
		let (hits, provenance) =
			self.route_vector(&stored.vector, opts, Some(stored.record.record_id)).await?;
		let results = build_results(hits, &provenance, opts.limit);

		Ok(SearchResponse {
			results,
			provenance,
			query_time_ms: started.elapsed().as_millis() as u64,
		})
	}

	async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		let texts = [query.to_string()];
		let vectors = self
			.embedding
			.embed(&self.cfg.providers.embedding, &texts)
			.await
			.map_err(|err| Error::EmbeddingUnavailable { message: err.to_string() })?;
		let vector = vectors.into_iter().next().ok_or_else(|| Error::EmbeddingUnavailable {
			message: "Provider returned no vectors.".to_string(),
		})?;
		let expected = self.cfg.storage.qdrant.vector_dim as usize;

		if vector.len() != expected {
			return Err(Error::EmbeddingUnavailable {
				message: format!(
					"Provider returned dimension {} instead of {expected}.",
					vector.len()
				),
			});
		}

		Ok(vector)
	}

	async fn route_vector(
		&self,
		vector: &[f32],
		opts: &SearchOptions,
		exclude: Option<Uuid>,
	) -> Result<(Vec<VectorHit>, Provenance)> {
		let filters = opts.filters();
		let timeout = std::time::Duration::from_millis(self.cfg.search.backend_timeout_ms);
		let use_external =
			opts.has_filters() || opts.limit > self.cfg.search.large_query_limit;
		// Fetch one extra when excluding the query record itself.
		let fetch_limit = opts.limit + u32::from(exclude.is_some());

		if use_external {
			match with_timeout(
				timeout,
				self.index.search(vector, &filters, opts.threshold, fetch_limit),
			)
			.await
			{
				Ok(hits) => {
					let hits = without_record(hits, exclude);

					return Ok((hits, Provenance {
						source: SearchSource::Qdrant,
						index_used: "qdrant-hnsw".to_string(),
						fallback: false,
					}));
				},
				Err(err) => {
					tracing::warn!(error = %err, "External index search failed. Falling back to the primary store.");
				},
			}
		}

		let hits = with_timeout(
			timeout,
			self.store.vector_search(vector, &filters, opts.threshold, fetch_limit),
		)
		.await
		.map_err(|err| Error::BackendUnavailable {
			backend: "postgresql",
			message: err.to_string(),
		})?;
		let hits = without_record(hits, exclude);
		let index_used = if opts.limit > self.cfg.search.large_query_limit {
			"ivfflat"
		} else {
			"hnsw"
		};

		Ok((hits, Provenance {
			source: SearchSource::Postgresql,
			index_used: index_used.to_string(),
			fallback: use_external,
		}))
	}

	async fn run_hybrid(
		&self,
		vector: &[f32],
		text_query: &str,
		opts: &SearchOptions,
	) -> Result<(Vec<VectorHit>, Provenance)> {
		let filters = opts.filters();
		let timeout = std::time::Duration::from_millis(self.cfg.search.backend_timeout_ms);
		// The hybrid gate admits rows by vector similarity or lexical match,
		// so it uses the dedicated hybrid threshold rather than the stricter
		// vector-only one.
		let hits = with_timeout(
			timeout,
			self.store.hybrid_search(
				vector,
				text_query,
				&filters,
				self.cfg.search.hybrid_threshold,
				opts.limit,
			),
		)
		.await
		.map_err(|err| Error::BackendUnavailable {
			backend: "postgresql",
			message: err.to_string(),
		})?;

		Ok((hits, Provenance {
			source: SearchSource::Postgresql,
			index_used: "hybrid".to_string(),
			fallback: false,
		}))
	}
}

async fn with_timeout<T, F>(timeout: std::time::Duration, fut: F) -> color_eyre::Result<T>
where
	F: std::future::Future<Output = color_eyre::Result<T>>,
{
	match tokio::time::timeout(timeout, fut).await {
		Ok(result) => result,
		Err(_) =>
			Err(color_eyre::eyre::eyre!("Search backend timed out after {}ms.", timeout.as_millis())),
	}
}

fn without_record(hits: Vec<VectorHit>, exclude: Option<Uuid>) -> Vec<VectorHit> {
	let Some(exclude) = exclude else { return hits };

	hits.into_iter().filter(|hit| hit.record_id != exclude).collect()
}

fn build_results(mut hits: Vec<VectorHit>, provenance: &Provenance, limit: u32) -> Vec<SearchResult> {
	for hit in &mut hits {
		hit.similarity = boost::clamp01(hit.similarity);
	}

	// Stable sort keeps the backend's order for equal scores.
	hits.sort_by(|a, b| cmp_f32_desc(a.similarity, b.similarity));
	hits.truncate(limit as usize);

	hits.into_iter()
		.enumerate()
		.map(|(idx, hit)| {
			let explanation = format!(
				"Found via {} search with {:.1}% similarity using the {} index. Entity: {}, content type: {}.",
				provenance.source.as_str(),
				hit.similarity * 100.0,
				provenance.index_used,
				hit.entity_type,
				hit.content_type,
			);

			SearchResult {
				record_id: hit.record_id,
				entity_type: hit.entity_type,
				entity_id: hit.entity_id,
				content_type: hit.content_type,
				text_content: hit.text_content,
				similarity: hit.similarity,
				confidence: hit.confidence,
				case_id: hit.case_id,
				metadata: hit.metadata,
				rank: idx as u32 + 1,
				explanation,
			}
		})
		.collect()
}

pub(crate) fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn descending_comparator_pushes_nan_last() {
		let mut scores = vec![0.2_f32, f32::NAN, 0.9, 0.5];

		scores.sort_by(|a, b| cmp_f32_desc(*a, *b));

		assert_eq!(scores[0], 0.9);
		assert_eq!(scores[1], 0.5);
		assert_eq!(scores[2], 0.2);
		assert!(scores[3].is_nan());
	}

	#[test]
	fn results_are_clamped_ranked_and_truncated() {
		let hit = |similarity: f32| VectorHit {
			record_id: Uuid::new_v4(),
			entity_type: "case".to_string(),
			entity_id: "e".to_string(),
			content_type: "description".to_string(),
			text_content: String::new(),
			similarity,
			confidence: None,
			case_id: None,
			metadata: Value::Null,
			created_at: None,
		};
		let provenance = Provenance {
			source: SearchSource::Postgresql,
			index_used: "hnsw".to_string(),
			fallback: false,
		};
		let results = build_results(vec![hit(0.4), hit(1.7), hit(0.8)], &provenance, 2);

		assert_eq!(results.len(), 2);
		assert_eq!(results[0].similarity, 1.0);
		assert_eq!(results[0].rank, 1);
		assert_eq!(results[1].similarity, 0.8);
		assert_eq!(results[1].rank, 2);
	}
}
