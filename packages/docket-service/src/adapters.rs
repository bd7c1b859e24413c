//! Default implementations of the service seams over docket-storage and
//! docket-providers.

use std::sync::Arc;

use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use docket_config::{Config, EmbeddingProviderConfig};
use docket_storage::{
	db::Db,
	models::{RecordRef, StoredEmbedding, VectorHit},
	qdrant::QdrantStore,
	queries, vector,
};

use crate::{BoxFuture, EmbeddingProvider, RecordStore, SearchFilters, VectorIndex};

pub struct DefaultEmbedding;
impl EmbeddingProvider for DefaultEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(docket_providers::embedding::embed(cfg, texts))
	}
}

pub struct PgRecordStore {
	db: Db,
	cfg: Arc<Config>,
}
impl PgRecordStore {
	pub fn new(db: Db, cfg: Arc<Config>) -> Self {
		Self { db, cfg }
	}
}
impl RecordStore for PgRecordStore {
	fn fetch_record<'a>(
		&'a self,
		entity_type: &'a str,
		entity_id: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Option<StoredEmbedding>>> {
		Box::pin(async move {
			Ok(queries::fetch_record(&self.db.pool, entity_type, entity_id).await?)
		})
	}

	fn scan_records<'a>(
		&'a self,
		entity_type: Option<&'a str>,
		case_id: Option<Uuid>,
		limit: i64,
		offset: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<StoredEmbedding>>> {
		Box::pin(async move {
			Ok(queries::scan_records(&self.db.pool, entity_type, case_id, limit, offset).await?)
		})
	}

	fn updated_since<'a>(
		&'a self,
		since: OffsetDateTime,
		limit: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RecordRef>>> {
		Box::pin(async move { Ok(queries::updated_since(&self.db.pool, since, limit).await?) })
	}

	fn entity_types<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<Vec<String>>> {
		Box::pin(async move { Ok(queries::entity_types(&self.db.pool).await?) })
	}

	fn vector_search<'a>(
		&'a self,
		vector: &'a [f32],
		filters: &'a SearchFilters,
		threshold: f32,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<VectorHit>>> {
		Box::pin(async move {
			let hits = queries::vector_search(
				&self.db.pool,
				vector,
				filters.entity_type.as_deref(),
				filters.case_id,
				filters.content_type.as_deref(),
				threshold,
				limit as i64,
			)
			.await?;

			Ok(hits)
		})
	}

	fn hybrid_search<'a>(
		&'a self,
		vector: &'a [f32],
		text_query: &'a str,
		filters: &'a SearchFilters,
		threshold: f32,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<VectorHit>>> {
		Box::pin(async move {
			let hits = queries::hybrid_search(
				&self.db.pool,
				vector,
				text_query,
				filters.entity_type.as_deref(),
				filters.case_id,
				filters.content_type.as_deref(),
				self.cfg.search.vector_weight,
				self.cfg.search.text_weight,
				threshold,
				limit as i64,
			)
			.await?;

			Ok(hits.into_iter().map(hybrid_to_hit).collect())
		})
	}
}

/// The component scores survive in the hit metadata so callers can explain a
/// combined score.
fn hybrid_to_hit(hit: docket_storage::models::HybridHit) -> VectorHit {
	let mut metadata = hit.metadata;

	if !metadata.is_object() {
		metadata = json!({});
	}
	if let Some(object) = metadata.as_object_mut() {
		object.insert("vector_similarity".to_string(), json!(hit.vector_similarity));
		object.insert("text_rank".to_string(), json!(hit.text_rank));
	}

	VectorHit {
		record_id: hit.record_id,
		entity_type: hit.entity_type,
		entity_id: hit.entity_id,
		content_type: hit.content_type,
		text_content: hit.text_content,
		similarity: hit.combined_score,
		confidence: hit.confidence,
		case_id: hit.case_id,
		metadata,
		created_at: hit.created_at,
	}
}

pub struct QdrantIndex {
	store: QdrantStore,
}
impl QdrantIndex {
	pub fn new(store: QdrantStore) -> Self {
		Self { store }
	}
}
impl VectorIndex for QdrantIndex {
	fn upsert<'a>(
		&'a self,
		embeddings: &'a [StoredEmbedding],
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move {
			for stored in embeddings {
				vector::validate_vector_dim(&stored.vector, self.store.vector_dim)?;
			}

			Ok(self.store.upsert_embeddings(embeddings).await?)
		})
	}

	fn delete_record<'a>(&'a self, record_id: Uuid) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move { Ok(self.store.delete_record(record_id).await?) })
	}

	fn delete_by_case<'a>(&'a self, case_id: Uuid) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(async move { Ok(self.store.delete_by_case(case_id).await?) })
	}

	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		filters: &'a SearchFilters,
		threshold: f32,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<VectorHit>>> {
		Box::pin(async move {
			let hits = self
				.store
				.search(
					vector,
					filters.entity_type.as_deref(),
					filters.case_id,
					filters.content_type.as_deref(),
					threshold,
					limit as u64,
				)
				.await?;

			Ok(hits)
		})
	}
}
