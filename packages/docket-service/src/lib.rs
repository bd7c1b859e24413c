pub mod adapters;
pub mod retrieval;
pub mod search;
pub mod sync;
pub mod usage;

mod error;

pub use error::{Error, Result};

use std::{future::Future, pin::Pin};

use time::OffsetDateTime;
use uuid::Uuid;

use docket_config::EmbeddingProviderConfig;
use docket_storage::models::{RecordRef, StoredEmbedding, VectorHit};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Optional per-request constraints shared by both search backends.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
	pub entity_type: Option<String>,
	pub case_id: Option<Uuid>,
	pub content_type: Option<String>,
}
impl SearchFilters {
	pub fn is_empty(&self) -> bool {
		self.entity_type.is_none() && self.case_id.is_none() && self.content_type.is_none()
	}
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

/// Reads against the canonical record store.
pub trait RecordStore
where
	Self: Send + Sync,
{
	fn fetch_record<'a>(
		&'a self,
		entity_type: &'a str,
		entity_id: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Option<StoredEmbedding>>>;

	fn scan_records<'a>(
		&'a self,
		entity_type: Option<&'a str>,
		case_id: Option<Uuid>,
		limit: i64,
		offset: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<StoredEmbedding>>>;

	fn updated_since<'a>(
		&'a self,
		since: OffsetDateTime,
		limit: i64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RecordRef>>>;

	fn entity_types<'a>(&'a self) -> BoxFuture<'a, color_eyre::Result<Vec<String>>>;

	fn vector_search<'a>(
		&'a self,
		vector: &'a [f32],
		filters: &'a SearchFilters,
		threshold: f32,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<VectorHit>>>;

	fn hybrid_search<'a>(
		&'a self,
		vector: &'a [f32],
		text_query: &'a str,
		filters: &'a SearchFilters,
		threshold: f32,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<VectorHit>>>;
}

/// The derived external vector index.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn upsert<'a>(
		&'a self,
		embeddings: &'a [StoredEmbedding],
	) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn delete_record<'a>(&'a self, record_id: Uuid) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn delete_by_case<'a>(&'a self, case_id: Uuid) -> BoxFuture<'a, color_eyre::Result<()>>;

	fn search<'a>(
		&'a self,
		vector: &'a [f32],
		filters: &'a SearchFilters,
		threshold: f32,
		limit: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<VectorHit>>>;
}
