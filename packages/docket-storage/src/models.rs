use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Canonical embedding row without its vector column.
#[derive(Debug, Clone, FromRow)]
pub struct EmbeddingRecord {
	pub record_id: Uuid,
	pub entity_type: String,
	pub entity_id: String,
	pub content_type: String,
	pub text_content: String,
	pub case_id: Option<Uuid>,
	pub confidence: Option<f32>,
	pub searchable: bool,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

/// An embedding row together with its parsed vector, ready for indexing.
#[derive(Debug, Clone)]
pub struct StoredEmbedding {
	pub record: EmbeddingRecord,
	pub vector: Vec<f32>,
}

/// Slim reference used when synthesizing sync events from an updated-at scan.
#[derive(Debug, Clone, FromRow)]
pub struct RecordRef {
	pub entity_type: String,
	pub entity_id: String,
	pub case_id: Option<Uuid>,
}

/// One similarity hit from either backend, normalized to a common shape.
#[derive(Debug, Clone, FromRow)]
pub struct VectorHit {
	pub record_id: Uuid,
	pub entity_type: String,
	pub entity_id: String,
	pub content_type: String,
	pub text_content: String,
	pub similarity: f32,
	pub confidence: Option<f32>,
	pub case_id: Option<Uuid>,
	pub metadata: Value,
	pub created_at: Option<OffsetDateTime>,
}

/// Combined-score hit from the hybrid vector + full-text statement.
#[derive(Debug, Clone, FromRow)]
pub struct HybridHit {
	pub record_id: Uuid,
	pub entity_type: String,
	pub entity_id: String,
	pub content_type: String,
	pub text_content: String,
	pub combined_score: f32,
	pub vector_similarity: f32,
	pub text_rank: f32,
	pub confidence: Option<f32>,
	pub case_id: Option<Uuid>,
	pub metadata: Value,
	pub created_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SavedItem {
	pub item_id: Uuid,
	pub user_id: Uuid,
	pub title: String,
	pub content: String,
	pub content_type: String,
	pub original_query: Option<String>,
	pub tags: Value,
	pub user_rating: Option<i32>,
	pub usage_count: i64,
	pub last_used_at: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct CaseRecord {
	pub case_id: Uuid,
	pub title: String,
	pub description: Option<String>,
	pub tags: Value,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct EvidenceRecord {
	pub evidence_id: Uuid,
	pub case_id: Option<Uuid>,
	pub title: String,
	pub description: Option<String>,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct StatuteRecord {
	pub statute_id: Uuid,
	pub title: String,
	pub content: String,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct KnowledgeBaseEntry {
	pub entry_id: Uuid,
	pub title: String,
	pub content: String,
	pub tags: Value,
	pub is_public: bool,
	pub confidence_score: f32,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, FromRow)]
pub struct UserSearchPreferences {
	pub user_id: Uuid,
	pub preferred_sources: Value,
	pub excluded_sources: Value,
	pub updated_at: OffsetDateTime,
}
