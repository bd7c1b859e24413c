use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Result,
	models::{
		CaseRecord, EmbeddingRecord, EvidenceRecord, HybridHit, KnowledgeBaseEntry, RecordRef,
		SavedItem, StatuteRecord, StoredEmbedding, UserSearchPreferences, VectorHit,
	},
	vector,
};

#[derive(FromRow)]
struct EmbeddingRow {
	record_id: Uuid,
	entity_type: String,
	entity_id: String,
	content_type: String,
	text_content: String,
	case_id: Option<Uuid>,
	confidence: Option<f32>,
	searchable: bool,
	metadata: serde_json::Value,
	created_at: OffsetDateTime,
	updated_at: OffsetDateTime,
	vec_text: String,
}

impl EmbeddingRow {
	fn into_stored(self) -> Result<StoredEmbedding> {
		let vector = vector::parse_pg_vector(&self.vec_text)?;

		Ok(StoredEmbedding {
			record: EmbeddingRecord {
				record_id: self.record_id,
				entity_type: self.entity_type,
				entity_id: self.entity_id,
				content_type: self.content_type,
				text_content: self.text_content,
				case_id: self.case_id,
				confidence: self.confidence,
				searchable: self.searchable,
				metadata: self.metadata,
				created_at: self.created_at,
				updated_at: self.updated_at,
			},
			vector,
		})
	}
}

pub async fn upsert_record(
	pool: &PgPool,
	record: &EmbeddingRecord,
	vec: &[f32],
	vector_dim: u32,
) -> Result<()> {
	vector::validate_vector_dim(vec, vector_dim)?;

	let vec_text = vector::format_vector_text(vec);

	sqlx::query(
		"\
INSERT INTO embedding_records (
	record_id,
	entity_type,
	entity_id,
	content_type,
	text_content,
	vec,
	case_id,
	confidence,
	searchable,
	metadata,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6::text::vector, $7, $8, $9, $10, $11, $12)
ON CONFLICT (entity_type, entity_id) DO UPDATE
SET
	content_type = EXCLUDED.content_type,
	text_content = EXCLUDED.text_content,
	vec = EXCLUDED.vec,
	case_id = EXCLUDED.case_id,
	confidence = EXCLUDED.confidence,
	searchable = EXCLUDED.searchable,
	metadata = EXCLUDED.metadata,
	updated_at = EXCLUDED.updated_at",
	)
	.bind(record.record_id)
	.bind(record.entity_type.as_str())
	.bind(record.entity_id.as_str())
	.bind(record.content_type.as_str())
	.bind(record.text_content.as_str())
	.bind(vec_text.as_str())
	.bind(record.case_id)
	.bind(record.confidence)
	.bind(record.searchable)
	.bind(&record.metadata)
	.bind(record.created_at)
	.bind(record.updated_at)
	.execute(pool)
	.await?;

	Ok(())
}

pub async fn fetch_record(
	pool: &PgPool,
	entity_type: &str,
	entity_id: &str,
) -> Result<Option<StoredEmbedding>> {
	let row: Option<EmbeddingRow> = sqlx::query_as(
		"\
SELECT
	record_id,
	entity_type,
	entity_id,
	content_type,
	text_content,
	case_id,
	confidence,
	searchable,
	metadata,
	created_at,
	updated_at,
	vec::text AS vec_text
FROM embedding_records
WHERE entity_type = $1 AND entity_id = $2",
	)
	.bind(entity_type)
	.bind(entity_id)
	.fetch_optional(pool)
	.await?;

	row.map(EmbeddingRow::into_stored).transpose()
}

pub async fn scan_records(
	pool: &PgPool,
	entity_type: Option<&str>,
	case_id: Option<Uuid>,
	limit: i64,
	offset: i64,
) -> Result<Vec<StoredEmbedding>> {
	let rows: Vec<EmbeddingRow> = sqlx::query_as(
		"\
SELECT
	record_id,
	entity_type,
	entity_id,
	content_type,
	text_content,
	case_id,
	confidence,
	searchable,
	metadata,
	created_at,
	updated_at,
	vec::text AS vec_text
FROM embedding_records
WHERE searchable
	AND ($1::text IS NULL OR entity_type = $1)
	AND ($2::uuid IS NULL OR case_id = $2)
ORDER BY created_at ASC
LIMIT $3 OFFSET $4",
	)
	.bind(entity_type)
	.bind(case_id)
	.bind(limit)
	.bind(offset)
	.fetch_all(pool)
	.await?;

	rows.into_iter().map(EmbeddingRow::into_stored).collect()
}

pub async fn updated_since(
	pool: &PgPool,
	since: OffsetDateTime,
	limit: i64,
) -> Result<Vec<RecordRef>> {
	let rows = sqlx::query_as::<_, RecordRef>(
		"\
SELECT
	entity_type,
	entity_id,
	case_id
FROM embedding_records
WHERE searchable AND updated_at >= $1
ORDER BY updated_at ASC
LIMIT $2",
	)
	.bind(since)
	.bind(limit)
	.fetch_all(pool)
	.await?;

	Ok(rows)
}

pub async fn entity_types(pool: &PgPool) -> Result<Vec<String>> {
	let types = sqlx::query_scalar::<_, String>(
		"SELECT DISTINCT entity_type FROM embedding_records WHERE searchable ORDER BY entity_type",
	)
	.fetch_all(pool)
	.await?;

	Ok(types)
}

pub async fn vector_search(
	pool: &PgPool,
	vec: &[f32],
	entity_type: Option<&str>,
	case_id: Option<Uuid>,
	content_type: Option<&str>,
	threshold: f32,
	limit: i64,
) -> Result<Vec<VectorHit>> {
	let vec_text = vector::format_vector_text(vec);
	let hits = sqlx::query_as::<_, VectorHit>(
		"\
SELECT
	record_id,
	entity_type,
	entity_id,
	content_type,
	text_content,
	(1 - (vec <=> $1::text::vector))::real AS similarity,
	confidence,
	case_id,
	metadata,
	created_at
FROM embedding_records
WHERE searchable
	AND ($2::text IS NULL OR entity_type = $2)
	AND ($3::uuid IS NULL OR case_id = $3)
	AND ($4::text IS NULL OR content_type = $4)
	AND (1 - (vec <=> $1::text::vector)) >= $5::real
ORDER BY vec <=> $1::text::vector
LIMIT $6",
	)
	.bind(vec_text.as_str())
	.bind(entity_type)
	.bind(case_id)
	.bind(content_type)
	.bind(threshold)
	.bind(limit)
	.fetch_all(pool)
	.await?;

	Ok(hits)
}

/// Weighted vector + full-text score in one statement. A row qualifies when
/// either the vector similarity clears the threshold or the text query
/// matches, so lexical-only hits are not lost.
pub async fn hybrid_search(
	pool: &PgPool,
	vec: &[f32],
	text_query: &str,
	entity_type: Option<&str>,
	case_id: Option<Uuid>,
	content_type: Option<&str>,
	vector_weight: f32,
	text_weight: f32,
	threshold: f32,
	limit: i64,
) -> Result<Vec<HybridHit>> {
	let vec_text = vector::format_vector_text(vec);
	let hits = sqlx::query_as::<_, HybridHit>(
		"\
SELECT
	record_id,
	entity_type,
	entity_id,
	content_type,
	text_content,
	($7::real * (1 - (vec <=> $1::text::vector))
		+ $8::real * ts_rank_cd(to_tsvector('english', text_content), plainto_tsquery('english', $2)))::real
		AS combined_score,
	(1 - (vec <=> $1::text::vector))::real AS vector_similarity,
	ts_rank_cd(to_tsvector('english', text_content), plainto_tsquery('english', $2))::real AS text_rank,
	confidence,
	case_id,
	metadata,
	created_at
FROM embedding_records
WHERE searchable
	AND ($3::text IS NULL OR entity_type = $3)
	AND ($4::uuid IS NULL OR case_id = $4)
	AND ($5::text IS NULL OR content_type = $5)
	AND ((1 - (vec <=> $1::text::vector)) >= $6::real
		OR to_tsvector('english', text_content) @@ plainto_tsquery('english', $2))
ORDER BY combined_score DESC
LIMIT $9",
	)
	.bind(vec_text.as_str())
	.bind(text_query)
	.bind(entity_type)
	.bind(case_id)
	.bind(content_type)
	.bind(threshold)
	.bind(vector_weight)
	.bind(text_weight)
	.bind(limit)
	.fetch_all(pool)
	.await?;

	Ok(hits)
}

pub async fn saved_items_for_user(
	pool: &PgPool,
	user_id: Uuid,
	limit: i64,
) -> Result<Vec<SavedItem>> {
	let items = sqlx::query_as::<_, SavedItem>(
		"\
SELECT
	item_id,
	user_id,
	title,
	content,
	content_type,
	original_query,
	tags,
	user_rating,
	usage_count,
	last_used_at,
	created_at,
	updated_at
FROM saved_items
WHERE user_id = $1
ORDER BY last_used_at DESC NULLS LAST, user_rating DESC NULLS LAST, usage_count DESC
LIMIT $2",
	)
	.bind(user_id)
	.bind(limit)
	.fetch_all(pool)
	.await?;

	Ok(items)
}

pub async fn fetch_case(pool: &PgPool, case_id: Uuid) -> Result<Option<CaseRecord>> {
	let case = sqlx::query_as::<_, CaseRecord>(
		"SELECT case_id, title, description, tags, created_at FROM cases WHERE case_id = $1",
	)
	.bind(case_id)
	.fetch_optional(pool)
	.await?;

	Ok(case)
}

pub async fn search_cases(
	pool: &PgPool,
	pattern: &str,
	exclude_case: Option<Uuid>,
	limit: i64,
) -> Result<Vec<CaseRecord>> {
	let cases = sqlx::query_as::<_, CaseRecord>(
		"\
SELECT
	case_id,
	title,
	description,
	tags,
	created_at
FROM cases
WHERE ($2::uuid IS NULL OR case_id <> $2)
	AND (title ILIKE $1 OR description ILIKE $1)
LIMIT $3",
	)
	.bind(pattern)
	.bind(exclude_case)
	.bind(limit)
	.fetch_all(pool)
	.await?;

	Ok(cases)
}

pub async fn search_evidence(
	pool: &PgPool,
	pattern: &str,
	limit: i64,
) -> Result<Vec<EvidenceRecord>> {
	let evidence = sqlx::query_as::<_, EvidenceRecord>(
		"\
SELECT
	evidence_id,
	case_id,
	title,
	description,
	created_at
FROM evidence
WHERE title ILIKE $1 OR description ILIKE $1
LIMIT $2",
	)
	.bind(pattern)
	.bind(limit)
	.fetch_all(pool)
	.await?;

	Ok(evidence)
}

pub async fn search_statutes(
	pool: &PgPool,
	pattern: &str,
	limit: i64,
) -> Result<Vec<StatuteRecord>> {
	let statutes = sqlx::query_as::<_, StatuteRecord>(
		"\
SELECT
	statute_id,
	title,
	content,
	created_at
FROM statutes
WHERE title ILIKE $1 OR content ILIKE $1
LIMIT $2",
	)
	.bind(pattern)
	.bind(limit)
	.fetch_all(pool)
	.await?;

	Ok(statutes)
}

pub async fn search_knowledge_base(
	pool: &PgPool,
	pattern: &str,
	limit: i64,
) -> Result<Vec<KnowledgeBaseEntry>> {
	let entries = sqlx::query_as::<_, KnowledgeBaseEntry>(
		"\
SELECT
	entry_id,
	title,
	content,
	tags,
	is_public,
	confidence_score,
	created_at
FROM knowledge_base
WHERE is_public AND (title ILIKE $1 OR content ILIKE $1)
ORDER BY confidence_score DESC
LIMIT $2",
	)
	.bind(pattern)
	.bind(limit)
	.fetch_all(pool)
	.await?;

	Ok(entries)
}

pub async fn fetch_user_preferences(
	pool: &PgPool,
	user_id: Uuid,
) -> Result<Option<UserSearchPreferences>> {
	let prefs = sqlx::query_as::<_, UserSearchPreferences>(
		"\
SELECT
	user_id,
	preferred_sources,
	excluded_sources,
	updated_at
FROM user_search_preferences
WHERE user_id = $1",
	)
	.bind(user_id)
	.fetch_optional(pool)
	.await?;

	Ok(prefs)
}

pub async fn bump_saved_item_usage(pool: &PgPool, item_ids: &[Uuid]) -> Result<u64> {
	if item_ids.is_empty() {
		return Ok(0);
	}

	let now = OffsetDateTime::now_utc();
	let result = sqlx::query(
		"\
UPDATE saved_items
SET
	usage_count = usage_count + 1,
	last_used_at = $2,
	updated_at = $2
WHERE item_id = ANY($1)",
	)
	.bind(item_ids)
	.bind(now)
	.execute(pool)
	.await?;

	Ok(result.rows_affected())
}

/// Escapes ILIKE metacharacters and wraps the query in wildcards.
pub fn ilike_pattern(query: &str) -> String {
	let mut escaped = String::with_capacity(query.len() + 2);

	escaped.push('%');

	for ch in query.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			escaped.push('\\');
		}

		escaped.push(ch);
	}

	escaped.push('%');

	escaped
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use sqlx::postgres::PgPoolOptions;

	use super::*;
	use crate::Error;

	#[test]
	fn ilike_pattern_escapes_metacharacters() {
		assert_eq!(ilike_pattern("fraud"), "%fraud%");
		assert_eq!(ilike_pattern("100%_done"), "%100\\%\\_done%");
	}

	// A lazy pool never connects, so the write must be rejected before any
	// statement is issued.
	#[tokio::test]
	async fn upsert_rejects_a_mismatched_vector_dimension() {
		let pool = PgPoolOptions::new()
			.connect_lazy("postgres://docket@localhost/docket")
			.expect("lazy pool");
		let now = OffsetDateTime::now_utc();
		let record = EmbeddingRecord {
			record_id: Uuid::new_v4(),
			entity_type: "case".to_string(),
			entity_id: "case-1".to_string(),
			content_type: "description".to_string(),
			text_content: "Wire fraud investigation notes.".to_string(),
			case_id: None,
			confidence: None,
			searchable: true,
			metadata: json!({}),
			created_at: now,
			updated_at: now,
		};
		let result = upsert_record(&pool, &record, &[0.0; 3], 4).await;

		assert!(matches!(result, Err(Error::InvalidArgument(_))));
	}
}
