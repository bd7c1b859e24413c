use std::collections::HashMap;

use qdrant_client::{
	Qdrant,
	client::Payload,
	qdrant::{
		Condition, CreateCollectionBuilder, DeletePointsBuilder, Distance, Filter, PointStruct,
		ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
		value::Kind,
	},
};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{StoredEmbedding, VectorHit},
};

pub const PAYLOAD_RECORD_ID: &str = "record_id";
pub const PAYLOAD_ENTITY_TYPE: &str = "entity_type";
pub const PAYLOAD_ENTITY_ID: &str = "entity_id";
pub const PAYLOAD_CONTENT_TYPE: &str = "content_type";
pub const PAYLOAD_TEXT_CONTENT: &str = "text_content";
pub const PAYLOAD_CASE_ID: &str = "case_id";
pub const PAYLOAD_CONFIDENCE: &str = "confidence";
pub const PAYLOAD_METADATA_JSON: &str = "metadata_json";
pub const PAYLOAD_CREATED_AT: &str = "created_at";

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &docket_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		self.client
			.create_collection(CreateCollectionBuilder::new(&self.collection).vectors_config(
				VectorParamsBuilder::new(self.vector_dim as u64, Distance::Cosine),
			))
			.await?;

		Ok(())
	}

	pub async fn upsert_embeddings(&self, embeddings: &[StoredEmbedding]) -> Result<()> {
		if embeddings.is_empty() {
			return Ok(());
		}

		let mut points = Vec::with_capacity(embeddings.len());

		for stored in embeddings {
			let record = &stored.record;
			let mut payload_map = HashMap::new();

			payload_map
				.insert(PAYLOAD_RECORD_ID.to_string(), Value::from(record.record_id.to_string()));
			payload_map
				.insert(PAYLOAD_ENTITY_TYPE.to_string(), Value::from(record.entity_type.clone()));
			payload_map.insert(PAYLOAD_ENTITY_ID.to_string(), Value::from(record.entity_id.clone()));
			payload_map
				.insert(PAYLOAD_CONTENT_TYPE.to_string(), Value::from(record.content_type.clone()));
			payload_map
				.insert(PAYLOAD_TEXT_CONTENT.to_string(), Value::from(record.text_content.clone()));
			payload_map.insert(
				PAYLOAD_CASE_ID.to_string(),
				match record.case_id {
					Some(case_id) => Value::from(case_id.to_string()),
					None => Value::from(serde_json::Value::Null),
				},
			);
			payload_map.insert(
				PAYLOAD_CONFIDENCE.to_string(),
				match record.confidence {
					Some(confidence) => Value::from(confidence as f64),
					None => Value::from(serde_json::Value::Null),
				},
			);
			payload_map.insert(
				PAYLOAD_METADATA_JSON.to_string(),
				Value::from(record.metadata.to_string()),
			);
			payload_map.insert(
				PAYLOAD_CREATED_AT.to_string(),
				Value::from(format_timestamp(record.created_at)?),
			);

			let payload = Payload::from(payload_map);

			points.push(PointStruct::new(
				record.record_id.to_string(),
				stored.vector.clone(),
				payload,
			));
		}

		let upsert = UpsertPointsBuilder::new(self.collection.clone(), points).wait(true);

		self.client.upsert_points(upsert).await?;

		Ok(())
	}

	pub async fn delete_record(&self, record_id: Uuid) -> Result<()> {
		let filter = Filter::must([Condition::matches(PAYLOAD_RECORD_ID, record_id.to_string())]);

		self.delete_by_filter(filter).await
	}

	pub async fn delete_by_case(&self, case_id: Uuid) -> Result<()> {
		let filter = Filter::must([Condition::matches(PAYLOAD_CASE_ID, case_id.to_string())]);

		self.delete_by_filter(filter).await
	}

	async fn delete_by_filter(&self, filter: Filter) -> Result<()> {
		let delete = DeletePointsBuilder::new(self.collection.clone()).points(filter).wait(true);

		match self.client.delete_points(delete).await {
			Ok(_) => Ok(()),
			Err(err) =>
				if is_not_found_error(&err) {
					Ok(())
				} else {
					Err(err.into())
				},
		}
	}

	pub async fn search(
		&self,
		vector: &[f32],
		entity_type: Option<&str>,
		case_id: Option<Uuid>,
		content_type: Option<&str>,
		threshold: f32,
		limit: u64,
	) -> Result<Vec<VectorHit>> {
		let mut conditions = Vec::new();

		if let Some(entity_type) = entity_type {
			conditions.push(Condition::matches(PAYLOAD_ENTITY_TYPE, entity_type.to_string()));
		}
		if let Some(case_id) = case_id {
			conditions.push(Condition::matches(PAYLOAD_CASE_ID, case_id.to_string()));
		}
		if let Some(content_type) = content_type {
			conditions.push(Condition::matches(PAYLOAD_CONTENT_TYPE, content_type.to_string()));
		}

		let mut search = SearchPointsBuilder::new(self.collection.clone(), vector.to_vec(), limit)
			.with_payload(true)
			.score_threshold(threshold);

		if !conditions.is_empty() {
			search = search.filter(Filter::must(conditions));
		}

		let response = self.client.search_points(search).await?;

		Ok(response.result.iter().filter_map(hit_from_point).collect())
	}
}

pub fn is_not_found_error(err: &qdrant_client::QdrantError) -> bool {
	let message = err.to_string().to_lowercase();
	let point_not_found =
		(message.contains("not found") || message.contains("404")) && message.contains("point");
	let no_point_found = message.contains("no point") && message.contains("found");
	point_not_found || no_point_found
}

/// Drops points whose payload is missing the record identity fields. Such
/// points cannot be traced back to a canonical row and are useless as hits.
pub fn hit_from_point(point: &ScoredPoint) -> Option<VectorHit> {
	let record_id = payload_uuid(point, PAYLOAD_RECORD_ID)?;
	let entity_type = payload_str(point, PAYLOAD_ENTITY_TYPE)?.to_string();
	let entity_id = payload_str(point, PAYLOAD_ENTITY_ID)?.to_string();
	let content_type = payload_str(point, PAYLOAD_CONTENT_TYPE).unwrap_or_default().to_string();
	let text_content = payload_str(point, PAYLOAD_TEXT_CONTENT).unwrap_or_default().to_string();
	let case_id = payload_uuid(point, PAYLOAD_CASE_ID);
	let confidence = payload_f64(point, PAYLOAD_CONFIDENCE).map(|value| value as f32);
	let metadata = payload_str(point, PAYLOAD_METADATA_JSON)
		.and_then(|raw| serde_json::from_str(raw).ok())
		.unwrap_or(serde_json::Value::Null);
	let created_at = payload_str(point, PAYLOAD_CREATED_AT)
		.and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok());

	Some(VectorHit {
		record_id,
		entity_type,
		entity_id,
		content_type,
		text_content,
		similarity: point.score,
		confidence,
		case_id,
		metadata,
		created_at,
	})
}

fn payload_str<'a>(point: &'a ScoredPoint, key: &str) -> Option<&'a str> {
	match &point.payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.as_str()),
		_ => None,
	}
}

fn payload_uuid(point: &ScoredPoint, key: &str) -> Option<Uuid> {
	payload_str(point, key).and_then(|raw| Uuid::parse_str(raw).ok())
}

fn payload_f64(point: &ScoredPoint, key: &str) -> Option<f64> {
	match &point.payload.get(key)?.kind {
		Some(Kind::DoubleValue(value)) => Some(*value),
		Some(Kind::IntegerValue(value)) => Some(*value as f64),
		_ => None,
	}
}

fn format_timestamp(ts: OffsetDateTime) -> Result<String> {
	ts.format(&Rfc3339).map_err(|_| Error::InvalidArgument("Failed to format timestamp.".into()))
}
