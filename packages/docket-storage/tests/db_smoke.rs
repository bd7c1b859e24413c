use serde_json::json;
use time::OffsetDateTime;
use uuid::Uuid;

use docket_storage::{
	db::Db,
	models::EmbeddingRecord,
	queries,
};

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set DOCKET_PG_DSN to run."]
async fn schema_and_vector_search_round_trip() {
	let Some(base_dsn) = docket_testkit::env_dsn() else {
		eprintln!("Skipping schema_and_vector_search_round_trip; set DOCKET_PG_DSN to run.");

		return;
	};

	docket_testkit::with_test_db(&base_dsn, async move |test_db| {
		let cfg = docket_config::Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 4 };
		let db = Db::connect(&cfg).await.map_err(|err| {
			docket_testkit::Error::Message(format!("Failed to connect test database: {err}."))
		})?;
		let check = async {
			db.ensure_schema(4).await?;
			// Idempotent on a second run.
			db.ensure_schema(4).await?;

			let now = OffsetDateTime::now_utc();
			let record = EmbeddingRecord {
				record_id: Uuid::new_v4(),
				entity_type: "case".to_string(),
				entity_id: "case-1".to_string(),
				content_type: "description".to_string(),
				text_content: "Wire fraud investigation notes.".to_string(),
				case_id: Some(Uuid::new_v4()),
				confidence: Some(0.9),
				searchable: true,
				metadata: json!({ "origin": "smoke" }),
				created_at: now,
				updated_at: now,
			};

			queries::upsert_record(&db.pool, &record, &[1.0, 0.0, 0.0, 0.0], 4).await?;

			let stored = queries::fetch_record(&db.pool, "case", "case-1")
				.await?
				.ok_or_else(|| docket_storage::Error::NotFound("case-1".to_string()))?;

			assert_eq!(stored.record.record_id, record.record_id);
			assert_eq!(stored.vector, vec![1.0, 0.0, 0.0, 0.0]);

			let hits = queries::vector_search(
				&db.pool,
				&[1.0, 0.0, 0.0, 0.0],
				Some("case"),
				record.case_id,
				None,
				0.5,
				10,
			)
			.await?;

			assert_eq!(hits.len(), 1);
			assert!(hits[0].similarity > 0.99);

			Ok::<_, docket_storage::Error>(())
		};

		check
			.await
			.map_err(|err| docket_testkit::Error::Message(format!("Smoke test failed: {err}.")))
	})
	.await
	.expect("Failed to run database smoke test.");
}
