//! Multi-source retrieval aggregation.
//!
//! Three pools are gathered concurrently: the user's saved items, the global
//! case corpus (cases, evidence, statutes), and the public knowledge base.
//! Each pool scores its candidates lexically, then a pure merge pipeline
//! applies preferences and contextual boosts, deduplicates, and picks the top
//! sources. A pool failure degrades that pool to empty instead of failing the
//! whole request.

pub mod merge;

use std::{sync::Arc, time::Instant};

use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;
use uuid::Uuid;

use docket_config::Config;
use docket_domain::{boost, scoring};
use docket_storage::{db::Db, queries};

use crate::{Result, retrieval::merge::Preferences, usage::UsageTracker};

const CURRENT_CASE_RELEVANCE: f32 = 0.95;
const CASE_MIN_RAW_SCORE: f32 = 0.2;
const CASE_DAMPER: f32 = 0.8;
const EVIDENCE_MIN_RAW_SCORE: f32 = 0.15;
const EVIDENCE_DAMPER: f32 = 0.75;
const STATUTE_MIN_RAW_SCORE: f32 = 0.15;
const STATUTE_DAMPER: f32 = 0.8;
const KNOWLEDGE_BASE_DAMPER: f32 = 0.9;
const GLOBAL_FETCH_LIMIT: i64 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
	Personal,
	Global,
	KnowledgeBase,
}

#[derive(Debug, Clone, Serialize)]
pub struct Source {
	pub id: String,
	/// Concrete kind of the underlying row, e.g. `saved_item` or `statute`.
	pub kind: String,
	pub title: String,
	pub content: String,
	pub relevance: f32,
	pub source_type: SourceType,
	pub case_id: Option<Uuid>,
	/// When the user last opened this source. Only saved items carry it; the
	/// merge recency lift keys on it.
	#[serde(skip)]
	pub last_used: Option<OffsetDateTime>,
	pub metadata: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalMetadata {
	pub personal_count: usize,
	pub global_count: usize,
	pub knowledge_base_count: usize,
	pub total_candidates: usize,
	pub preferences_applied: bool,
	pub query_time_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievedContext {
	pub sources: Vec<Source>,
	pub metadata: RetrievalMetadata,
}

pub struct RetrievalService {
	cfg: Arc<Config>,
	db: Db,
	usage: UsageTracker,
}
impl RetrievalService {
	pub fn new(cfg: Arc<Config>, db: Db, usage: UsageTracker) -> Self {
		Self { cfg, db, usage }
	}

	pub async fn retrieve(
		&self,
		query: &str,
		user_id: Option<Uuid>,
		case_id: Option<Uuid>,
	) -> Result<RetrievedContext> {
		let started = Instant::now();
		let (personal, global, knowledge_base) = tokio::join!(
			self.personal_sources(query, user_id),
			self.global_sources(query, case_id),
			self.knowledge_base_sources(query),
		);
		let personal = sources_or_empty(personal, "personal");
		let global = sources_or_empty(global, "global");
		let knowledge_base = sources_or_empty(knowledge_base, "knowledge_base");
		let prefs = match user_id {
			Some(user_id) => self.load_preferences(user_id).await,
			None => Preferences::default(),
		};
		let metadata = RetrievalMetadata {
			personal_count: personal.len(),
			global_count: global.len(),
			knowledge_base_count: knowledge_base.len(),
			total_candidates: personal.len() + global.len() + knowledge_base.len(),
			preferences_applied: !prefs.preferred_kinds.is_empty()
				|| !prefs.excluded_kinds.is_empty(),
			query_time_ms: 0,
		};
		let sources = merge::merge_sources(
			vec![personal, global, knowledge_base],
			&prefs,
			case_id,
			OffsetDateTime::now_utc(),
			&self.cfg.retrieval,
		);
		let used_items = sources
			.iter()
			.filter(|source| source.source_type == SourceType::Personal)
			.filter_map(|source| Uuid::parse_str(&source.id).ok())
			.collect::<Vec<_>>();

		self.usage.track(used_items);

		Ok(RetrievedContext {
			sources,
			metadata: RetrievalMetadata {
				query_time_ms: started.elapsed().as_millis() as u64,
				..metadata
			},
		})
	}

	async fn personal_sources(&self, query: &str, user_id: Option<Uuid>) -> Result<Vec<Source>> {
		let Some(user_id) = user_id else { return Ok(Vec::new()) };
		let cfg = &self.cfg.retrieval;
		let items = queries::saved_items_for_user(
			&self.db.pool,
			user_id,
			i64::from(cfg.personal_fetch_limit),
		)
		.await?;
		let mut sources = items
			.into_iter()
			.filter_map(|item| {
				let haystack = format!("{} {}", item.title, item.content);
				let mut relevance = scoring::text_similarity(query, &haystack);

				relevance = boost::rating_boost(relevance, item.user_rating);
				relevance = boost::usage_boost(relevance, item.usage_count);
				relevance = boost::clamp01(relevance * boost::PERSONAL_SOURCE_BOOST);

				if relevance < cfg.min_personal_relevance {
					return None;
				}

				Some(Source {
					id: item.item_id.to_string(),
					kind: "saved_item".to_string(),
					title: item.title,
					content: item.content,
					relevance,
					source_type: SourceType::Personal,
					case_id: None,
					last_used: item.last_used_at,
					metadata: json!({
						"content_type": item.content_type,
						"user_rating": item.user_rating,
						"usage_count": item.usage_count,
						"tags": item.tags,
					}),
				})
			})
			.collect::<Vec<_>>();

		sources.sort_by(|a, b| crate::search::cmp_f32_desc(a.relevance, b.relevance));
		sources.truncate(cfg.personal_top as usize);

		Ok(sources)
	}

	async fn global_sources(&self, query: &str, case_id: Option<Uuid>) -> Result<Vec<Source>> {
		let cfg = &self.cfg.retrieval;
		let pattern = queries::ilike_pattern(query);
		let mut sources = Vec::new();

		// The case the user is working in is always relevant.
		if let Some(case_id) = case_id
			&& let Some(case) = queries::fetch_case(&self.db.pool, case_id).await?
		{
			sources.push(Source {
				id: case.case_id.to_string(),
				kind: "case".to_string(),
				title: case.title,
				content: case.description.unwrap_or_default(),
				relevance: CURRENT_CASE_RELEVANCE,
				source_type: SourceType::Global,
				case_id: Some(case.case_id),
				last_used: None,
				metadata: json!({ "current_case": true, "tags": case.tags }),
			});
		}

		let cases =
			queries::search_cases(&self.db.pool, &pattern, case_id, GLOBAL_FETCH_LIMIT).await?;

		for case in cases {
			let haystack =
				format!("{} {}", case.title, case.description.clone().unwrap_or_default());
			let raw = scoring::text_similarity(query, &haystack);

			if raw <= CASE_MIN_RAW_SCORE {
				continue;
			}

			sources.push(Source {
				id: case.case_id.to_string(),
				kind: "case".to_string(),
				title: case.title,
				content: case.description.unwrap_or_default(),
				relevance: raw * CASE_DAMPER,
				source_type: SourceType::Global,
				case_id: Some(case.case_id),
				last_used: None,
				metadata: json!({ "tags": case.tags }),
			});
		}

		let evidence =
			queries::search_evidence(&self.db.pool, &pattern, GLOBAL_FETCH_LIMIT).await?;

		for item in evidence {
			let haystack =
				format!("{} {}", item.title, item.description.clone().unwrap_or_default());
			let raw = scoring::text_similarity(query, &haystack);

			if raw <= EVIDENCE_MIN_RAW_SCORE {
				continue;
			}

			sources.push(Source {
				id: item.evidence_id.to_string(),
				kind: "evidence".to_string(),
				title: item.title,
				content: item.description.unwrap_or_default(),
				relevance: raw * EVIDENCE_DAMPER,
				source_type: SourceType::Global,
				case_id: item.case_id,
				last_used: None,
				metadata: Value::Null,
			});
		}

		let statutes =
			queries::search_statutes(&self.db.pool, &pattern, GLOBAL_FETCH_LIMIT).await?;

		for statute in statutes {
			let haystack = format!("{} {}", statute.title, statute.content);
			let raw = scoring::text_similarity(query, &haystack);

			if raw <= STATUTE_MIN_RAW_SCORE {
				continue;
			}

			sources.push(Source {
				id: statute.statute_id.to_string(),
				kind: "statute".to_string(),
				title: statute.title,
				content: statute.content,
				relevance: raw * STATUTE_DAMPER,
				source_type: SourceType::Global,
				case_id: None,
				last_used: None,
				metadata: Value::Null,
			});
		}

		sources.retain(|source| source.relevance >= cfg.min_global_relevance);
		sources.sort_by(|a, b| crate::search::cmp_f32_desc(a.relevance, b.relevance));
		sources.truncate(cfg.global_top as usize);

		Ok(sources)
	}

	async fn knowledge_base_sources(&self, query: &str) -> Result<Vec<Source>> {
		let cfg = &self.cfg.retrieval;
		let pattern = queries::ilike_pattern(query);
		let entries =
			queries::search_knowledge_base(&self.db.pool, &pattern, GLOBAL_FETCH_LIMIT).await?;
		let mut sources = entries
			.into_iter()
			.filter_map(|entry| {
				let haystack = format!("{} {}", entry.title, entry.content);
				let relevance =
					scoring::text_similarity(query, &haystack) * KNOWLEDGE_BASE_DAMPER;

				if relevance < cfg.min_knowledge_base_relevance {
					return None;
				}

				Some(Source {
					id: entry.entry_id.to_string(),
					kind: "knowledge_base".to_string(),
					title: entry.title,
					content: entry.content,
					relevance,
					source_type: SourceType::KnowledgeBase,
					case_id: None,
					last_used: None,
					metadata: json!({
						"confidence_score": entry.confidence_score,
						"tags": entry.tags,
					}),
				})
			})
			.collect::<Vec<_>>();

		sources.sort_by(|a, b| crate::search::cmp_f32_desc(a.relevance, b.relevance));
		sources.truncate(cfg.knowledge_base_top as usize);

		Ok(sources)
	}

	/// Missing or malformed preferences degrade to the defaults.
	async fn load_preferences(&self, user_id: Uuid) -> Preferences {
		match queries::fetch_user_preferences(&self.db.pool, user_id).await {
			Ok(Some(prefs)) => Preferences {
				preferred_kinds: string_list(&prefs.preferred_sources),
				excluded_kinds: string_list(&prefs.excluded_sources),
			},
			Ok(None) => Preferences::default(),
			Err(err) => {
				tracing::warn!(%user_id, error = %err, "Failed to load search preferences.");

				Preferences::default()
			},
		}
	}
}

fn string_list(value: &Value) -> Vec<String> {
	value
		.as_array()
		.map(|items| {
			items.iter().filter_map(|item| item.as_str().map(str::to_string)).collect()
		})
		.unwrap_or_default()
}

fn sources_or_empty(result: Result<Vec<Source>>, pool: &str) -> Vec<Source> {
	match result {
		Ok(sources) => sources,
		Err(err) => {
			tracing::warn!(pool, error = %err, "Retrieval pool failed. Continuing without it.");

			Vec::new()
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::Error;

	#[test]
	fn failed_pool_degrades_to_empty() {
		let failed: Result<Vec<Source>> =
			Err(Error::Storage { message: "connection reset".to_string() });

		assert!(sources_or_empty(failed, "personal").is_empty());
	}

	#[test]
	fn string_list_ignores_non_strings() {
		let value = json!(["case", 7, "statute", null]);

		assert_eq!(string_list(&value), vec!["case".to_string(), "statute".to_string()]);
		assert_eq!(string_list(&Value::Null), Vec::<String>::new());
	}
}
