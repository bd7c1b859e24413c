//! Pure merge pipeline over the retrieval pools.
//!
//! Order matters: preference adjustments and contextual boosts run before
//! deduplication so the surviving duplicate carries its final score, and the
//! relevance floor runs after both so a penalized source can still drop out.

use time::OffsetDateTime;

use docket_config::Retrieval;
use docket_domain::boost;

use crate::{
	retrieval::{Source, SourceType},
	search::cmp_f32_desc,
};

/// Relevance gap under which a personal source outranks a non-personal one.
const PERSONAL_TIE_GAP: f32 = 0.1;

#[derive(Debug, Clone, Default)]
pub struct Preferences {
	pub preferred_kinds: Vec<String>,
	pub excluded_kinds: Vec<String>,
}

pub fn merge_sources(
	pools: Vec<Vec<Source>>,
	prefs: &Preferences,
	current_case: Option<uuid::Uuid>,
	now: OffsetDateTime,
	cfg: &Retrieval,
) -> Vec<Source> {
	let mut sources: Vec<Source> = pools.into_iter().flatten().collect();

	for source in &mut sources {
		if prefs.preferred_kinds.iter().any(|kind| kind == &source.kind) {
			source.relevance = boost::clamp01(source.relevance * boost::PREFERRED_SOURCE_BOOST);
		}
		if prefs.excluded_kinds.iter().any(|kind| kind == &source.kind) {
			source.relevance *= boost::EXCLUDED_SOURCE_PENALTY;
		}
		if current_case.is_some() && source.case_id == current_case {
			source.relevance = boost::clamp01(source.relevance * boost::SAME_CASE_BOOST);
		}
		// Only personal sources earn the recency lift, keyed on last use.
		if source.source_type == SourceType::Personal
			&& let Some(last_used) = source.last_used
		{
			let days_since_used = (now - last_used).whole_hours() as f32 / 24.0;

			source.relevance = boost::recency_boost(source.relevance, days_since_used);
		}
	}

	let mut deduped: Vec<Source> = Vec::with_capacity(sources.len());

	for source in sources {
		let key = dedupe_key(&source);

		match deduped.iter_mut().find(|existing| dedupe_key(existing) == key) {
			Some(existing) =>
				if source.relevance > existing.relevance {
					*existing = source;
				},
			None => deduped.push(source),
		}
	}

	deduped.retain(|source| source.relevance >= cfg.merge_floor);
	deduped.sort_by(|a, b| cmp_f32_desc(a.relevance, b.relevance));
	promote_personal_ties(&mut deduped);
	deduped.truncate(cfg.top_sources as usize);

	deduped
}

fn dedupe_key(source: &Source) -> (&str, String) {
	(source.kind.as_str(), source.title.to_lowercase())
}

/// Moves each personal source ahead of the non-personal neighbors it is within
/// [`PERSONAL_TIE_GAP`] of. A plain comparator encoding this rule would not be
/// a total order, so the pass runs after the relevance sort instead.
fn promote_personal_ties(sources: &mut [Source]) {
	for i in 1..sources.len() {
		if sources[i].source_type != SourceType::Personal {
			continue;
		}

		let mut j = i;

		while j > 0
			&& sources[j - 1].source_type != SourceType::Personal
			&& sources[j - 1].relevance - sources[j].relevance < PERSONAL_TIE_GAP
		{
			sources.swap(j - 1, j);

			j -= 1;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn source(kind: &str, title: &str, relevance: f32, source_type: SourceType) -> Source {
		Source {
			id: title.to_string(),
			kind: kind.to_string(),
			title: title.to_string(),
			content: String::new(),
			relevance,
			source_type,
			case_id: None,
			last_used: None,
			metadata: serde_json::Value::Null,
		}
	}

	#[test]
	fn personal_wins_a_close_tie_but_not_a_clear_loss() {
		let mut sources = vec![
			source("case", "a", 0.85, SourceType::Global),
			source("saved_item", "b", 0.80, SourceType::Personal),
			source("statute", "c", 0.50, SourceType::Global),
			source("saved_item", "d", 0.30, SourceType::Personal),
		];

		promote_personal_ties(&mut sources);

		assert_eq!(sources[0].title, "b");
		assert_eq!(sources[1].title, "a");
		assert_eq!(sources[2].title, "c");
		assert_eq!(sources[3].title, "d");
	}

	#[test]
	fn dedupe_is_case_insensitive_and_keeps_the_higher_score() {
		let pools = vec![vec![
			source("case", "Fraud Scheme", 0.6, SourceType::Global),
			source("case", "fraud scheme", 0.8, SourceType::Global),
		]];
		let merged = merge_sources(
			pools,
			&Preferences::default(),
			None,
			OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp"),
			&Retrieval::default(),
		);

		assert_eq!(merged.len(), 1);
		assert_eq!(merged[0].relevance, 0.8);
	}

	#[test]
	fn excluded_kind_can_fall_through_the_floor() {
		let pools = vec![vec![source("statute", "s", 0.1, SourceType::Global)]];
		let prefs =
			Preferences { preferred_kinds: Vec::new(), excluded_kinds: vec!["statute".to_string()] };
		let merged = merge_sources(
			pools,
			&prefs,
			None,
			OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp"),
			&Retrieval::default(),
		);

		assert!(merged.is_empty());
	}
}
