//! Merge pipeline behavior over hand-built retrieval pools.

use serde_json::Value;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use docket_config::Retrieval;
use docket_service::retrieval::{
	Source, SourceType,
	merge::{Preferences, merge_sources},
};

fn now() -> OffsetDateTime {
	OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
}

fn source(kind: &str, title: &str, relevance: f32, source_type: SourceType) -> Source {
	Source {
		id: Uuid::new_v4().to_string(),
		kind: kind.to_string(),
		title: title.to_string(),
		content: String::new(),
		relevance,
		source_type,
		case_id: None,
		last_used: None,
		metadata: Value::Null,
	}
}

#[test]
fn duplicate_titles_keep_the_higher_scored_copy() {
	let personal = vec![source("saved_item", "Fraud Scheme Notes", 0.5, SourceType::Personal)];
	let global = vec![
		source("case", "Fraud Scheme", 0.8, SourceType::Global),
		source("case", "FRAUD SCHEME", 0.6, SourceType::Global),
	];
	let merged = merge_sources(
		vec![personal, global],
		&Preferences::default(),
		None,
		now(),
		&Retrieval::default(),
	);

	assert_eq!(merged.len(), 2);
	assert_eq!(merged[0].title, "Fraud Scheme");
	assert_eq!(merged[0].relevance, 0.8);
}

#[test]
fn personal_source_wins_a_close_tie_against_global() {
	let pools = vec![
		vec![source("saved_item", "My fraud checklist", 0.78, SourceType::Personal)],
		vec![source("case", "State v. Doe", 0.84, SourceType::Global)],
	];
	let merged = merge_sources(
		pools,
		&Preferences::default(),
		None,
		now(),
		&Retrieval::default(),
	);

	assert_eq!(merged[0].source_type, SourceType::Personal);
	assert_eq!(merged[1].source_type, SourceType::Global);
}

#[test]
fn personal_source_does_not_jump_a_clear_gap() {
	let pools = vec![
		vec![source("saved_item", "My fraud checklist", 0.5, SourceType::Personal)],
		vec![source("case", "State v. Doe", 0.9, SourceType::Global)],
	];
	let merged = merge_sources(
		pools,
		&Preferences::default(),
		None,
		now(),
		&Retrieval::default(),
	);

	assert_eq!(merged[0].source_type, SourceType::Global);
}

#[test]
fn preferred_kind_boost_is_clamped_to_one() {
	let pools = vec![vec![source("statute", "Penal code 187", 0.9, SourceType::Global)]];
	let prefs =
		Preferences { preferred_kinds: vec!["statute".to_string()], excluded_kinds: Vec::new() };
	let merged = merge_sources(pools, &prefs, None, now(), &Retrieval::default());

	assert_eq!(merged[0].relevance, 1.0);
}

#[test]
fn excluded_kind_is_penalized_but_can_survive() {
	let pools = vec![vec![source("evidence", "Bank statements", 0.8, SourceType::Global)]];
	let prefs =
		Preferences { preferred_kinds: Vec::new(), excluded_kinds: vec!["evidence".to_string()] };
	let merged = merge_sources(pools, &prefs, None, now(), &Retrieval::default());

	assert_eq!(merged.len(), 1);
	assert!((merged[0].relevance - 0.32).abs() < 1e-6);
}

#[test]
fn same_case_sources_are_boosted() {
	let case_id = Uuid::new_v4();
	let mut matching = source("evidence", "Ledger", 0.5, SourceType::Global);
	let other = source("evidence", "Receipts", 0.5, SourceType::Global);

	matching.case_id = Some(case_id);

	let merged = merge_sources(
		vec![vec![matching, other]],
		&Preferences::default(),
		Some(case_id),
		now(),
		&Retrieval::default(),
	);

	assert_eq!(merged[0].title, "Ledger");
	assert!((merged[0].relevance - 0.6).abs() < 1e-6);
	assert_eq!(merged[1].relevance, 0.5);
}

#[test]
fn recently_used_personal_sources_get_a_recency_lift() {
	let mut fresh = source("saved_item", "Fraud checklist", 0.5, SourceType::Personal);
	let mut stale = source("saved_item", "Shelved notes", 0.5, SourceType::Personal);

	fresh.last_used = Some(now() - Duration::days(1));
	stale.last_used = Some(now() - Duration::days(30));

	let merged = merge_sources(
		vec![vec![fresh, stale]],
		&Preferences::default(),
		None,
		now(),
		&Retrieval::default(),
	);

	assert_eq!(merged[0].title, "Fraud checklist");
	assert!((merged[0].relevance - 0.65).abs() < 1e-6);
	assert_eq!(merged[1].relevance, 0.5);
}

#[test]
fn non_personal_sources_get_no_recency_lift() {
	let mut filing = source("case", "New filing", 0.5, SourceType::Global);

	filing.last_used = Some(now() - Duration::days(1));

	let merged = merge_sources(
		vec![vec![filing]],
		&Preferences::default(),
		None,
		now(),
		&Retrieval::default(),
	);

	assert_eq!(merged[0].relevance, 0.5);
}

#[test]
fn recently_used_personal_notes_win_against_the_current_case() {
	// Pool relevances already carry the rating, usage and personal boosts; the
	// merge adds the last-used lift (0.6 -> 0.78) against the current-case
	// lift (0.7 -> 0.84), leaving a gap the personal note wins as a near tie.
	let case_id = Uuid::new_v4();
	let mut notes = source("saved_item", "Fraud scheme notes", 0.6, SourceType::Personal);
	let mut investigation =
		source("case", "Fraud Scheme Investigation", 0.7, SourceType::Global);

	notes.last_used = Some(now() - Duration::days(1));
	investigation.case_id = Some(case_id);

	let merged = merge_sources(
		vec![vec![notes], vec![investigation]],
		&Preferences::default(),
		Some(case_id),
		now(),
		&Retrieval::default(),
	);

	assert_eq!(merged[0].title, "Fraud scheme notes");
	assert_eq!(merged[1].title, "Fraud Scheme Investigation");
	assert!((merged[0].relevance - 0.78).abs() < 1e-6);
	assert!((merged[1].relevance - 0.84).abs() < 1e-6);
}

#[test]
fn merge_floors_and_truncates() {
	let mut pools = vec![source("case", "Below floor", 0.01, SourceType::Global)];

	for i in 0..15 {
		pools.push(source("case", &format!("Case {i}"), 0.9 - i as f32 * 0.01, SourceType::Global));
	}

	let cfg = Retrieval::default();
	let merged = merge_sources(vec![pools], &Preferences::default(), None, now(), &cfg);

	assert_eq!(merged.len(), cfg.top_sources as usize);
	assert!(merged.iter().all(|source| source.relevance >= cfg.merge_floor));
}
