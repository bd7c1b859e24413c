//! Lexical relevance scoring for retrieval pools.
//!
//! Combines exact phrase matching, log-scaled keyword overlap, and word
//! proximity into a single [0, 1] score.

use std::collections::HashSet;

const PHRASE_WEIGHT: f32 = 0.5;
const KEYWORD_WEIGHT: f32 = 0.3;
const PROXIMITY_WEIGHT: f32 = 0.2;
const MIN_WORD_LEN: usize = 3;

const STOP_WORDS: &[&str] = &[
	"the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "from", "up",
	"about", "into", "through", "during", "before", "after", "above", "below", "between", "among",
	"this", "that", "these", "those", "was", "were", "been", "have", "has", "had", "will", "would",
	"could", "should", "may", "might", "can", "must",
];

pub fn text_similarity(query: &str, text: &str) -> f32 {
	let query_words = preprocess(query);
	let text_words = preprocess(text);

	if query_words.is_empty() || text_words.is_empty() {
		return 0.0;
	}

	let phrase = phrase_score(&query.to_lowercase(), &text.to_lowercase());
	let keyword = keyword_overlap(&query_words, &text_words);
	let proximity = word_proximity(&query_words, &text_words);
	let combined = phrase * PHRASE_WEIGHT + keyword * KEYWORD_WEIGHT + proximity * PROXIMITY_WEIGHT;

	combined.min(1.0)
}

/// Lowercases, strips punctuation, and drops short and stop words.
pub fn preprocess(text: &str) -> Vec<String> {
	let mut normalized = String::with_capacity(text.len());

	for ch in text.chars() {
		if ch.is_alphanumeric() || ch == '_' {
			normalized.extend(ch.to_lowercase());
		} else {
			normalized.push(' ');
		}
	}

	normalized
		.split_whitespace()
		.filter(|word| word.len() >= MIN_WORD_LEN && !is_stop_word(word))
		.map(str::to_string)
		.collect()
}

pub fn is_stop_word(word: &str) -> bool {
	STOP_WORDS.contains(&word)
}

/// Full-phrase containment scores 1.0; otherwise the fraction of query words
/// found verbatim in the text.
pub fn phrase_score(query_lower: &str, text_lower: &str) -> f32 {
	if text_lower.contains(query_lower) {
		return 1.0;
	}

	let phrases: Vec<&str> =
		query_lower.split_whitespace().filter(|word| word.len() >= MIN_WORD_LEN).collect();

	if phrases.is_empty() {
		return 0.0;
	}

	let matches = phrases.iter().filter(|phrase| text_lower.contains(**phrase)).count();

	matches as f32 / phrases.len() as f32
}

/// Coverage of query words in the text, weighted by log-scaled term frequency.
pub fn keyword_overlap(query_words: &[String], text_words: &[String]) -> f32 {
	if query_words.is_empty() {
		return 0.0;
	}

	let text_set: HashSet<&str> = text_words.iter().map(String::as_str).collect();
	let mut matches = 0_usize;
	let mut total_weight = 0.0_f32;

	for word in query_words {
		if text_set.contains(word.as_str()) {
			let frequency = text_words.iter().filter(|w| *w == word).count();

			matches += 1;
			total_weight +=
				((1 + frequency) as f32).ln() / ((text_words.len() + 1) as f32).ln();
		}
	}

	let coverage = matches as f32 / query_words.len() as f32;
	let intensity = total_weight / query_words.len() as f32;

	coverage * intensity
}

/// Average closeness of query word pairs within the text. Pairs that appear
/// near each other score close to 1; absent pairs contribute nothing.
pub fn word_proximity(query_words: &[String], text_words: &[String]) -> f32 {
	if query_words.len() < 2 {
		return 0.0;
	}

	let mut score = 0.0_f32;
	let mut pair_count = 0_usize;

	for i in 0..query_words.len() - 1 {
		for j in i + 1..query_words.len() {
			let pos_a = text_words.iter().position(|word| *word == query_words[i]);
			let pos_b = text_words.iter().position(|word| *word == query_words[j]);

			if let (Some(pos_a), Some(pos_b)) = (pos_a, pos_b) {
				let distance = pos_a.abs_diff(pos_b);

				score += (1.0 - distance as f32 / text_words.len() as f32).max(0.0);
				pair_count += 1;
			}
		}
	}

	if pair_count == 0 { 0.0 } else { score / pair_count as f32 }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn preprocess_drops_stop_and_short_words() {
		let words = preprocess("The fraud of an insurance scheme!");

		assert_eq!(words, vec!["fraud", "insurance", "scheme"]);
	}

	#[test]
	fn exact_phrase_scores_full_weight() {
		assert_eq!(phrase_score("wire fraud", "evidence of wire fraud found"), 1.0);
	}

	#[test]
	fn partial_phrase_scores_fractionally() {
		let score = phrase_score("wire fraud statute", "the fraud was documented");

		assert!((score - 1.0 / 3.0).abs() < 1e-6);
	}

	#[test]
	fn similarity_is_bounded() {
		let score =
			text_similarity("fraud scheme", "fraud scheme fraud scheme fraud scheme fraud scheme");

		assert!((0.0..=1.0).contains(&score));
		assert!(score > 0.5);
	}

	#[test]
	fn empty_inputs_score_zero() {
		assert_eq!(text_similarity("", "anything"), 0.0);
		assert_eq!(text_similarity("the of and", "anything"), 0.0);
	}

	#[test]
	fn proximity_rewards_adjacent_words() {
		let query = preprocess("fraud scheme");
		let near = preprocess("fraud scheme uncovered today with many additional filler words");
		let far = preprocess(
			"fraud was uncovered today with many additional filler words before the scheme",
		);

		assert!(word_proximity(&query, &near) > word_proximity(&query, &far));
	}

	#[test]
	fn single_word_query_has_no_proximity() {
		let query = preprocess("fraud");
		let text = preprocess("fraud everywhere");

		assert_eq!(word_proximity(&query, &text), 0.0);
	}
}
