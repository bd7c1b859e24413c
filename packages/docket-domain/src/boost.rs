//! Relevance boost helpers. Every boost clamps its output to [0, 1].

pub const PERSONAL_SOURCE_BOOST: f32 = 1.3;
pub const PREFERRED_SOURCE_BOOST: f32 = 1.4;
pub const EXCLUDED_SOURCE_PENALTY: f32 = 0.4;
pub const SAME_CASE_BOOST: f32 = 1.2;
pub const RECENCY_WINDOW_DAYS: f32 = 7.0;

pub fn clamp01(value: f32) -> f32 {
	if value.is_nan() {
		return 0.0;
	}

	value.clamp(0.0, 1.0)
}

/// Ratings above 3 lift relevance by 20% per star.
pub fn rating_boost(relevance: f32, rating: Option<i32>) -> f32 {
	let Some(rating) = rating else { return relevance };

	if rating <= 3 {
		return relevance;
	}

	relevance * (1.0 + (rating - 3) as f32 * 0.2)
}

/// Items used more than twice get a logarithmic usage lift.
pub fn usage_boost(relevance: f32, usage_count: i64) -> f32 {
	if usage_count <= 2 {
		return relevance;
	}

	relevance * (1.0 + (usage_count as f32).ln() * 0.1)
}

/// Personal sources used within the last week get a linear recency lift.
pub fn recency_boost(relevance: f32, days_since_used: f32) -> f32 {
	if !(0.0..RECENCY_WINDOW_DAYS).contains(&days_since_used) {
		return relevance;
	}

	clamp01(relevance * (1.0 + (RECENCY_WINDOW_DAYS - days_since_used) * 0.05))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn low_ratings_do_not_boost() {
		assert_eq!(rating_boost(0.5, Some(3)), 0.5);
		assert_eq!(rating_boost(0.5, None), 0.5);
	}

	#[test]
	fn five_star_rating_boosts_forty_percent() {
		assert!((rating_boost(0.5, Some(5)) - 0.7).abs() < 1e-6);
	}

	#[test]
	fn usage_boost_kicks_in_above_two() {
		assert_eq!(usage_boost(0.5, 2), 0.5);
		assert!(usage_boost(0.5, 10) > 0.5);
	}

	#[test]
	fn recency_boost_is_clamped_and_windowed() {
		assert_eq!(recency_boost(0.5, 8.0), 0.5);
		assert!(recency_boost(0.9, 0.0) <= 1.0);
		assert!(recency_boost(0.5, 1.0) > recency_boost(0.5, 6.0));
	}

	#[test]
	fn clamp_handles_nan_and_overflow() {
		assert_eq!(clamp01(f32::NAN), 0.0);
		assert_eq!(clamp01(1.4), 1.0);
		assert_eq!(clamp01(-0.2), 0.0);
	}
}
