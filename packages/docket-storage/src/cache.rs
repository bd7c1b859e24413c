//! In-memory TTL cache for search responses.
//!
//! Entries expire on read, can be invalidated per case, and track hit counts.
//! A poisoned lock degrades every operation to a miss or a no-op instead of
//! erroring.

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct CacheEntry {
	pub value: Value,
	pub expires_at: OffsetDateTime,
	pub hit_count: u64,
	pub last_accessed_at: OffsetDateTime,
	pub case_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
	pub entries: usize,
	pub total_hits: u64,
}

#[derive(Debug, Default)]
pub struct MemoryCache {
	entries: Mutex<HashMap<String, CacheEntry>>,
}
impl MemoryCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// An expired entry is removed and reads as a miss.
	pub fn get(&self, key: &str, now: OffsetDateTime) -> Option<Value> {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
		let entry = entries.get_mut(key)?;

		if entry.expires_at <= now {
			entries.remove(key);

			return None;
		}

		entry.hit_count += 1;
		entry.last_accessed_at = now;

		Some(entry.value.clone())
	}

	/// Inserting with a non-positive TTL is a no-op, so `expires_at` is always
	/// in the future at insertion.
	pub fn insert(
		&self,
		key: String,
		value: Value,
		ttl: Duration,
		case_id: Option<Uuid>,
		now: OffsetDateTime,
	) {
		if ttl <= Duration::ZERO {
			return;
		}

		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		entries.insert(
			key,
			CacheEntry {
				value,
				expires_at: now + ttl,
				hit_count: 0,
				last_accessed_at: now,
				case_id,
			},
		);
	}

	/// Removes entries tagged with the given case. `None` removes the entries
	/// that carry no case tag.
	pub fn invalidate_case(&self, case_id: Option<Uuid>) -> usize {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
		let before = entries.len();

		entries.retain(|_, entry| entry.case_id != case_id);

		before - entries.len()
	}

	pub fn purge_expired(&self, now: OffsetDateTime) -> usize {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
		let before = entries.len();

		entries.retain(|_, entry| entry.expires_at > now);

		before - entries.len()
	}

	pub fn clear(&self) -> usize {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());
		let before = entries.len();

		entries.clear();

		before
	}

	pub fn stats(&self) -> CacheStats {
		let entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		CacheStats {
			entries: entries.len(),
			total_hits: entries.values().map(|entry| entry.hit_count).sum(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn now() -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(1_700_000_000).expect("valid timestamp")
	}

	#[test]
	fn hit_within_ttl_counts_and_stamps() {
		let cache = MemoryCache::new();
		let t0 = now();

		cache.insert("k".into(), Value::from(1), Duration::minutes(60), None, t0);

		let t1 = t0 + Duration::minutes(10);

		assert_eq!(cache.get("k", t1), Some(Value::from(1)));
		assert_eq!(cache.stats(), CacheStats { entries: 1, total_hits: 1 });
	}

	#[test]
	fn expired_entry_is_a_miss_and_removed() {
		let cache = MemoryCache::new();
		let t0 = now();

		cache.insert("k".into(), Value::from(1), Duration::minutes(60), None, t0);

		let t1 = t0 + Duration::minutes(61);

		assert_eq!(cache.get("k", t1), None);
		assert_eq!(cache.stats().entries, 0);
	}

	#[test]
	fn nonpositive_ttl_is_rejected() {
		let cache = MemoryCache::new();

		cache.insert("k".into(), Value::from(1), Duration::ZERO, None, now());

		assert_eq!(cache.stats().entries, 0);
	}

	#[test]
	fn case_invalidation_is_targeted() {
		let cache = MemoryCache::new();
		let t0 = now();
		let case_a = Uuid::new_v4();
		let case_b = Uuid::new_v4();

		cache.insert("a".into(), Value::from(1), Duration::minutes(60), Some(case_a), t0);
		cache.insert("b".into(), Value::from(2), Duration::minutes(60), Some(case_b), t0);
		cache.insert("c".into(), Value::from(3), Duration::minutes(60), None, t0);

		assert_eq!(cache.invalidate_case(Some(case_a)), 1);
		assert_eq!(cache.get("a", t0), None);
		assert!(cache.get("b", t0).is_some());
		assert!(cache.get("c", t0).is_some());

		assert_eq!(cache.invalidate_case(None), 1);
		assert_eq!(cache.get("c", t0), None);
	}

	#[test]
	fn purge_removes_only_expired_entries() {
		let cache = MemoryCache::new();
		let t0 = now();

		cache.insert("short".into(), Value::from(1), Duration::minutes(1), None, t0);
		cache.insert("long".into(), Value::from(2), Duration::minutes(60), None, t0);

		assert_eq!(cache.purge_expired(t0 + Duration::minutes(5)), 1);
		assert_eq!(cache.stats().entries, 1);
	}
}
