//! Asynchronous synchronization from the primary store to the vector index.
//!
//! Events are queued in memory, drained in priority order, and applied in
//! batches. High-priority events wake the worker immediately; everything else
//! waits for the next processing tick. Failed events retry with a linear
//! backoff unless they were queued at low priority.

use std::{
	cmp::Reverse,
	sync::{Arc, Mutex},
};

use time::OffsetDateTime;
use uuid::Uuid;

use docket_config::Config;
use docket_storage::cache::MemoryCache;

use crate::{Error, RecordStore, Result, VectorIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SyncPriority {
	Low,
	Normal,
	High,
	Urgent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOperation {
	EntityCreated { entity_type: String, entity_id: String },
	EntityUpdated { entity_type: String, entity_id: String },
	/// A fresh vector was written to the canonical store for this entity.
	EmbeddingGenerated { entity_type: String, entity_id: String },
	EntityDeleted { record_id: Uuid },
	CaseDeleted { case_id: Uuid },
	BulkSyncRequested { entity_type: Option<String> },
	CacheInvalidated { case_id: Option<Uuid> },
}

#[derive(Debug, Clone)]
pub struct SyncEvent {
	pub operation: SyncOperation,
	pub priority: SyncPriority,
	pub queued_at: OffsetDateTime,
}
impl SyncEvent {
	pub fn new(operation: SyncOperation, priority: SyncPriority) -> Self {
		Self { operation, priority, queued_at: OffsetDateTime::now_utc() }
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncMetrics {
	pub events_processed: u64,
	pub events_failed: u64,
	pub avg_sync_latency_ms: f64,
	pub failure_rate: f64,
	pub queue_depth: usize,
	pub last_sync_time: Option<OffsetDateTime>,
}

#[derive(Debug, Default)]
struct MetricsInner {
	events_processed: u64,
	events_failed: u64,
	total_latency_ms: u64,
	last_sync_time: Option<OffsetDateTime>,
}

pub struct SyncService {
	cfg: Arc<Config>,
	store: Arc<dyn RecordStore>,
	index: Arc<dyn VectorIndex>,
	cache: Arc<MemoryCache>,
	queue: Mutex<Vec<SyncEvent>>,
	flush: tokio::sync::Notify,
	metrics: Mutex<MetricsInner>,
}
impl SyncService {
	pub fn new(
		cfg: Arc<Config>,
		store: Arc<dyn RecordStore>,
		index: Arc<dyn VectorIndex>,
		cache: Arc<MemoryCache>,
	) -> Self {
		Self {
			cfg,
			store,
			index,
			cache,
			queue: Mutex::new(Vec::new()),
			flush: tokio::sync::Notify::new(),
			metrics: Mutex::new(MetricsInner::default()),
		}
	}

	pub fn queue_event(&self, event: SyncEvent) {
		let wake = event.priority >= SyncPriority::High;
		let mut queue = self.queue.lock().unwrap_or_else(|err| err.into_inner());

		queue.push(event);

		drop(queue);

		if wake {
			self.flush.notify_one();
		}
	}

	pub fn sync_entity(&self, entity_type: &str, entity_id: &str) {
		self.queue_event(SyncEvent::new(
			SyncOperation::EntityUpdated {
				entity_type: entity_type.to_string(),
				entity_id: entity_id.to_string(),
			},
			SyncPriority::High,
		));
	}

	pub fn delete_entity(&self, record_id: Uuid) {
		self.queue_event(SyncEvent::new(
			SyncOperation::EntityDeleted { record_id },
			SyncPriority::High,
		));
	}

	pub fn delete_case(&self, case_id: Uuid) {
		self.queue_event(SyncEvent::new(
			SyncOperation::CaseDeleted { case_id },
			SyncPriority::Urgent,
		));
	}

	pub fn request_bulk_sync(&self, entity_type: Option<String>) {
		self.queue_event(SyncEvent::new(
			SyncOperation::BulkSyncRequested { entity_type },
			SyncPriority::Normal,
		));
	}

	pub fn invalidate_cache_for_case(&self, case_id: Option<Uuid>) {
		self.queue_event(SyncEvent::new(
			SyncOperation::CacheInvalidated { case_id },
			SyncPriority::High,
		));
	}

	pub fn queue_depth(&self) -> usize {
		self.queue.lock().unwrap_or_else(|err| err.into_inner()).len()
	}

	pub fn metrics(&self) -> SyncMetrics {
		let inner = self.metrics.lock().unwrap_or_else(|err| err.into_inner());
		let attempts = inner.events_processed + inner.events_failed;

		SyncMetrics {
			events_processed: inner.events_processed,
			events_failed: inner.events_failed,
			avg_sync_latency_ms: if inner.events_processed == 0 {
				0.0
			} else {
				inner.total_latency_ms as f64 / inner.events_processed as f64
			},
			failure_rate: if attempts == 0 {
				0.0
			} else {
				inner.events_failed as f64 / attempts as f64
			},
			queue_depth: self.queue_depth(),
			last_sync_time: inner.last_sync_time,
		}
	}

	/// Drains up to one batch of queued events, highest priority first.
	/// Returns the number of events taken off the queue.
	pub async fn process_queue(&self) -> usize {
		let batch = {
			let mut queue = self.queue.lock().unwrap_or_else(|err| err.into_inner());

			if queue.is_empty() {
				return 0;
			}

			// Stable sort keeps arrival order within a priority class.
			queue.sort_by_key(|event| Reverse(event.priority));

			let take = (self.cfg.sync.batch_size as usize).min(queue.len());

			queue.drain(..take).collect::<Vec<_>>()
		};
		let drained = batch.len();

		for event in batch {
			self.apply_with_retry(event).await;
		}

		drained
	}

	async fn apply_with_retry(&self, event: SyncEvent) {
		let started = std::time::Instant::now();
		// Low-priority events are best-effort and drop on the first failure.
		let max_attempts = if event.priority == SyncPriority::Low {
			1
		} else {
			1 + self.cfg.sync.max_retries
		};
		let mut attempt = 0;

		loop {
			attempt += 1;

			match self.apply_event(&event).await {
				Ok(()) => {
					let mut inner = self.metrics.lock().unwrap_or_else(|err| err.into_inner());

					inner.events_processed += 1;
					inner.total_latency_ms += started.elapsed().as_millis() as u64;
					inner.last_sync_time = Some(OffsetDateTime::now_utc());

					return;
				},
				Err(err) if attempt < max_attempts => {
					tracing::warn!(
						?event.operation,
						attempt,
						error = %err,
						"Sync event failed. Retrying."
					);

					tokio::time::sleep(std::time::Duration::from_millis(
						self.cfg.sync.retry_delay_ms * u64::from(attempt),
					))
					.await;
				},
				Err(err) => {
					tracing::error!(
						?event.operation,
						attempts = attempt,
						error = %err,
						"Sync event dropped after exhausting retries."
					);

					let mut inner = self.metrics.lock().unwrap_or_else(|err| err.into_inner());

					inner.events_failed += 1;

					return;
				},
			}
		}
	}

	async fn apply_event(&self, event: &SyncEvent) -> Result<()> {
		match &event.operation {
			// Creation, update, and re-embedding all converge on the same
			// read-then-upsert path.
			SyncOperation::EntityCreated { entity_type, entity_id }
			| SyncOperation::EntityUpdated { entity_type, entity_id }
			| SyncOperation::EmbeddingGenerated { entity_type, entity_id } =>
				self.apply_entity_updated(entity_type, entity_id).await,
			SyncOperation::EntityDeleted { record_id } => {
				self.index.delete_record(*record_id).await.map_err(|err| Error::SyncApplyFailed {
					message: format!("Failed to delete record {record_id} from the index: {err}"),
				})
			},
			SyncOperation::CaseDeleted { case_id } => {
				self.index.delete_by_case(*case_id).await.map_err(|err| {
					Error::SyncApplyFailed {
						message: format!("Failed to delete case {case_id} from the index: {err}"),
					}
				})?;
				self.cache.invalidate_case(Some(*case_id));

				Ok(())
			},
			SyncOperation::BulkSyncRequested { entity_type } =>
				self.apply_bulk_sync(entity_type.as_deref()).await,
			SyncOperation::CacheInvalidated { case_id } => {
				let removed = self.cache.invalidate_case(*case_id);

				tracing::debug!(?case_id, removed, "Invalidated cached search responses.");

				Ok(())
			},
		}
	}

	async fn apply_entity_updated(&self, entity_type: &str, entity_id: &str) -> Result<()> {
		let stored = self.store.fetch_record(entity_type, entity_id).await.map_err(|err| {
			Error::SyncApplyFailed {
				message: format!("Failed to load {entity_type}/{entity_id}: {err}"),
			}
		})?;
		// The row can disappear between queueing and processing.
		let Some(stored) = stored else {
			tracing::debug!(
				entity_type,
				entity_id,
				"Record vanished before sync. Skipping."
			);

			return Ok(());
		};

		self.index.upsert(std::slice::from_ref(&stored)).await.map_err(|err| {
			Error::SyncApplyFailed {
				message: format!("Failed to upsert {entity_type}/{entity_id}: {err}"),
			}
		})
	}

	async fn apply_bulk_sync(&self, entity_type: Option<&str>) -> Result<()> {
		let page_size = i64::from(self.cfg.sync.bulk_page_size);
		let mut offset = 0_i64;
		let mut total = 0_usize;

		loop {
			let page = self
				.store
				.scan_records(entity_type, None, page_size, offset)
				.await
				.map_err(|err| Error::SyncApplyFailed {
					message: format!("Bulk sync scan failed at offset {offset}: {err}"),
				})?;

			if page.is_empty() {
				break;
			}

			let fetched = page.len();

			self.index.upsert(&page).await.map_err(|err| Error::SyncApplyFailed {
				message: format!("Bulk sync upsert failed at offset {offset}: {err}"),
			})?;

			total += fetched;
			offset += page_size;

			if fetched < page_size as usize {
				break;
			}
		}

		tracing::info!(entity_type = ?entity_type, total, "Bulk sync completed.");

		Ok(())
	}

	/// Worker loop. Processes the queue on each tick or flush notification and
	/// runs the periodic duties on their own schedules.
	pub async fn run(self: Arc<Self>) {
		let sync_cfg = &self.cfg.sync;
		let mut last_poll = OffsetDateTime::now_utc();
		let mut last_full_sync = OffsetDateTime::now_utc();
		let mut last_cache_sweep = OffsetDateTime::now_utc();
		let mut last_metrics = OffsetDateTime::now_utc();

		tracing::info!("Sync service started.");

		loop {
			tokio::select! {
				_ = self.flush.notified() => {},
				_ = tokio::time::sleep(std::time::Duration::from_millis(sync_cfg.process_interval_ms)) => {},
			}

			self.process_queue().await;

			let now = OffsetDateTime::now_utc();

			if sync_cfg.poll_enabled
				&& (now - last_poll).whole_seconds() >= sync_cfg.poll_interval_secs
			{
				let since = last_poll;

				last_poll = now;

				match self.store.updated_since(since, i64::from(sync_cfg.batch_size)).await {
					Ok(refs) => {
						for record in refs {
							self.queue_event(SyncEvent::new(
								SyncOperation::EntityUpdated {
									entity_type: record.entity_type,
									entity_id: record.entity_id,
								},
								SyncPriority::Normal,
							));
						}
					},
					Err(err) => {
						tracing::warn!(error = %err, "Change poll failed.");
					},
				}
			}
			if (now - last_full_sync).whole_seconds() >= sync_cfg.full_sync_interval_secs {
				last_full_sync = now;

				match self.store.entity_types().await {
					Ok(types) =>
						for entity_type in types {
							self.queue_event(SyncEvent::new(
								SyncOperation::BulkSyncRequested {
									entity_type: Some(entity_type),
								},
								SyncPriority::Low,
							));
						},
					Err(err) => {
						tracing::warn!(error = %err, "Full sync scheduling failed.");
					},
				}
			}
			if (now - last_cache_sweep).whole_seconds() >= sync_cfg.cache_sweep_interval_secs {
				last_cache_sweep = now;

				let purged = self.cache.purge_expired(now);

				if purged > 0 {
					tracing::debug!(purged, "Swept expired cache entries.");
				}
			}
			if (now - last_metrics).whole_seconds() >= sync_cfg.metrics_interval_secs {
				last_metrics = now;

				let metrics = self.metrics();

				tracing::info!(
					events_processed = metrics.events_processed,
					events_failed = metrics.events_failed,
					avg_sync_latency_ms = metrics.avg_sync_latency_ms,
					failure_rate = metrics.failure_rate,
					queue_depth = metrics.queue_depth,
					"Sync metrics."
				);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn priorities_order_low_to_urgent() {
		assert!(SyncPriority::Low < SyncPriority::Normal);
		assert!(SyncPriority::Normal < SyncPriority::High);
		assert!(SyncPriority::High < SyncPriority::Urgent);
	}
}
