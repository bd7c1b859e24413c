//! Fire-and-forget usage accounting for saved items returned by retrieval.

use tokio::sync::mpsc;
use uuid::Uuid;

use docket_storage::{db::Db, queries};

/// Batches of item ids flow through an unbounded channel to a background task,
/// so retrieval never waits on the usage write.
#[derive(Clone)]
pub struct UsageTracker {
	tx: mpsc::UnboundedSender<Vec<Uuid>>,
}
impl UsageTracker {
	pub fn spawn(db: Db) -> Self {
		let (tx, mut rx) = mpsc::unbounded_channel::<Vec<Uuid>>();

		tokio::spawn(async move {
			while let Some(item_ids) = rx.recv().await {
				if let Err(err) = queries::bump_saved_item_usage(&db.pool, &item_ids).await {
					tracing::warn!(
						count = item_ids.len(),
						error = %err,
						"Failed to record saved item usage."
					);
				}
			}
		});

		Self { tx }
	}

	pub fn track(&self, item_ids: Vec<Uuid>) {
		if item_ids.is_empty() {
			return;
		}
		if self.tx.send(item_ids).is_err() {
			tracing::warn!("Usage tracker task is gone. Dropping usage update.");
		}
	}
}
