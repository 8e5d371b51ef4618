//! Periodic sweep for requests whose response deadline has passed.
//!
//! Overdue requests are only reported; nothing transitions automatically.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clubflow_core::types::DbId;
use tokio_util::sync::CancellationToken;

use crate::error::WorkflowResult;
use crate::store::WorkflowStore;

/// Run one sweep and return the ids of overdue requests.
pub async fn sweep_once(store: &dyn WorkflowStore, limit: i64) -> WorkflowResult<Vec<DbId>> {
    let now = Utc::now();
    let overdue = store.list_overdue(now, limit).await?;

    for request in &overdue {
        tracing::warn!(
            request_id = request.id,
            state = %request.state,
            reviewer_id = ?request.reviewer_id,
            deadline_at = ?request.deadline_at,
            "Club request is past its response deadline"
        );
    }

    Ok(overdue.into_iter().map(|r| r.id).collect())
}

/// Run the deadline sweep loop until `cancel` is triggered.
pub async fn run(
    store: Arc<dyn WorkflowStore>,
    interval: Duration,
    limit: i64,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), limit, "Deadline sweep started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Deadline sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                match sweep_once(store.as_ref(), limit).await {
                    Ok(ids) if ids.is_empty() => tracing::debug!("Deadline sweep: nothing overdue"),
                    Ok(ids) => tracing::info!(overdue = ids.len(), "Deadline sweep finished"),
                    Err(e) => tracing::error!(error = %e, "Deadline sweep failed"),
                }
            }
        }
    }
}
