//! Reports approved requests that still have no club.
//!
//! Read-only: it lists the pending outbox rows so an operator can see
//! provisioning that keeps failing. Retrying is `provisioning_retry`'s job.

use std::sync::Arc;
use std::time::Duration;

use clubflow_core::types::DbId;
use tokio_util::sync::CancellationToken;

use crate::error::WorkflowResult;
use crate::store::WorkflowStore;

pub async fn reconcile_once(store: &dyn WorkflowStore, limit: i64) -> WorkflowResult<Vec<DbId>> {
    let pending = store.list_unprovisioned(limit).await?;

    for row in &pending {
        tracing::warn!(
            request_id = row.request_id,
            club_code = %row.club_code,
            attempts = row.attempts,
            last_error = ?row.last_error,
            "Approved club request has not been provisioned"
        );
    }

    Ok(pending.into_iter().map(|row| row.request_id).collect())
}

pub async fn run(
    store: Arc<dyn WorkflowStore>,
    interval: Duration,
    limit: i64,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Provisioning reconciliation started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Provisioning reconciliation stopping");
                break;
            }
            _ = ticker.tick() => {
                match reconcile_once(store.as_ref(), limit).await {
                    Ok(ids) if ids.is_empty() => {
                        tracing::debug!("Reconciliation: every approved request has a club");
                    }
                    Ok(ids) => tracing::info!(unprovisioned = ids.len(), "Reconciliation finished"),
                    Err(e) => tracing::error!(error = %e, "Reconciliation failed"),
                }
            }
        }
    }
}
