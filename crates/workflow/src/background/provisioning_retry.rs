//! Retries club provisioning for approved requests whose first attempt
//! failed.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::provisioning::ProvisioningService;

/// Run the retry loop until `cancel` is triggered.
pub async fn run(
    service: Arc<ProvisioningService>,
    interval: Duration,
    limit: i64,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), limit, "Provisioning retry started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Provisioning retry stopping");
                break;
            }
            _ = ticker.tick() => {
                match service.retry_pending(limit).await {
                    Ok(summary) if summary.attempted == 0 => {
                        tracing::debug!("Provisioning retry: nothing pending");
                    }
                    Ok(summary) => tracing::info!(
                        attempted = summary.attempted,
                        provisioned = summary.provisioned,
                        failed = summary.failed,
                        "Provisioning retry finished"
                    ),
                    Err(e) => tracing::error!(error = %e, "Provisioning retry failed"),
                }
            }
        }
    }
}
