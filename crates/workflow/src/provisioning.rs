//! Post-commit club provisioning.
//!
//! The approve-final-form commit writes a `club_provisionings` outbox row in
//! the same transaction. This service drives that row to completion by
//! calling the [`ClubProvisioner`]; a failure is recorded on the row and
//! retried later, never rolled back into the request.

use std::sync::Arc;

use clubflow_core::error::CoreError;
use clubflow_core::types::DbId;
use clubflow_db::models::club_provisioning::ClubProvisioning;
use clubflow_events::bus::{EVENT_PROVISIONED, EVENT_PROVISIONING_FAILED};
use clubflow_events::{EventBus, WorkflowEvent};
use serde::Serialize;

use crate::collaborators::{ClubId, ClubProvisioner};
use crate::error::WorkflowResult;
use crate::store::WorkflowStore;

/// Result of one provisioning attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProvisioningStatus {
    Provisioned { club_id: ClubId },
    /// The approval stands; the outbox row stays pending for retry.
    Failed { error: String },
}

impl ProvisioningStatus {
    pub fn into_result(self) -> Result<ClubId, CoreError> {
        match self {
            ProvisioningStatus::Provisioned { club_id } => Ok(club_id),
            ProvisioningStatus::Failed { error } => Err(CoreError::Provisioning(error)),
        }
    }
}

/// Counts from one [`ProvisioningService::retry_pending`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrySummary {
    pub attempted: usize,
    pub provisioned: usize,
    pub failed: usize,
}

pub struct ProvisioningService {
    store: Arc<dyn WorkflowStore>,
    provisioner: Arc<dyn ClubProvisioner>,
    events: Arc<EventBus>,
}

impl ProvisioningService {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        provisioner: Arc<dyn ClubProvisioner>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            provisioner,
            events,
        }
    }

    /// Provision the club for one outbox row.
    ///
    /// Already-provisioned rows short-circuit without calling the
    /// provisioner.
    pub async fn provision(&self, row: &ClubProvisioning) -> ProvisioningStatus {
        if let Some(club_id) = row.club_id {
            return ProvisioningStatus::Provisioned { club_id };
        }

        let request_id = row.request_id;
        let result = self
            .provisioner
            .provision(request_id, &row.club_name, &row.club_code, row.founder_id)
            .await;

        let status = match result {
            Ok(club_id) => match self.store.mark_provisioned(request_id, club_id).await {
                Ok(_) => {
                    tracing::info!(request_id, club_id, "Club provisioned");
                    ProvisioningStatus::Provisioned { club_id }
                }
                Err(e) => {
                    // The provisioner is idempotent, so the next retry
                    // recovers the same club id.
                    tracing::error!(
                        error = %e,
                        request_id,
                        club_id,
                        "Club provisioned but outbox update failed"
                    );
                    ProvisioningStatus::Failed {
                        error: e.to_string(),
                    }
                }
            },
            Err(e) => {
                tracing::error!(
                    error = %e,
                    request_id,
                    attempts = row.attempts + 1,
                    "Club provisioning failed, queued for retry"
                );
                if let Err(record_err) = self
                    .store
                    .record_provisioning_failure(request_id, &e.to_string())
                    .await
                {
                    tracing::error!(
                        error = %record_err,
                        request_id,
                        "Failed to record provisioning failure"
                    );
                }
                ProvisioningStatus::Failed {
                    error: e.to_string(),
                }
            }
        };

        self.publish(row, &status);
        status
    }

    /// Provision by request id. `None` when the request has no outbox row,
    /// i.e. it was never approved.
    pub async fn provision_request(
        &self,
        request_id: DbId,
    ) -> WorkflowResult<Option<ProvisioningStatus>> {
        match self.store.find_provisioning(request_id).await? {
            Some(row) => Ok(Some(self.provision(&row).await)),
            None => Ok(None),
        }
    }

    /// Retry every approved-but-unprovisioned request, oldest first.
    pub async fn retry_pending(&self, limit: i64) -> WorkflowResult<RetrySummary> {
        let pending = self.store.list_unprovisioned(limit).await?;
        let mut summary = RetrySummary::default();

        for row in &pending {
            summary.attempted += 1;
            match self.provision(row).await {
                ProvisioningStatus::Provisioned { .. } => summary.provisioned += 1,
                ProvisioningStatus::Failed { .. } => summary.failed += 1,
            }
        }

        Ok(summary)
    }

    fn publish(&self, row: &ClubProvisioning, status: &ProvisioningStatus) {
        let event_type = match status {
            ProvisioningStatus::Provisioned { .. } => EVENT_PROVISIONED,
            ProvisioningStatus::Failed { .. } => EVENT_PROVISIONING_FAILED,
        };
        let payload = serde_json::to_value(status).unwrap_or_default();
        self.events.publish(
            WorkflowEvent::new(event_type, row.request_id)
                .with_parties(row.founder_id, None)
                .with_payload(payload),
        );
    }
}
