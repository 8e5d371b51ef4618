//! Outbound notification seam.
//!
//! Email and push delivery live outside this workspace; they plug in by
//! implementing [`NotificationDispatcher`].

use async_trait::async_trait;
use clubflow_core::types::DbId;
use serde::Serialize;

use crate::bus::WorkflowEvent;

/// Human-readable context handed to the dispatcher alongside the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationContext {
    /// One-line summary, e.g. `"Club request #12 is now PROPOSAL_REJECTED"`.
    pub summary: String,
    /// Why the recipient is being told (creator, reviewer).
    pub audience: Audience,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Creator,
    Reviewer,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Delivers a notification to a single recipient.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(
        &self,
        recipient_id: DbId,
        event: &WorkflowEvent,
        context: &NotificationContext,
    ) -> Result<(), DispatchError>;
}

/// Dispatcher that only logs. Used when no delivery channel is configured.
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn notify(
        &self,
        recipient_id: DbId,
        event: &WorkflowEvent,
        context: &NotificationContext,
    ) -> Result<(), DispatchError> {
        tracing::info!(
            recipient_id,
            event_type = %event.event_type,
            request_id = event.request_id,
            summary = %context.summary,
            "Notification"
        );
        Ok(())
    }
}
