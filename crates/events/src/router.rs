//! Event-to-notification routing.
//!
//! [`NotificationRouter`] subscribes to the [`EventBus`](crate::EventBus) and
//! tells the parties of a request (creator, bound reviewer) what happened,
//! skipping whoever caused the event. Delivery failures are logged and never
//! reach the transition that produced the event.

use std::sync::Arc;

use clubflow_core::types::DbId;
use tokio::sync::broadcast;

use crate::bus::{WorkflowEvent, EVENT_PROVISIONED, EVENT_PROVISIONING_FAILED};
use crate::dispatcher::{Audience, NotificationContext, NotificationDispatcher};

/// Routes workflow events to the request's parties.
pub struct NotificationRouter {
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl NotificationRouter {
    pub fn new(dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Run the routing loop until the bus is dropped.
    pub async fn run(self, mut receiver: broadcast::Receiver<WorkflowEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    self.route_event(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Notification router lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, notification router shutting down");
                    break;
                }
            }
        }
    }

    /// Deliver one event to every target. Returns how many deliveries
    /// succeeded.
    pub async fn route_event(&self, event: &WorkflowEvent) -> usize {
        let mut delivered = 0;

        for (recipient_id, audience) in determine_targets(event) {
            let context = NotificationContext {
                summary: summarize(event),
                audience,
            };
            match self.dispatcher.notify(recipient_id, event, &context).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        recipient_id,
                        request_id = event.request_id,
                        event_type = %event.event_type,
                        "Failed to deliver notification"
                    );
                }
            }
        }

        delivered
    }
}

/// Creator and reviewer, minus the actor. Provisioning events go to the
/// creator only.
fn determine_targets(event: &WorkflowEvent) -> Vec<(DbId, Audience)> {
    let mut targets = Vec::with_capacity(2);

    if let Some(creator_id) = event.creator_id {
        targets.push((creator_id, Audience::Creator));
    }

    let provisioning = matches!(
        event.event_type.as_str(),
        EVENT_PROVISIONED | EVENT_PROVISIONING_FAILED
    );
    if !provisioning {
        if let Some(reviewer_id) = event.reviewer_id {
            if Some(reviewer_id) != event.creator_id {
                targets.push((reviewer_id, Audience::Reviewer));
            }
        }
    }

    targets.retain(|(id, _)| Some(*id) != event.actor_id);
    targets
}

fn summarize(event: &WorkflowEvent) -> String {
    match (event.event_type.as_str(), event.to_state.as_deref()) {
        (EVENT_PROVISIONED, _) => format!("Club for request #{} has been created", event.request_id),
        (EVENT_PROVISIONING_FAILED, _) => format!(
            "Club creation for request #{} is delayed and will be retried",
            event.request_id
        ),
        (_, Some(state)) => format!("Club request #{} is now {state}", event.request_id),
        (other, None) => format!("Club request #{}: {other}", event.request_id),
    }
}
