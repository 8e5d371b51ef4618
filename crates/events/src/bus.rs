//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] fans committed workflow transitions out to every subscriber
//! (notification routing, dashboards). It is shared via `Arc<EventBus>`.
//! Publishing is best effort: nothing here can fail a transition.

use chrono::{DateTime, Utc};
use clubflow_core::types::DbId;
use clubflow_core::workflow::{RequestState, Transition};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

/// Prefix shared by every request lifecycle event.
pub const EVENT_PREFIX: &str = "club_request.";

/// Club provisioned after final approval.
pub const EVENT_PROVISIONED: &str = "club_request.provisioned";

/// Club provisioning failed and was queued for retry.
pub const EVENT_PROVISIONING_FAILED: &str = "club_request.provisioning_failed";

/// Event name for a committed transition, e.g. `club_request.reject_proposal`.
pub fn event_type_for(transition: Transition) -> String {
    format!("{EVENT_PREFIX}{}", transition.as_str().replace('-', "_"))
}

// ---------------------------------------------------------------------------
// WorkflowEvent
// ---------------------------------------------------------------------------

/// Something that happened to a club-establishment request.
///
/// Built with [`WorkflowEvent::new`] or [`WorkflowEvent::transition`] and
/// enriched with the builder methods.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowEvent {
    /// Dot-separated event name, e.g. `"club_request.submit"`.
    pub event_type: String,

    pub request_id: DbId,

    /// User whose command produced the event.
    pub actor_id: Option<DbId>,

    /// The student who created the request.
    pub creator_id: Option<DbId>,

    /// Reviewer bound to the request after the event, if any.
    pub reviewer_id: Option<DbId>,

    pub from_state: Option<String>,
    pub to_state: Option<String>,

    /// Free-form JSON carrying event-specific data.
    pub payload: serde_json::Value,

    /// When the event was created (UTC).
    pub timestamp: DateTime<Utc>,
}

impl WorkflowEvent {
    /// Create an event with only the type and subject request set.
    pub fn new(event_type: impl Into<String>, request_id: DbId) -> Self {
        Self {
            event_type: event_type.into(),
            request_id,
            actor_id: None,
            creator_id: None,
            reviewer_id: None,
            from_state: None,
            to_state: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Create the event for a committed transition.
    pub fn transition(
        transition: Transition,
        request_id: DbId,
        from_state: Option<RequestState>,
        to_state: RequestState,
    ) -> Self {
        let mut event = Self::new(event_type_for(transition), request_id);
        event.from_state = from_state.map(|s| s.as_str().to_string());
        event.to_state = Some(to_state.as_str().to_string());
        event
    }

    pub fn with_actor(mut self, actor_id: DbId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    /// Attach the request's creator and current reviewer.
    pub fn with_parties(mut self, creator_id: DbId, reviewer_id: Option<DbId>) -> Self {
        self.creator_id = Some(creator_id);
        self.reviewer_id = reviewer_id;
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use clubflow_events::bus::{EventBus, WorkflowEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(WorkflowEvent::new("club_request.submit", 1));
/// ```
pub struct EventBus {
    sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full the oldest unread events are dropped and slow
    /// receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn publish(&self, event: WorkflowEvent) {
        // SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
