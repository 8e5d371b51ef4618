//! Workflow event bus and notification routing.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`WorkflowEvent`]: envelope for a committed transition or a
//!   provisioning outcome.
//! - [`NotificationDispatcher`]: outbound delivery seam.
//! - [`NotificationRouter`]: background service that turns events into
//!   notifications for the request's parties.

pub mod bus;
pub mod dispatcher;
pub mod router;

pub use bus::{EventBus, WorkflowEvent};
pub use dispatcher::{
    Audience, DispatchError, LogDispatcher, NotificationContext, NotificationDispatcher,
};
pub use router::NotificationRouter;
