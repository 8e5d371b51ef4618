//! Club-establishment request workflow.
//!
//! [`engine::TransitionEngine`] applies table-driven transitions to club
//! requests through a [`store::WorkflowStore`], publishes a
//! [`clubflow_events::WorkflowEvent`] per committed transition and
//! provisions the club once the final form is approved.

pub mod background;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod provisioning;
pub mod store;
pub mod testing;

pub use config::WorkflowConfig;
pub use engine::{DocumentUpload, TransitionEngine, TransitionOutcome};
pub use error::{WorkflowError, WorkflowResult};
pub use provisioning::{ProvisioningService, ProvisioningStatus, RetrySummary};
