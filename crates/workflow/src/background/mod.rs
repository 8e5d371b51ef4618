//! Background jobs for the club-request workflow.
//!
//! Each submodule provides a long-running async function intended to be
//! spawned via `tokio::spawn`. All jobs accept a [`CancellationToken`]
//! and return once it is cancelled.
//!
//! [`CancellationToken`]: tokio_util::sync::CancellationToken

pub mod deadline_sweep;
pub mod provisioning_retry;
pub mod reconciliation;
