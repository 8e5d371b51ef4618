//! Domain rules for the club-establishment approval workflow.
//!
//! This crate has zero internal dependencies so the transition table, payload
//! validation and deadline policy can be shared by the persistence layer, the
//! engine and any tooling without pulling in a database driver.

pub mod deadline;
pub mod documents;
pub mod error;
pub mod payload;
pub mod replay;
pub mod roles;
pub mod schedule;
pub mod types;
pub mod workflow;
