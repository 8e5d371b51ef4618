//! Row structs and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row and the `Deserialize` input DTOs used to write it.
//! Enum-valued columns are stored as text and parsed into the core enums
//! through the accessor methods on each row.

pub mod club_provisioning;
pub mod club_request;
pub mod defense_schedule;
pub mod document_version;
pub mod workflow_history;
