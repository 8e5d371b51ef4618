//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods. Reads
//! accept `&PgPool`; writes that belong to a workflow transition accept
//! `&mut PgConnection` and run inside the caller's transaction.

pub mod club_request_repo;
pub mod deadline_repo;
pub mod defense_schedule_repo;
pub mod document_version_repo;
pub mod provisioning_repo;
pub mod workflow_history_repo;

pub use club_request_repo::ClubRequestRepo;
pub use deadline_repo::DeadlineRepo;
pub use defense_schedule_repo::DefenseScheduleRepo;
pub use document_version_repo::DocumentVersionRepo;
pub use provisioning_repo::ProvisioningRepo;
pub use workflow_history_repo::WorkflowHistoryRepo;
