//! Persistence seam for the transition engine.
//!
//! [`WorkflowStore::commit`] is the only write path for transitions: it must
//! apply the aggregate update, the side records and exactly one audit entry
//! atomically, and refuse the write when the request's `lock_version` moved
//! since it was loaded.

use async_trait::async_trait;
use clubflow_core::documents::DocumentKind;
use clubflow_core::schedule::ScheduleStatus;
use clubflow_core::types::{DbId, Timestamp};
use clubflow_core::workflow::RequestState;
use clubflow_db::models::club_provisioning::{ClubProvisioning, CreateClubProvisioning};
use clubflow_db::models::club_request::{ApplyTransition, ClubRequest, CreateClubRequest};
use clubflow_db::models::defense_schedule::{CreateDefenseSchedule, DefenseSchedule};
use clubflow_db::models::document_version::{CreateDocumentVersion, DocumentVersion};
use clubflow_db::models::workflow_history::{CreateHistoryEntry, WorkflowHistoryEntry};

use crate::error::WorkflowResult;

pub mod memory;
pub mod postgres;

pub use memory::InMemoryWorkflowStore;
pub use postgres::PgWorkflowStore;

/// Change to the request's defense schedules carried by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleChange {
    /// Supersede any PROPOSED schedule and insert a new one.
    Propose(CreateDefenseSchedule),
    /// Edit the PROPOSED schedule in place.
    Update {
        scheduled_at: Timestamp,
        location: String,
    },
    /// Approve or reject the PROPOSED schedule.
    Decide {
        status: ScheduleStatus,
        note: Option<String>,
    },
}

/// Everything one transition writes.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionCommit {
    pub request_id: DbId,
    /// `lock_version` observed when the request was loaded.
    pub expected_lock_version: i32,
    pub expected_state: RequestState,
    pub changes: ApplyTransition,
    pub history: CreateHistoryEntry,
    pub document: Option<CreateDocumentVersion>,
    pub schedule: Option<ScheduleChange>,
    pub provisioning: Option<CreateClubProvisioning>,
}

/// Rows written by a successful commit.
#[derive(Debug, Clone)]
pub struct CommittedTransition {
    pub request: ClubRequest,
    pub history: WorkflowHistoryEntry,
    pub document: Option<DocumentVersion>,
    pub schedule: Option<DefenseSchedule>,
    pub provisioning: Option<ClubProvisioning>,
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    // -- Request lifecycle ---------------------------------------------------

    /// Insert a DRAFT request together with its `create` audit entry.
    async fn create_request(
        &self,
        input: &CreateClubRequest,
        note: Option<String>,
    ) -> WorkflowResult<(ClubRequest, WorkflowHistoryEntry)>;

    async fn find_request(&self, id: DbId) -> WorkflowResult<Option<ClubRequest>>;

    /// Atomically apply a transition. A stale `expected_lock_version` or a
    /// row locked by another commit yields `CoreError::Conflict`.
    async fn commit(&self, commit: &TransitionCommit) -> WorkflowResult<CommittedTransition>;

    /// Hard-delete a DRAFT. `false` if it is gone, left DRAFT, or changed.
    async fn delete_draft(&self, id: DbId, expected_lock_version: i32) -> WorkflowResult<bool>;

    // -- Audit trail ---------------------------------------------------------

    async fn list_history(
        &self,
        request_id: DbId,
        limit: i64,
        offset: i64,
    ) -> WorkflowResult<Vec<WorkflowHistoryEntry>>;

    async fn list_all_history(&self, request_id: DbId) -> WorkflowResult<Vec<WorkflowHistoryEntry>>;

    // -- Documents and schedules ---------------------------------------------

    async fn list_documents(
        &self,
        request_id: DbId,
        kind: DocumentKind,
    ) -> WorkflowResult<Vec<DocumentVersion>>;

    async fn latest_document(
        &self,
        request_id: DbId,
        kind: DocumentKind,
    ) -> WorkflowResult<Option<DocumentVersion>>;

    async fn active_schedule(&self, request_id: DbId) -> WorkflowResult<Option<DefenseSchedule>>;

    async fn list_schedules(&self, request_id: DbId) -> WorkflowResult<Vec<DefenseSchedule>>;

    // -- Deadlines -----------------------------------------------------------

    async fn list_overdue(&self, now: Timestamp, limit: i64) -> WorkflowResult<Vec<ClubRequest>>;

    // -- Provisioning outbox -------------------------------------------------

    async fn find_provisioning(&self, request_id: DbId)
        -> WorkflowResult<Option<ClubProvisioning>>;

    async fn list_unprovisioned(&self, limit: i64) -> WorkflowResult<Vec<ClubProvisioning>>;

    async fn mark_provisioned(
        &self,
        request_id: DbId,
        club_id: DbId,
    ) -> WorkflowResult<Option<ClubProvisioning>>;

    async fn record_provisioning_failure(
        &self,
        request_id: DbId,
        error: &str,
    ) -> WorkflowResult<bool>;
}
