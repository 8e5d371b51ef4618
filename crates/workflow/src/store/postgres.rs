//! PostgreSQL-backed [`WorkflowStore`].

use async_trait::async_trait;
use clubflow_core::documents::DocumentKind;
use clubflow_core::error::CoreError;
use clubflow_core::types::{DbId, Timestamp};
use clubflow_core::workflow::{RequestState, Transition};
use clubflow_db::models::club_provisioning::ClubProvisioning;
use clubflow_db::models::club_request::{ClubRequest, CreateClubRequest};
use clubflow_db::models::defense_schedule::DefenseSchedule;
use clubflow_db::models::document_version::DocumentVersion;
use clubflow_db::models::workflow_history::{CreateHistoryEntry, WorkflowHistoryEntry};
use clubflow_db::repositories::{
    ClubRequestRepo, DeadlineRepo, DefenseScheduleRepo, DocumentVersionRepo, ProvisioningRepo,
    WorkflowHistoryRepo,
};
use clubflow_db::DbPool;

use super::{CommittedTransition, ScheduleChange, TransitionCommit, WorkflowStore};
use crate::error::{classify_sqlx_error, WorkflowResult};

/// Store that runs each commit in one database transaction, serialized on
/// the request row via `SELECT ... FOR UPDATE NOWAIT` plus the
/// `lock_version` check.
#[derive(Clone)]
pub struct PgWorkflowStore {
    pool: DbPool,
}

impl PgWorkflowStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

fn stale(request_id: DbId) -> CoreError {
    CoreError::Conflict(format!(
        "club_request {request_id} changed since it was loaded; reload and retry"
    ))
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn create_request(
        &self,
        input: &CreateClubRequest,
        note: Option<String>,
    ) -> WorkflowResult<(ClubRequest, WorkflowHistoryEntry)> {
        let mut tx = self.pool.begin().await?;

        let request = ClubRequestRepo::create(&mut *tx, input).await?;
        let entry = WorkflowHistoryRepo::append(
            &mut *tx,
            &CreateHistoryEntry {
                request_id: request.id,
                actor_id: input.creator_id,
                transition: Transition::Create,
                from_state: None,
                to_state: RequestState::Draft,
                note,
            },
        )
        .await?;

        tx.commit().await?;
        Ok((request, entry))
    }

    async fn find_request(&self, id: DbId) -> WorkflowResult<Option<ClubRequest>> {
        Ok(ClubRequestRepo::find_by_id(&self.pool, id).await?)
    }

    async fn commit(&self, commit: &TransitionCommit) -> WorkflowResult<CommittedTransition> {
        let mut tx = self.pool.begin().await?;

        let locked = ClubRequestRepo::lock_for_update(&mut *tx, commit.request_id)
            .await
            .map_err(classify_sqlx_error)?
            .ok_or(CoreError::NotFound {
                entity: "club_request",
                id: commit.request_id,
            })?;

        if locked.lock_version != commit.expected_lock_version
            || locked.state != commit.expected_state.as_str()
        {
            return Err(stale(commit.request_id).into());
        }

        let request = ClubRequestRepo::apply_transition(
            &mut *tx,
            commit.request_id,
            commit.expected_lock_version,
            &commit.changes,
        )
        .await
        .map_err(classify_sqlx_error)?
        .ok_or_else(|| stale(commit.request_id))?;

        let document = match &commit.document {
            Some(input) => Some(
                DocumentVersionRepo::add_version(&mut *tx, input)
                    .await
                    .map_err(classify_sqlx_error)?,
            ),
            None => None,
        };

        let schedule = match &commit.schedule {
            Some(ScheduleChange::Propose(input)) => {
                DefenseScheduleRepo::supersede_proposed(&mut *tx, commit.request_id).await?;
                Some(
                    DefenseScheduleRepo::create(&mut *tx, input)
                        .await
                        .map_err(classify_sqlx_error)?,
                )
            }
            Some(ScheduleChange::Update {
                scheduled_at,
                location,
            }) => Some(
                DefenseScheduleRepo::update_proposed(
                    &mut *tx,
                    commit.request_id,
                    *scheduled_at,
                    location,
                )
                .await?
                .ok_or_else(|| stale(commit.request_id))?,
            ),
            Some(ScheduleChange::Decide { status, note }) => Some(
                DefenseScheduleRepo::decide_proposed(
                    &mut *tx,
                    commit.request_id,
                    *status,
                    note.as_deref(),
                )
                .await?
                .ok_or_else(|| stale(commit.request_id))?,
            ),
            None => None,
        };

        let history = WorkflowHistoryRepo::append(&mut *tx, &commit.history).await?;

        let provisioning = match &commit.provisioning {
            Some(input) => Some(
                ProvisioningRepo::enqueue(&mut *tx, input)
                    .await
                    .map_err(classify_sqlx_error)?,
            ),
            None => None,
        };

        tx.commit().await.map_err(classify_sqlx_error)?;

        Ok(CommittedTransition {
            request,
            history,
            document,
            schedule,
            provisioning,
        })
    }

    async fn delete_draft(&self, id: DbId, expected_lock_version: i32) -> WorkflowResult<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(ClubRequestRepo::delete_draft(&mut *conn, id, expected_lock_version).await?)
    }

    async fn list_history(
        &self,
        request_id: DbId,
        limit: i64,
        offset: i64,
    ) -> WorkflowResult<Vec<WorkflowHistoryEntry>> {
        Ok(WorkflowHistoryRepo::list_for_request(&self.pool, request_id, limit, offset).await?)
    }

    async fn list_all_history(&self, request_id: DbId) -> WorkflowResult<Vec<WorkflowHistoryEntry>> {
        Ok(WorkflowHistoryRepo::list_all_for_request(&self.pool, request_id).await?)
    }

    async fn list_documents(
        &self,
        request_id: DbId,
        kind: DocumentKind,
    ) -> WorkflowResult<Vec<DocumentVersion>> {
        Ok(DocumentVersionRepo::history(&self.pool, request_id, kind).await?)
    }

    async fn latest_document(
        &self,
        request_id: DbId,
        kind: DocumentKind,
    ) -> WorkflowResult<Option<DocumentVersion>> {
        Ok(DocumentVersionRepo::latest(&self.pool, request_id, kind).await?)
    }

    async fn active_schedule(&self, request_id: DbId) -> WorkflowResult<Option<DefenseSchedule>> {
        Ok(DefenseScheduleRepo::find_active(&self.pool, request_id).await?)
    }

    async fn list_schedules(&self, request_id: DbId) -> WorkflowResult<Vec<DefenseSchedule>> {
        Ok(DefenseScheduleRepo::list_for_request(&self.pool, request_id).await?)
    }

    async fn list_overdue(&self, now: Timestamp, limit: i64) -> WorkflowResult<Vec<ClubRequest>> {
        Ok(DeadlineRepo::list_overdue(&self.pool, now, limit).await?)
    }

    async fn find_provisioning(
        &self,
        request_id: DbId,
    ) -> WorkflowResult<Option<ClubProvisioning>> {
        Ok(ProvisioningRepo::find(&self.pool, request_id).await?)
    }

    async fn list_unprovisioned(&self, limit: i64) -> WorkflowResult<Vec<ClubProvisioning>> {
        Ok(ProvisioningRepo::list_pending(&self.pool, limit).await?)
    }

    async fn mark_provisioned(
        &self,
        request_id: DbId,
        club_id: DbId,
    ) -> WorkflowResult<Option<ClubProvisioning>> {
        Ok(ProvisioningRepo::mark_provisioned(&self.pool, request_id, club_id).await?)
    }

    async fn record_provisioning_failure(
        &self,
        request_id: DbId,
        error: &str,
    ) -> WorkflowResult<bool> {
        Ok(ProvisioningRepo::record_failure(&self.pool, request_id, error).await?)
    }
}
