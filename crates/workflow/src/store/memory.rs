//! In-memory [`WorkflowStore`] for tests and embedding without a database.
//!
//! All state sits behind one mutex, so a commit is trivially atomic; the
//! `lock_version` check gives the same conflict behaviour as the PostgreSQL
//! store.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use clubflow_core::documents::DocumentKind;
use clubflow_core::error::CoreError;
use clubflow_core::schedule::ScheduleStatus;
use clubflow_core::types::{DbId, Timestamp};
use clubflow_core::workflow::{RequestState, Transition};
use clubflow_db::models::club_provisioning::ClubProvisioning;
use clubflow_db::models::club_request::{ClubRequest, CreateClubRequest};
use clubflow_db::models::defense_schedule::DefenseSchedule;
use clubflow_db::models::document_version::DocumentVersion;
use clubflow_db::models::workflow_history::{CreateHistoryEntry, WorkflowHistoryEntry};

use super::{CommittedTransition, ScheduleChange, TransitionCommit, WorkflowStore};
use crate::error::WorkflowResult;

#[derive(Default)]
struct Tables {
    next_id: DbId,
    requests: HashMap<DbId, ClubRequest>,
    history: Vec<WorkflowHistoryEntry>,
    documents: Vec<DocumentVersion>,
    schedules: Vec<DefenseSchedule>,
    provisionings: HashMap<DbId, ClubProvisioning>,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn append_history(&mut self, input: &CreateHistoryEntry, now: Timestamp) -> WorkflowHistoryEntry {
        let entry = WorkflowHistoryEntry {
            id: self.next_id(),
            request_id: input.request_id,
            actor_id: input.actor_id,
            transition: input.transition.as_str().to_string(),
            from_state: input.from_state.map(|s| s.as_str().to_string()),
            to_state: input.to_state.as_str().to_string(),
            note: input.note.clone(),
            acted_at: now,
        };
        self.history.push(entry.clone());
        entry
    }

    fn proposed_schedule_mut(&mut self, request_id: DbId) -> Option<&mut DefenseSchedule> {
        self.schedules.iter_mut().find(|s| {
            s.request_id == request_id && s.status == ScheduleStatus::Proposed.as_str()
        })
    }
}

/// Mutex-guarded store. Cheap to construct; one per test.
#[derive(Default)]
pub struct InMemoryWorkflowStore {
    tables: Mutex<Tables>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> WorkflowResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| CoreError::Internal("in-memory store mutex poisoned".into()).into())
    }

    /// Overwrite a request's deadline. Lets tests move deadlines into the past.
    pub fn set_deadline(&self, request_id: DbId, deadline_at: Option<Timestamp>) -> WorkflowResult<()> {
        let mut tables = self.lock()?;
        let request = tables.requests.get_mut(&request_id).ok_or(CoreError::NotFound {
            entity: "club_request",
            id: request_id,
        })?;
        request.deadline_at = deadline_at;
        request.lock_version += 1;
        Ok(())
    }
}

fn stale(request_id: DbId) -> CoreError {
    CoreError::Conflict(format!(
        "club_request {request_id} changed since it was loaded; reload and retry"
    ))
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn create_request(
        &self,
        input: &CreateClubRequest,
        note: Option<String>,
    ) -> WorkflowResult<(ClubRequest, WorkflowHistoryEntry)> {
        let now = Utc::now();
        let mut tables = self.lock()?;

        let request = ClubRequest {
            id: tables.next_id(),
            creator_id: input.creator_id,
            reviewer_id: None,
            state: RequestState::Draft.as_str().to_string(),
            club_name: input.club_name.clone(),
            club_code: input.club_code.clone(),
            rejection_reason: None,
            defense_outcome: None,
            defense_feedback: None,
            deadline_at: None,
            lock_version: 0,
            created_at: now,
            updated_at: now,
        };
        tables.requests.insert(request.id, request.clone());

        let entry = tables.append_history(
            &CreateHistoryEntry {
                request_id: request.id,
                actor_id: input.creator_id,
                transition: Transition::Create,
                from_state: None,
                to_state: RequestState::Draft,
                note,
            },
            now,
        );

        Ok((request, entry))
    }

    async fn find_request(&self, id: DbId) -> WorkflowResult<Option<ClubRequest>> {
        // Yield so concurrent callers interleave the way separate database
        // round-trips would.
        tokio::task::yield_now().await;
        Ok(self.lock()?.requests.get(&id).cloned())
    }

    async fn commit(&self, commit: &TransitionCommit) -> WorkflowResult<CommittedTransition> {
        let now = Utc::now();
        let mut tables = self.lock()?;

        let current = tables
            .requests
            .get(&commit.request_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: "club_request",
                id: commit.request_id,
            })?;
        if current.lock_version != commit.expected_lock_version
            || current.state != commit.expected_state.as_str()
        {
            return Err(stale(commit.request_id).into());
        }

        // Validate every side write before mutating anything.
        if matches!(
            commit.schedule,
            Some(ScheduleChange::Update { .. }) | Some(ScheduleChange::Decide { .. })
        ) && tables.proposed_schedule_mut(commit.request_id).is_none()
        {
            return Err(stale(commit.request_id).into());
        }
        if commit.provisioning.is_some() && tables.provisionings.contains_key(&commit.request_id) {
            return Err(stale(commit.request_id).into());
        }
        // Mirrors ck_club_requests_rejection_reason.
        if commit.changes.state.is_rejected() != commit.changes.rejection_reason.is_some() {
            return Err(CoreError::Internal(format!(
                "club_request {} in {} must carry a rejection reason only when rejected",
                commit.request_id, commit.changes.state
            ))
            .into());
        }

        let changes = &commit.changes;
        let mut request = current;
        request.state = changes.state.as_str().to_string();
        request.reviewer_id = changes.reviewer_id;
        request.club_name = changes.club_name.clone();
        request.club_code = changes.club_code.clone();
        request.rejection_reason = changes.rejection_reason.clone();
        request.defense_outcome = changes.defense_outcome.map(|o| o.as_str().to_string());
        request.defense_feedback = changes.defense_feedback.clone();
        request.deadline_at = changes.deadline_at;
        request.lock_version += 1;
        request.updated_at = now;
        tables.requests.insert(request.id, request.clone());

        let document = commit.document.as_ref().map(|input| {
            let version = tables
                .documents
                .iter()
                .filter(|d| d.request_id == input.request_id && d.kind == input.kind.as_str())
                .map(|d| d.version)
                .max()
                .unwrap_or(0)
                + 1;
            let doc = DocumentVersion {
                id: tables.next_id(),
                request_id: input.request_id,
                kind: input.kind.as_str().to_string(),
                version,
                title: input.title.clone(),
                comment: input.comment.clone(),
                document_ref: input.document_ref.clone(),
                submitted_by: input.submitted_by,
                created_at: now,
            };
            tables.documents.push(doc.clone());
            doc
        });

        let schedule = match &commit.schedule {
            Some(ScheduleChange::Propose(input)) => {
                if let Some(previous) = tables.proposed_schedule_mut(commit.request_id) {
                    previous.status = ScheduleStatus::Superseded.as_str().to_string();
                    previous.updated_at = now;
                }
                let schedule = DefenseSchedule {
                    id: tables.next_id(),
                    request_id: input.request_id,
                    scheduled_at: input.scheduled_at,
                    location: input.location.clone(),
                    proposed_by: input.proposed_by,
                    status: ScheduleStatus::Proposed.as_str().to_string(),
                    reviewer_note: None,
                    created_at: now,
                    updated_at: now,
                };
                tables.schedules.push(schedule.clone());
                Some(schedule)
            }
            Some(ScheduleChange::Update {
                scheduled_at,
                location,
            }) => tables.proposed_schedule_mut(commit.request_id).map(|s| {
                s.scheduled_at = *scheduled_at;
                s.location = location.clone();
                s.updated_at = now;
                s.clone()
            }),
            Some(ScheduleChange::Decide { status, note }) => {
                tables.proposed_schedule_mut(commit.request_id).map(|s| {
                    s.status = status.as_str().to_string();
                    s.reviewer_note = note.clone();
                    s.updated_at = now;
                    s.clone()
                })
            }
            None => None,
        };

        let history = tables.append_history(&commit.history, now);

        let provisioning = commit.provisioning.as_ref().map(|input| {
            let row = ClubProvisioning {
                request_id: input.request_id,
                founder_id: input.founder_id,
                club_name: input.club_name.clone(),
                club_code: input.club_code.clone(),
                club_id: None,
                attempts: 0,
                last_error: None,
                provisioned_at: None,
                created_at: now,
                updated_at: now,
            };
            tables.provisionings.insert(row.request_id, row.clone());
            row
        });

        Ok(CommittedTransition {
            request,
            history,
            document,
            schedule,
            provisioning,
        })
    }

    async fn delete_draft(&self, id: DbId, expected_lock_version: i32) -> WorkflowResult<bool> {
        let mut tables = self.lock()?;
        let deletable = tables.requests.get(&id).is_some_and(|r| {
            r.lock_version == expected_lock_version && r.state == RequestState::Draft.as_str()
        });
        if !deletable {
            return Ok(false);
        }
        tables.requests.remove(&id);
        tables.history.retain(|h| h.request_id != id);
        Ok(true)
    }

    async fn list_history(
        &self,
        request_id: DbId,
        limit: i64,
        offset: i64,
    ) -> WorkflowResult<Vec<WorkflowHistoryEntry>> {
        let tables = self.lock()?;
        Ok(tables
            .history
            .iter()
            .filter(|h| h.request_id == request_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_all_history(&self, request_id: DbId) -> WorkflowResult<Vec<WorkflowHistoryEntry>> {
        let tables = self.lock()?;
        Ok(tables
            .history
            .iter()
            .filter(|h| h.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn list_documents(
        &self,
        request_id: DbId,
        kind: DocumentKind,
    ) -> WorkflowResult<Vec<DocumentVersion>> {
        let tables = self.lock()?;
        let mut docs: Vec<DocumentVersion> = tables
            .documents
            .iter()
            .filter(|d| d.request_id == request_id && d.kind == kind.as_str())
            .cloned()
            .collect();
        docs.sort_by_key(|d| d.version);
        Ok(docs)
    }

    async fn latest_document(
        &self,
        request_id: DbId,
        kind: DocumentKind,
    ) -> WorkflowResult<Option<DocumentVersion>> {
        Ok(self.list_documents(request_id, kind).await?.pop())
    }

    async fn active_schedule(&self, request_id: DbId) -> WorkflowResult<Option<DefenseSchedule>> {
        let tables = self.lock()?;
        Ok(tables
            .schedules
            .iter()
            .find(|s| {
                s.request_id == request_id
                    && ScheduleStatus::from_str(&s.status).is_some_and(|st| st.is_active())
            })
            .cloned())
    }

    async fn list_schedules(&self, request_id: DbId) -> WorkflowResult<Vec<DefenseSchedule>> {
        let tables = self.lock()?;
        Ok(tables
            .schedules
            .iter()
            .filter(|s| s.request_id == request_id)
            .cloned()
            .collect())
    }

    async fn list_overdue(&self, now: Timestamp, limit: i64) -> WorkflowResult<Vec<ClubRequest>> {
        let tables = self.lock()?;
        let mut overdue: Vec<ClubRequest> = tables
            .requests
            .values()
            .filter(|r| r.deadline_at.is_some_and(|due| due < now))
            .cloned()
            .collect();
        overdue.sort_by_key(|r| r.deadline_at);
        overdue.truncate(limit.max(0) as usize);
        Ok(overdue)
    }

    async fn find_provisioning(
        &self,
        request_id: DbId,
    ) -> WorkflowResult<Option<ClubProvisioning>> {
        Ok(self.lock()?.provisionings.get(&request_id).cloned())
    }

    async fn list_unprovisioned(&self, limit: i64) -> WorkflowResult<Vec<ClubProvisioning>> {
        let tables = self.lock()?;
        let mut pending: Vec<ClubProvisioning> = tables
            .provisionings
            .values()
            .filter(|p| p.club_id.is_none())
            .cloned()
            .collect();
        pending.sort_by_key(|p| (p.created_at, p.request_id));
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn mark_provisioned(
        &self,
        request_id: DbId,
        club_id: DbId,
    ) -> WorkflowResult<Option<ClubProvisioning>> {
        let now = Utc::now();
        let mut tables = self.lock()?;
        Ok(tables.provisionings.get_mut(&request_id).map(|row| {
            row.club_id.get_or_insert(club_id);
            row.attempts += 1;
            row.last_error = None;
            row.provisioned_at.get_or_insert(now);
            row.updated_at = now;
            row.clone()
        }))
    }

    async fn record_provisioning_failure(
        &self,
        request_id: DbId,
        error: &str,
    ) -> WorkflowResult<bool> {
        let now = Utc::now();
        let mut tables = self.lock()?;
        match tables.provisionings.get_mut(&request_id) {
            Some(row) if row.club_id.is_none() => {
                row.attempts += 1;
                row.last_error = Some(error.to_string());
                row.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use clubflow_db::models::club_request::ApplyTransition;

    use super::*;
    use crate::error::WorkflowError;

    fn submit_commit(request: &ClubRequest, expected_lock_version: i32) -> TransitionCommit {
        TransitionCommit {
            request_id: request.id,
            expected_lock_version,
            expected_state: RequestState::Draft,
            changes: ApplyTransition {
                state: RequestState::Submitted,
                reviewer_id: None,
                club_name: request.club_name.clone(),
                club_code: request.club_code.clone(),
                rejection_reason: None,
                defense_outcome: None,
                defense_feedback: None,
                deadline_at: None,
            },
            history: CreateHistoryEntry {
                request_id: request.id,
                actor_id: request.creator_id,
                transition: Transition::Submit,
                from_state: Some(RequestState::Draft),
                to_state: RequestState::Submitted,
                note: None,
            },
            document: None,
            schedule: None,
            provisioning: None,
        }
    }

    async fn draft(store: &InMemoryWorkflowStore) -> ClubRequest {
        let input = CreateClubRequest {
            creator_id: 1,
            club_name: "Chess Society".into(),
            club_code: "CHESS".into(),
        };
        store.create_request(&input, None).await.unwrap().0
    }

    #[tokio::test]
    async fn commit_bumps_lock_version_and_appends_history() {
        let store = InMemoryWorkflowStore::new();
        let request = draft(&store).await;

        let committed = store.commit(&submit_commit(&request, 0)).await.unwrap();
        assert_eq!(committed.request.lock_version, 1);
        assert_eq!(committed.request.state, "SUBMITTED");
        assert_eq!(store.list_all_history(request.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn stale_lock_version_conflicts_without_writing() {
        let store = InMemoryWorkflowStore::new();
        let request = draft(&store).await;
        store.commit(&submit_commit(&request, 0)).await.unwrap();

        let result = store.commit(&submit_commit(&request, 0)).await;
        assert_matches!(result, Err(WorkflowError::Core(CoreError::Conflict(_))));
        assert_eq!(store.list_all_history(request.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_draft_removes_request_and_history() {
        let store = InMemoryWorkflowStore::new();
        let request = draft(&store).await;

        assert!(!store.delete_draft(request.id, 7).await.unwrap());
        assert!(store.delete_draft(request.id, 0).await.unwrap());
        assert!(store.find_request(request.id).await.unwrap().is_none());
        assert!(store.list_all_history(request.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejection_reason_outside_rejected_state_is_refused() {
        let store = InMemoryWorkflowStore::new();
        let request = draft(&store).await;

        let mut commit = submit_commit(&request, 0);
        commit.changes.rejection_reason = Some("stale".into());
        let result = store.commit(&commit).await;
        assert_matches!(result, Err(WorkflowError::Core(CoreError::Internal(_))));

        let unchanged = store.find_request(request.id).await.unwrap().unwrap();
        assert_eq!(unchanged.state, "DRAFT");
        assert_eq!(unchanged.lock_version, 0);
    }
}
