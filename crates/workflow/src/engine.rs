//! Transition engine for club-establishment requests.
//!
//! Every command funnels through [`TransitionEngine::apply`]: load the
//! request, validate the payload, look the edge up in the transition table,
//! check the actor, compute the full post-transition aggregate and hand it
//! to [`WorkflowStore::commit`] as one atomic unit. Events and club
//! provisioning happen only after that commit succeeds.

use std::sync::Arc;

use chrono::Utc;
use clubflow_core::deadline::{compute_deadline, is_overdue, DeadlineWindows};
use clubflow_core::documents::{validate_document, DocumentKind, DocumentSubmission};
use clubflow_core::error::CoreError;
use clubflow_core::payload::{validate_payload, TransitionPayload};
use clubflow_core::replay;
use clubflow_core::roles::{Actor, Role};
use clubflow_core::schedule::ScheduleStatus;
use clubflow_core::types::{DbId, Timestamp};
use clubflow_core::workflow::{
    rule, ActorRequirement, RequestState, ReviewerBinding, Transition, TransitionRule,
};
use clubflow_db::models::club_provisioning::{ClubProvisioning, CreateClubProvisioning};
use clubflow_db::models::club_request::{ApplyTransition, ClubRequest, CreateClubRequest};
use clubflow_db::models::defense_schedule::{CreateDefenseSchedule, DefenseSchedule};
use clubflow_db::models::document_version::{CreateDocumentVersion, DocumentVersion};
use clubflow_db::models::workflow_history::{CreateHistoryEntry, WorkflowHistoryEntry};
use clubflow_events::{EventBus, WorkflowEvent};
use tracing::Instrument;
use uuid::Uuid;

use crate::collaborators::{ClubProvisioner, DocumentStorage, IdentityProvider};
use crate::config::WorkflowConfig;
use crate::error::WorkflowResult;
use crate::provisioning::{ProvisioningService, ProvisioningStatus};
use crate::store::{ScheduleChange, TransitionCommit, WorkflowStore};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// What a successful command returns.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    /// The request as committed.
    pub request: ClubRequest,
    pub history_entry: WorkflowHistoryEntry,
    /// New proposal / final-form version, if the transition created one.
    pub document: Option<DocumentVersion>,
    /// Schedule row written by the transition, if any.
    pub schedule: Option<DefenseSchedule>,
    /// Set only for `approve-final-form`. A `Failed` status does not undo
    /// the approval.
    pub provisioning: Option<ProvisioningStatus>,
}

/// A file to put into document storage before submitting it.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub file_name: String,
    pub content: Vec<u8>,
    pub title: String,
    pub comment: Option<String>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct TransitionEngine {
    store: Arc<dyn WorkflowStore>,
    identity: Arc<dyn IdentityProvider>,
    documents: Arc<dyn DocumentStorage>,
    provisioning: Arc<ProvisioningService>,
    events: Arc<EventBus>,
    windows: DeadlineWindows,
}

impl TransitionEngine {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        identity: Arc<dyn IdentityProvider>,
        documents: Arc<dyn DocumentStorage>,
        provisioner: Arc<dyn ClubProvisioner>,
        events: Arc<EventBus>,
        config: &WorkflowConfig,
    ) -> Self {
        let provisioning = Arc::new(ProvisioningService::new(
            Arc::clone(&store),
            provisioner,
            Arc::clone(&events),
        ));
        Self {
            store,
            identity,
            documents,
            provisioning,
            events,
            windows: config.deadlines,
        }
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore> {
        &self.store
    }

    pub fn provisioning(&self) -> &Arc<ProvisioningService> {
        &self.provisioning
    }

    // -- Lifecycle commands --------------------------------------------------

    /// Create a DRAFT request owned by `actor`, who must be a student.
    ///
    /// `payload.club_name` and `payload.club_code` are required.
    pub async fn create_request(
        &self,
        actor: Actor,
        payload: TransitionPayload,
    ) -> WorkflowResult<TransitionOutcome> {
        if actor.role != Role::Student {
            return Err(CoreError::Forbidden(format!(
                "create requires a STUDENT, actor {} is {}",
                actor.id, actor.role
            ))
            .into());
        }
        validate_payload(Transition::Create, &payload, Utc::now())?;

        let input = CreateClubRequest {
            creator_id: actor.id,
            club_name: payload.club_name.unwrap_or_default().trim().to_string(),
            club_code: payload.club_code.unwrap_or_default(),
        };
        let (request, history_entry) = self.store.create_request(&input, payload.note).await?;

        tracing::info!(
            request_id = request.id,
            creator_id = actor.id,
            club_code = %request.club_code,
            "Club request created"
        );
        self.events.publish(
            WorkflowEvent::transition(Transition::Create, request.id, None, RequestState::Draft)
                .with_actor(actor.id)
                .with_parties(request.creator_id, None),
        );

        Ok(TransitionOutcome {
            request,
            history_entry,
            document: None,
            schedule: None,
            provisioning: None,
        })
    }

    /// Hard-delete a DRAFT. Its history goes with it.
    pub async fn delete_draft(&self, request_id: DbId, actor: Actor) -> WorkflowResult<()> {
        let request = self.get_request(request_id).await?;
        let state = request.workflow_state()?;
        let rule = rule(state, request.outcome()?, Transition::Delete)
            .ok_or_else(|| illegal(state, Transition::Delete))?;
        authorize(Transition::Delete, rule.actor, &actor, &request)?;

        if !self
            .store
            .delete_draft(request_id, request.lock_version)
            .await?
        {
            return Err(CoreError::Conflict(format!(
                "club_request {request_id} changed since it was loaded; reload and retry"
            ))
            .into());
        }

        tracing::info!(request_id, actor_id = actor.id, "Draft club request deleted");
        self.events.publish(
            WorkflowEvent::transition(Transition::Delete, request_id, Some(state), state)
                .with_actor(actor.id)
                .with_parties(request.creator_id, None),
        );
        Ok(())
    }

    /// Apply `transition` to a request on behalf of `actor`.
    ///
    /// Fails with `IllegalTransition` when the table has no such edge,
    /// `Forbidden` when the actor does not satisfy the row, `Validation` when
    /// the payload lacks a required field, and `Conflict` when a concurrent
    /// transition committed first. A failed call writes nothing.
    pub async fn apply(
        &self,
        request_id: DbId,
        transition: Transition,
        actor: Actor,
        payload: TransitionPayload,
    ) -> WorkflowResult<TransitionOutcome> {
        let correlation_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "club_request_transition",
            %correlation_id,
            request_id,
            transition = %transition,
            actor_id = actor.id,
            actor_role = %actor.role,
        );

        async move {
            let result = self.apply_inner(request_id, transition, actor, payload).await;
            match &result {
                Ok(outcome) => tracing::info!(
                    to_state = %outcome.request.state,
                    lock_version = outcome.request.lock_version,
                    "Transition committed"
                ),
                Err(e) => tracing::warn!(error = %e, retryable = e.is_retryable(), "Transition refused"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn apply_inner(
        &self,
        request_id: DbId,
        transition: Transition,
        actor: Actor,
        payload: TransitionPayload,
    ) -> WorkflowResult<TransitionOutcome> {
        if matches!(transition, Transition::Create | Transition::Delete) {
            return Err(CoreError::Validation(format!(
                "{transition} is issued through its dedicated command"
            ))
            .into());
        }

        let now = Utc::now();
        let request = self.get_request(request_id).await?;
        let commit = self.plan(&request, transition, actor, &payload, now).await?;
        let committed = self.store.commit(&commit).await?;

        self.publish_transition(&commit, &committed.request, actor);

        let provisioning = match &committed.provisioning {
            Some(row) => Some(self.provisioning.provision(row).await),
            None => None,
        };

        Ok(TransitionOutcome {
            request: committed.request,
            history_entry: committed.history,
            document: committed.document,
            schedule: committed.schedule,
            provisioning,
        })
    }

    /// Compute everything `transition` writes, without writing it.
    ///
    /// The actor is checked before the payload, so an unauthorized caller
    /// always sees `Forbidden`.
    async fn plan(
        &self,
        request: &ClubRequest,
        transition: Transition,
        actor: Actor,
        payload: &TransitionPayload,
        now: Timestamp,
    ) -> WorkflowResult<TransitionCommit> {
        let state = request.workflow_state()?;
        let outcome = request.outcome()?;
        let rule = rule(state, outcome, transition).ok_or_else(|| illegal(state, transition))?;
        check_reviewer_binding(&rule, state, transition, request)?;
        authorize(transition, rule.actor, &actor, request)?;
        validate_payload(transition, payload, now)?;

        let mut changes = ApplyTransition {
            state: rule.to,
            reviewer_id: request.reviewer_id,
            club_name: request.club_name.clone(),
            club_code: request.club_code.clone(),
            rejection_reason: None,
            defense_outcome: outcome,
            defense_feedback: request.defense_feedback.clone(),
            deadline_at: compute_deadline(
                transition,
                state,
                request.deadline_at,
                now,
                &self.windows,
            ),
        };
        // Self-loops (reassign, draft and schedule edits) keep the reason.
        let enters_rejection = rule.to.is_rejected() && rule.to != state;
        if enters_rejection {
            changes.rejection_reason = payload.reason.as_deref().map(|r| r.trim().to_string());
            changes.defense_outcome = None;
            changes.defense_feedback = None;
        } else if rule.to == state {
            changes.rejection_reason = request.rejection_reason.clone();
        }

        let mut note = payload.note.clone();
        let mut document = None;
        let mut schedule = None;
        let mut provisioning = None;

        match transition {
            Transition::Assign | Transition::Reassign => {
                let reviewer_id = payload
                    .reviewer_id
                    .ok_or_else(|| missing("reviewer_id", transition))?;
                if Some(reviewer_id) == request.reviewer_id {
                    return Err(CoreError::Validation(format!(
                        "user {reviewer_id} is already the assigned reviewer"
                    ))
                    .into());
                }
                self.ensure_staff(reviewer_id).await?;
                changes.reviewer_id = Some(reviewer_id);
            }
            Transition::Receive => changes.reviewer_id = Some(actor.id),
            Transition::UpdateDraft | Transition::SubmitNameRevision => {
                if let Some(name) = &payload.club_name {
                    changes.club_name = name.trim().to_string();
                }
                if let Some(code) = &payload.club_code {
                    changes.club_code = code.clone();
                }
                if transition == Transition::SubmitNameRevision {
                    note = Some(rename_note(request, &changes, payload.note.as_deref()));
                }
            }
            Transition::SubmitProposal | Transition::SubmitFinalForm => {
                let submission = payload
                    .document
                    .as_ref()
                    .ok_or_else(|| missing("document", transition))?;
                let kind = if transition == Transition::SubmitProposal {
                    DocumentKind::Proposal
                } else {
                    DocumentKind::FinalForm
                };
                document = Some(CreateDocumentVersion {
                    request_id: request.id,
                    kind,
                    title: submission.title.trim().to_string(),
                    comment: submission.comment.clone(),
                    document_ref: submission.document_ref.clone(),
                    submitted_by: actor.id,
                });
            }
            Transition::ProposeDefenseSchedule => {
                let proposal = payload
                    .schedule
                    .as_ref()
                    .ok_or_else(|| missing("schedule", transition))?;
                schedule = Some(ScheduleChange::Propose(CreateDefenseSchedule {
                    request_id: request.id,
                    scheduled_at: proposal.scheduled_at,
                    location: proposal.location.trim().to_string(),
                    proposed_by: actor.id,
                }));
            }
            Transition::UpdateSchedule | Transition::ApproveSchedule | Transition::RejectSchedule => {
                self.ensure_schedule_editable(request.id, state, transition)
                    .await?;
                schedule = Some(match transition {
                    Transition::UpdateSchedule => {
                        let proposal = payload
                            .schedule
                            .as_ref()
                            .ok_or_else(|| missing("schedule", transition))?;
                        ScheduleChange::Update {
                            scheduled_at: proposal.scheduled_at,
                            location: proposal.location.trim().to_string(),
                        }
                    }
                    Transition::ApproveSchedule => ScheduleChange::Decide {
                        status: ScheduleStatus::Approved,
                        note: payload.note.clone(),
                    },
                    _ => ScheduleChange::Decide {
                        status: ScheduleStatus::Rejected,
                        note: changes.rejection_reason.clone(),
                    },
                });
            }
            Transition::CompleteDefense => {
                let result = payload
                    .outcome
                    .ok_or_else(|| missing("outcome", transition))?;
                changes.defense_outcome = Some(result);
                changes.defense_feedback = payload.feedback.clone();
                if note.is_none() {
                    note = Some(format!("Defense {result}"));
                }
            }
            Transition::ApproveFinalForm => {
                provisioning = Some(CreateClubProvisioning {
                    request_id: request.id,
                    founder_id: request.creator_id,
                    club_name: changes.club_name.clone(),
                    club_code: changes.club_code.clone(),
                });
            }
            _ => {}
        }

        if enters_rejection && note.is_none() {
            note = changes.rejection_reason.clone();
        }

        Ok(TransitionCommit {
            request_id: request.id,
            expected_lock_version: request.lock_version,
            expected_state: state,
            history: CreateHistoryEntry {
                request_id: request.id,
                actor_id: actor.id,
                transition,
                from_state: Some(state),
                to_state: rule.to,
                note,
            },
            changes,
            document,
            schedule,
            provisioning,
        })
    }

    /// The named user must exist and hold a staff role.
    async fn ensure_staff(&self, user_id: DbId) -> WorkflowResult<()> {
        let role = self
            .identity
            .role_of(user_id)
            .await
            .map_err(|e| CoreError::Internal(format!("Identity lookup failed: {e}")))?;
        match role {
            Some(role) if role.is_staff() => Ok(()),
            Some(role) => Err(CoreError::Validation(format!(
                "user {user_id} is {role}, reviewers must be STAFF or ADMIN"
            ))
            .into()),
            None => Err(CoreError::Validation(format!("user {user_id} does not exist")).into()),
        }
    }

    async fn ensure_schedule_editable(
        &self,
        request_id: DbId,
        state: RequestState,
        transition: Transition,
    ) -> WorkflowResult<()> {
        let active = self.store.active_schedule(request_id).await?;
        let editable = match &active {
            Some(schedule) => schedule.schedule_status()?.is_editable(),
            None => false,
        };
        if !editable {
            return Err(CoreError::IllegalTransition {
                state: format!("{state} without a PROPOSED defense schedule"),
                transition: transition.as_str(),
            }
            .into());
        }
        Ok(())
    }

    fn publish_transition(&self, commit: &TransitionCommit, request: &ClubRequest, actor: Actor) {
        let payload = serde_json::json!({
            "lock_version": request.lock_version,
            "rejection_reason": request.rejection_reason,
            "defense_outcome": request.defense_outcome,
            "deadline_at": request.deadline_at,
            "note": commit.history.note,
        });
        self.events.publish(
            WorkflowEvent::transition(
                commit.history.transition,
                request.id,
                commit.history.from_state,
                commit.history.to_state,
            )
            .with_actor(actor.id)
            .with_parties(request.creator_id, request.reviewer_id)
            .with_payload(payload),
        );
    }

    // -- Documents -----------------------------------------------------------

    /// Put a file into document storage and return the submission to pass
    /// to `submit_proposal` / `submit_final_form`.
    pub async fn store_document(&self, upload: DocumentUpload) -> WorkflowResult<DocumentSubmission> {
        let document_ref = self
            .documents
            .store(&upload.file_name, &upload.content)
            .await
            .map_err(|e| CoreError::Internal(format!("Document storage failed: {e}")))?;

        let submission = DocumentSubmission {
            title: upload.title,
            comment: upload.comment,
            document_ref,
        };
        validate_document(&submission)?;
        Ok(submission)
    }

    // -- Reads ---------------------------------------------------------------

    pub async fn get_request(&self, request_id: DbId) -> WorkflowResult<ClubRequest> {
        self.store
            .find_request(request_id)
            .await?
            .ok_or_else(|| {
                CoreError::NotFound {
                    entity: "club_request",
                    id: request_id,
                }
                .into()
            })
    }

    /// Audit entries in commit order.
    pub async fn list_history(
        &self,
        request_id: DbId,
        limit: i64,
        offset: i64,
    ) -> WorkflowResult<Vec<WorkflowHistoryEntry>> {
        self.store.list_history(request_id, limit, offset).await
    }

    pub async fn list_proposal_versions(&self, request_id: DbId) -> WorkflowResult<Vec<DocumentVersion>> {
        self.store
            .list_documents(request_id, DocumentKind::Proposal)
            .await
    }

    pub async fn list_final_form_versions(
        &self,
        request_id: DbId,
    ) -> WorkflowResult<Vec<DocumentVersion>> {
        self.store
            .list_documents(request_id, DocumentKind::FinalForm)
            .await
    }

    pub async fn latest_document(
        &self,
        request_id: DbId,
        kind: DocumentKind,
    ) -> WorkflowResult<Option<DocumentVersion>> {
        self.store.latest_document(request_id, kind).await
    }

    /// The active (PROPOSED or APPROVED) defense schedule.
    pub async fn get_defense_schedule(
        &self,
        request_id: DbId,
    ) -> WorkflowResult<Option<DefenseSchedule>> {
        self.store.active_schedule(request_id).await
    }

    pub async fn list_defense_schedules(
        &self,
        request_id: DbId,
    ) -> WorkflowResult<Vec<DefenseSchedule>> {
        self.store.list_schedules(request_id).await
    }

    pub async fn is_overdue(&self, request_id: DbId, now: Timestamp) -> WorkflowResult<bool> {
        let request = self.get_request(request_id).await?;
        Ok(is_overdue(request.deadline_at, now))
    }

    pub async fn list_overdue(&self, now: Timestamp, limit: i64) -> WorkflowResult<Vec<ClubRequest>> {
        self.store.list_overdue(now, limit).await
    }

    /// Approved requests whose club has not been provisioned yet.
    pub async fn list_unprovisioned(&self, limit: i64) -> WorkflowResult<Vec<ClubProvisioning>> {
        self.store.list_unprovisioned(limit).await
    }

    /// Transitions `actor` may fire on the request right now.
    pub async fn allowed_transitions(
        &self,
        request_id: DbId,
        actor: Actor,
    ) -> WorkflowResult<Vec<Transition>> {
        let request = self.get_request(request_id).await?;
        let state = request.workflow_state()?;
        let outcome = request.outcome()?;

        Ok(Transition::ALL
            .iter()
            .copied()
            .filter(|t| match rule(state, outcome, *t) {
                Some(r) => {
                    check_reviewer_binding(&r, state, *t, &request).is_ok()
                        && authorize(*t, r.actor, &actor, &request).is_ok()
                }
                None => false,
            })
            .collect())
    }

    /// Replay the audit trail and check it lands on the current state.
    pub async fn verify_history(&self, request_id: DbId) -> WorkflowResult<RequestState> {
        let request = self.get_request(request_id).await?;
        let current = request.workflow_state()?;
        let steps = self
            .store
            .list_all_history(request_id)
            .await?
            .iter()
            .map(WorkflowHistoryEntry::to_step)
            .collect::<Result<Vec<_>, _>>()?;
        replay::verify(&steps, current)?;
        Ok(current)
    }
}

// ---------------------------------------------------------------------------
// Per-transition commands
// ---------------------------------------------------------------------------

macro_rules! transition_commands {
    ($($(#[$doc:meta])* $name:ident => $transition:ident;)*) => {
        impl TransitionEngine {
            $(
                $(#[$doc])*
                pub async fn $name(
                    &self,
                    request_id: DbId,
                    actor: Actor,
                    payload: TransitionPayload,
                ) -> WorkflowResult<TransitionOutcome> {
                    self.apply(request_id, Transition::$transition, actor, payload).await
                }
            )*
        }
    };
}

transition_commands! {
    /// Edit the candidate club name/code of a DRAFT.
    update_draft => UpdateDraft;
    submit => Submit;
    /// Bind the reviewer named in `payload.reviewer_id`.
    assign => Assign;
    /// Bind the acting staff member as reviewer.
    receive => Receive;
    /// Re-bind to another reviewer. ADMIN only.
    reassign => Reassign;
    confirm_contact => ConfirmContact;
    reject_contact => RejectContact;
    request_proposal => RequestProposal;
    submit_proposal => SubmitProposal;
    approve_proposal => ApproveProposal;
    reject_proposal => RejectProposal;
    propose_defense_schedule => ProposeDefenseSchedule;
    update_schedule => UpdateSchedule;
    approve_schedule => ApproveSchedule;
    reject_schedule => RejectSchedule;
    complete_defense => CompleteDefense;
    submit_final_form => SubmitFinalForm;
    /// Terminal approval; provisions the club after the commit.
    approve_final_form => ApproveFinalForm;
    request_name_revision => RequestNameRevision;
    submit_name_revision => SubmitNameRevision;
    cancel => Cancel;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn illegal(state: RequestState, transition: Transition) -> CoreError {
    CoreError::IllegalTransition {
        state: state.as_str().to_string(),
        transition: transition.as_str(),
    }
}

fn missing(field: &str, transition: Transition) -> CoreError {
    CoreError::Validation(format!("{field} is required for {transition}"))
}

fn check_reviewer_binding(
    rule: &TransitionRule,
    state: RequestState,
    transition: Transition,
    request: &ClubRequest,
) -> Result<(), CoreError> {
    let qualifier = match rule.reviewer {
        ReviewerBinding::Unbound if request.reviewer_id.is_some() => "with a reviewer assigned",
        ReviewerBinding::Bound if request.reviewer_id.is_none() => "without a reviewer assigned",
        _ => return Ok(()),
    };
    Err(CoreError::IllegalTransition {
        state: format!("{state} {qualifier}"),
        transition: transition.as_str(),
    })
}

fn authorize(
    transition: Transition,
    requirement: ActorRequirement,
    actor: &Actor,
    request: &ClubRequest,
) -> Result<(), CoreError> {
    let (allowed, who) = match requirement {
        ActorRequirement::Creator => (actor.id == request.creator_id, "the request's creator"),
        ActorRequirement::AnyStaff => (actor.role.is_staff(), "a STAFF or ADMIN user"),
        ActorRequirement::AssignedReviewer => (
            actor.role.is_staff() && request.reviewer_id == Some(actor.id),
            "the assigned reviewer",
        ),
        ActorRequirement::Admin => (actor.role == Role::Admin, "an ADMIN"),
    };
    if allowed {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "{transition} on club_request {} requires {who}; actor {} ({}) does not qualify",
            request.id, actor.id, actor.role
        )))
    }
}

fn rename_note(request: &ClubRequest, changes: &ApplyTransition, note: Option<&str>) -> String {
    let mut text = format!(
        "Renamed '{}' ({}) -> '{}' ({})",
        request.club_name, request.club_code, changes.club_name, changes.club_code
    );
    if let Some(note) = note {
        text.push_str(": ");
        text.push_str(note);
    }
    text
}
