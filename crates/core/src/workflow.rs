//! Club-establishment request state machine.
//!
//! Every legal edge lives in [`rule`]: the engine never hard-codes per-command
//! state checks, it looks the (state, defense outcome, transition) triple up
//! here and enforces the returned actor requirement and reviewer binding.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request states
// ---------------------------------------------------------------------------

/// Lifecycle state of a club-establishment request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestState {
    Draft,
    Submitted,
    ContactConfirmed,
    ContactRejected,
    ProposalRequested,
    ProposalSubmitted,
    ProposalApproved,
    ProposalRejected,
    DefenseScheduleProposed,
    DefenseScheduleApproved,
    DefenseScheduleRejected,
    DefenseCompleted,
    FinalFormSubmitted,
    NameRevisionRequested,
    FinalFormApproved,
    Canceled,
}

impl RequestState {
    pub const ALL: &'static [RequestState] = &[
        Self::Draft,
        Self::Submitted,
        Self::ContactConfirmed,
        Self::ContactRejected,
        Self::ProposalRequested,
        Self::ProposalSubmitted,
        Self::ProposalApproved,
        Self::ProposalRejected,
        Self::DefenseScheduleProposed,
        Self::DefenseScheduleApproved,
        Self::DefenseScheduleRejected,
        Self::DefenseCompleted,
        Self::FinalFormSubmitted,
        Self::NameRevisionRequested,
        Self::FinalFormApproved,
        Self::Canceled,
    ];

    /// Return the state name as stored in the `club_requests.state` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::ContactConfirmed => "CONTACT_CONFIRMED",
            Self::ContactRejected => "CONTACT_REJECTED",
            Self::ProposalRequested => "PROPOSAL_REQUESTED",
            Self::ProposalSubmitted => "PROPOSAL_SUBMITTED",
            Self::ProposalApproved => "PROPOSAL_APPROVED",
            Self::ProposalRejected => "PROPOSAL_REJECTED",
            Self::DefenseScheduleProposed => "DEFENSE_SCHEDULE_PROPOSED",
            Self::DefenseScheduleApproved => "DEFENSE_SCHEDULE_APPROVED",
            Self::DefenseScheduleRejected => "DEFENSE_SCHEDULE_REJECTED",
            Self::DefenseCompleted => "DEFENSE_COMPLETED",
            Self::FinalFormSubmitted => "FINAL_FORM_SUBMITTED",
            Self::NameRevisionRequested => "NAME_REVISION_REQUESTED",
            Self::FinalFormApproved => "FINAL_FORM_APPROVED",
            Self::Canceled => "CANCELED",
        }
    }

    /// Parse a stored state name. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|state| state.as_str() == s)
    }

    /// States that carry a rejection reason.
    pub fn is_rejected(&self) -> bool {
        matches!(
            self,
            Self::ContactRejected | Self::ProposalRejected | Self::DefenseScheduleRejected
        )
    }
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Defense outcome
// ---------------------------------------------------------------------------

/// Result of the oral defense recorded by `complete-defense`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DefenseOutcome {
    Passed,
    Failed,
}

impl DefenseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PASSED" => Some(Self::Passed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for DefenseOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Named workflow command. Stored in `workflow_history.transition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transition {
    Create,
    UpdateDraft,
    Delete,
    Submit,
    Assign,
    Receive,
    Reassign,
    ConfirmContact,
    RejectContact,
    RequestProposal,
    SubmitProposal,
    ApproveProposal,
    RejectProposal,
    ProposeDefenseSchedule,
    UpdateSchedule,
    ApproveSchedule,
    RejectSchedule,
    CompleteDefense,
    SubmitFinalForm,
    ApproveFinalForm,
    RequestNameRevision,
    SubmitNameRevision,
    Cancel,
}

impl Transition {
    pub const ALL: &'static [Transition] = &[
        Self::Create,
        Self::UpdateDraft,
        Self::Delete,
        Self::Submit,
        Self::Assign,
        Self::Receive,
        Self::Reassign,
        Self::ConfirmContact,
        Self::RejectContact,
        Self::RequestProposal,
        Self::SubmitProposal,
        Self::ApproveProposal,
        Self::RejectProposal,
        Self::ProposeDefenseSchedule,
        Self::UpdateSchedule,
        Self::ApproveSchedule,
        Self::RejectSchedule,
        Self::CompleteDefense,
        Self::SubmitFinalForm,
        Self::ApproveFinalForm,
        Self::RequestNameRevision,
        Self::SubmitNameRevision,
        Self::Cancel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::UpdateDraft => "update",
            Self::Delete => "delete",
            Self::Submit => "submit",
            Self::Assign => "assign",
            Self::Receive => "receive",
            Self::Reassign => "reassign",
            Self::ConfirmContact => "confirm-contact",
            Self::RejectContact => "reject-contact",
            Self::RequestProposal => "request-proposal",
            Self::SubmitProposal => "submit-proposal",
            Self::ApproveProposal => "approve-proposal",
            Self::RejectProposal => "reject-proposal",
            Self::ProposeDefenseSchedule => "propose-defense-schedule",
            Self::UpdateSchedule => "update-schedule",
            Self::ApproveSchedule => "approve-schedule",
            Self::RejectSchedule => "reject-schedule",
            Self::CompleteDefense => "complete-defense",
            Self::SubmitFinalForm => "submit-final-form",
            Self::ApproveFinalForm => "approve-final-form",
            Self::RequestNameRevision => "request-name-revision",
            Self::SubmitNameRevision => "submit-name-revision",
            Self::Cancel => "cancel",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    /// Transitions that bind or re-bind the assigned reviewer.
    pub fn binds_reviewer(&self) -> bool {
        matches!(self, Self::Assign | Self::Receive | Self::Reassign)
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Transition table
// ---------------------------------------------------------------------------

/// Who may fire a given row of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorRequirement {
    /// The student who created the request.
    Creator,
    /// Any STAFF or ADMIN user.
    AnyStaff,
    /// Exactly the reviewer bound to the request.
    AssignedReviewer,
    /// ADMIN only.
    Admin,
}

/// Precondition on the request's reviewer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewerBinding {
    Any,
    Unbound,
    Bound,
}

/// One row of the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub to: RequestState,
    pub actor: ActorRequirement,
    pub reviewer: ReviewerBinding,
}

const fn row(to: RequestState, actor: ActorRequirement) -> TransitionRule {
    TransitionRule {
        to,
        actor,
        reviewer: ReviewerBinding::Any,
    }
}

/// Look up the table row for `transition` fired from `state`.
///
/// `outcome` only matters in `DEFENSE_COMPLETED`: a FAILED defense has no
/// outgoing edges at all. `create` has no source state and is never
/// returned here.
pub fn rule(
    state: RequestState,
    outcome: Option<DefenseOutcome>,
    transition: Transition,
) -> Option<TransitionRule> {
    use ActorRequirement::*;
    use RequestState as S;
    use Transition as T;

    match (state, transition) {
        (S::Draft, T::UpdateDraft) | (S::Draft, T::Delete) => Some(row(S::Draft, Creator)),
        (S::Draft, T::Submit) => Some(row(S::Submitted, Creator)),

        (S::Submitted, T::Assign) | (S::Submitted, T::Receive) => Some(TransitionRule {
            to: S::Submitted,
            actor: AnyStaff,
            reviewer: ReviewerBinding::Unbound,
        }),
        (S::Submitted, T::ConfirmContact) => Some(row(S::ContactConfirmed, AssignedReviewer)),
        (S::Submitted, T::RejectContact) => Some(row(S::ContactRejected, AssignedReviewer)),

        (S::ContactConfirmed, T::RequestProposal) => {
            Some(row(S::ProposalRequested, AssignedReviewer))
        }

        (S::ProposalRequested, T::SubmitProposal) | (S::ProposalRejected, T::SubmitProposal) => {
            Some(row(S::ProposalSubmitted, Creator))
        }
        (S::ProposalSubmitted, T::ApproveProposal) => {
            Some(row(S::ProposalApproved, AssignedReviewer))
        }
        (S::ProposalSubmitted, T::RejectProposal) => {
            Some(row(S::ProposalRejected, AssignedReviewer))
        }

        (S::ProposalApproved, T::ProposeDefenseSchedule)
        | (S::DefenseScheduleRejected, T::ProposeDefenseSchedule) => {
            Some(row(S::DefenseScheduleProposed, Creator))
        }
        (S::DefenseScheduleProposed, T::UpdateSchedule) => {
            Some(row(S::DefenseScheduleProposed, Creator))
        }
        (S::DefenseScheduleProposed, T::ApproveSchedule) => {
            Some(row(S::DefenseScheduleApproved, AssignedReviewer))
        }
        (S::DefenseScheduleProposed, T::RejectSchedule) => {
            Some(row(S::DefenseScheduleRejected, AssignedReviewer))
        }
        (S::DefenseScheduleApproved, T::CompleteDefense) => {
            Some(row(S::DefenseCompleted, AssignedReviewer))
        }

        (S::DefenseCompleted, _) if outcome != Some(DefenseOutcome::Passed) => None,
        (S::DefenseCompleted, T::SubmitFinalForm) => Some(row(S::FinalFormSubmitted, Creator)),

        (S::FinalFormSubmitted, T::ApproveFinalForm) => {
            Some(row(S::FinalFormApproved, AssignedReviewer))
        }
        (S::FinalFormSubmitted, T::RequestNameRevision) => {
            Some(row(S::NameRevisionRequested, AssignedReviewer))
        }
        (S::NameRevisionRequested, T::SubmitNameRevision) => {
            Some(row(S::FinalFormSubmitted, Creator))
        }

        // Re-binding the reviewer keeps the state; in SUBMITTED it needs an
        // existing binding, later states always have one.
        (s, T::Reassign) if accepts_reassign(s) => Some(TransitionRule {
            to: s,
            actor: Admin,
            reviewer: ReviewerBinding::Bound,
        }),

        (s, T::Cancel) if accepts_cancel(s) => Some(row(S::Canceled, Creator)),

        _ => None,
    }
}

fn accepts_reassign(state: RequestState) -> bool {
    !matches!(
        state,
        RequestState::Draft
            | RequestState::ContactRejected
            | RequestState::FinalFormApproved
            | RequestState::Canceled
    )
}

/// DRAFT is deleted rather than canceled, and a submitted final form awaits
/// the reviewer's decision.
fn accepts_cancel(state: RequestState) -> bool {
    !matches!(
        state,
        RequestState::Draft
            | RequestState::FinalFormSubmitted
            | RequestState::ContactRejected
            | RequestState::FinalFormApproved
            | RequestState::Canceled
    )
}

/// Target state of `transition` from `state`, ignoring actor and outcome
/// guards. Used when folding the audit trail.
pub fn target_state(state: RequestState, transition: Transition) -> Option<RequestState> {
    rule(state, Some(DefenseOutcome::Passed), transition).map(|r| r.to)
}

/// Every transition with a row for the given state and outcome.
pub fn available_transitions(
    state: RequestState,
    outcome: Option<DefenseOutcome>,
) -> Vec<Transition> {
    Transition::ALL
        .iter()
        .copied()
        .filter(|t| rule(state, outcome, *t).is_some())
        .collect()
}

/// A state with no outgoing edges (re-binding the reviewer does not count).
pub fn is_terminal(state: RequestState, outcome: Option<DefenseOutcome>) -> bool {
    available_transitions(state, outcome)
        .iter()
        .all(|t| *t == Transition::Reassign)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
