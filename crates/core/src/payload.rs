//! Transition payloads and per-transition required-field checks.
//!
//! Every command carries the same [`TransitionPayload`] shape; which fields are
//! mandatory depends on the transition and is enforced by
//! [`validate_payload`] once the engine has authorized the actor.

use serde::{Deserialize, Serialize};

use crate::documents::{validate_document, DocumentSubmission};
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};
use crate::workflow::{DefenseOutcome, Transition};

/// Maximum length of a candidate club name.
pub const MAX_CLUB_NAME_LENGTH: usize = 100;

/// Allowed length range of a candidate club code.
pub const MIN_CLUB_CODE_LENGTH: usize = 2;
pub const MAX_CLUB_CODE_LENGTH: usize = 16;

/// Maximum length of a rejection reason.
pub const MAX_REASON_LENGTH: usize = 1000;

/// Maximum length of an audit note or reviewer feedback.
pub const MAX_NOTE_LENGTH: usize = 2000;

/// Maximum length of a defense location / medium description.
pub const MAX_LOCATION_LENGTH: usize = 200;

/// Proposed defense date, time and place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleProposal {
    pub scheduled_at: Timestamp,
    pub location: String,
}

/// Caller-supplied data for a transition. Unused fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPayload {
    /// Free-text note recorded on the audit entry.
    pub note: Option<String>,
    /// Rejection reason, required by every reject-* transition.
    pub reason: Option<String>,
    pub club_name: Option<String>,
    pub club_code: Option<String>,
    /// Reviewer to bind (assign, reassign).
    pub reviewer_id: Option<DbId>,
    pub document: Option<DocumentSubmission>,
    pub schedule: Option<ScheduleProposal>,
    pub outcome: Option<DefenseOutcome>,
    pub feedback: Option<String>,
}

impl TransitionPayload {
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn rejection(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn reviewer(reviewer_id: DbId) -> Self {
        Self {
            reviewer_id: Some(reviewer_id),
            ..Self::default()
        }
    }

    pub fn document(document: DocumentSubmission) -> Self {
        Self {
            document: Some(document),
            ..Self::default()
        }
    }

    pub fn schedule(scheduled_at: Timestamp, location: impl Into<String>) -> Self {
        Self {
            schedule: Some(ScheduleProposal {
                scheduled_at,
                location: location.into(),
            }),
            ..Self::default()
        }
    }

    pub fn defense(outcome: DefenseOutcome, feedback: Option<String>) -> Self {
        Self {
            outcome: Some(outcome),
            feedback,
            ..Self::default()
        }
    }

    pub fn name_revision(club_name: Option<String>, club_code: Option<String>) -> Self {
        Self {
            club_name,
            club_code,
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Field validators
// ---------------------------------------------------------------------------

/// Validate a candidate club name: non-blank, bounded length.
pub fn validate_club_name(name: &str) -> Result<(), CoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Club name must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_CLUB_NAME_LENGTH {
        return Err(CoreError::Validation(format!(
            "Club name exceeds maximum length of {MAX_CLUB_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Validate a candidate club code: upper-case ASCII letters, digits and `_`.
pub fn validate_club_code(code: &str) -> Result<(), CoreError> {
    let len = code.len();
    if !(MIN_CLUB_CODE_LENGTH..=MAX_CLUB_CODE_LENGTH).contains(&len) {
        return Err(CoreError::Validation(format!(
            "Club code must be between {MIN_CLUB_CODE_LENGTH} and {MAX_CLUB_CODE_LENGTH} characters"
        )));
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(CoreError::Validation(format!(
            "Club code '{code}' may only contain A-Z, 0-9 and '_'"
        )));
    }
    Ok(())
}

fn require_text<'a>(
    value: Option<&'a str>,
    field: &str,
    max: usize,
) -> Result<&'a str, CoreError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(CoreError::Validation(format!("{field} is required")));
    }
    check_length(value, field, max)?;
    Ok(value)
}

fn check_length(value: &str, field: &str, max: usize) -> Result<(), CoreError> {
    if value.chars().count() > max {
        return Err(CoreError::Validation(format!(
            "{field} exceeds maximum length of {max} characters"
        )));
    }
    Ok(())
}

fn require_name_or_code(payload: &TransitionPayload) -> Result<(), CoreError> {
    if payload.club_name.is_none() && payload.club_code.is_none() {
        return Err(CoreError::Validation(
            "At least one of club_name or club_code is required".into(),
        ));
    }
    if let Some(name) = &payload.club_name {
        validate_club_name(name)?;
    }
    if let Some(code) = &payload.club_code {
        validate_club_code(code)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Per-transition requirements
// ---------------------------------------------------------------------------

/// Check the fields `transition` needs. `now` bounds schedule proposals,
/// which must lie in the future.
pub fn validate_payload(
    transition: Transition,
    payload: &TransitionPayload,
    now: Timestamp,
) -> Result<(), CoreError> {
    if let Some(note) = &payload.note {
        check_length(note, "note", MAX_NOTE_LENGTH)?;
    }

    match transition {
        Transition::Create => {
            validate_club_name(payload.club_name.as_deref().unwrap_or_default())?;
            validate_club_code(payload.club_code.as_deref().unwrap_or_default())?;
        }
        Transition::UpdateDraft | Transition::SubmitNameRevision => {
            require_name_or_code(payload)?;
        }
        Transition::Assign | Transition::Reassign => {
            if payload.reviewer_id.is_none() {
                return Err(CoreError::Validation(format!(
                    "reviewer_id is required for {transition}"
                )));
            }
        }
        Transition::RejectContact | Transition::RejectProposal | Transition::RejectSchedule => {
            require_text(payload.reason.as_deref(), "reason", MAX_REASON_LENGTH)?;
        }
        Transition::SubmitProposal | Transition::SubmitFinalForm => match &payload.document {
            Some(document) => validate_document(document)?,
            None => {
                return Err(CoreError::Validation(format!(
                    "document is required for {transition}"
                )))
            }
        },
        Transition::ProposeDefenseSchedule | Transition::UpdateSchedule => {
            let schedule = payload.schedule.as_ref().ok_or_else(|| {
                CoreError::Validation(format!("schedule is required for {transition}"))
            })?;
            if schedule.scheduled_at <= now {
                return Err(CoreError::Validation(
                    "Defense must be scheduled in the future".into(),
                ));
            }
            require_text(Some(&schedule.location), "location", MAX_LOCATION_LENGTH)?;
        }
        Transition::CompleteDefense => {
            if payload.outcome.is_none() {
                return Err(CoreError::Validation(
                    "outcome (PASSED or FAILED) is required for complete-defense".into(),
                ));
            }
            if let Some(feedback) = &payload.feedback {
                check_length(feedback, "feedback", MAX_NOTE_LENGTH)?;
            }
        }
        Transition::Delete
        | Transition::Submit
        | Transition::Receive
        | Transition::ConfirmContact
        | Transition::RequestProposal
        | Transition::ApproveProposal
        | Transition::ApproveSchedule
        | Transition::ApproveFinalForm
        | Transition::RequestNameRevision
        | Transition::Cancel => {}
    }

    Ok(())
}
