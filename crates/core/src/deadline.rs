//! Response-window deadlines attached to a request.
//!
//! Deadlines are informational: an overdue request is reported, never
//! transitioned automatically.

use chrono::Duration;

use crate::types::Timestamp;
use crate::workflow::{RequestState, Transition};

/// Days staff have to triage a request once it is bound to a reviewer.
pub const DEFAULT_TRIAGE_WINDOW_DAYS: i64 = 5;

/// Days the creator has to submit a proposal once one is requested.
pub const DEFAULT_PROPOSAL_WINDOW_DAYS: i64 = 14;

/// Days the creator has to answer a name-revision request.
pub const DEFAULT_NAME_REVISION_WINDOW_DAYS: i64 = 7;

/// Response windows, in days, for the transitions that impose one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineWindows {
    pub triage_days: i64,
    pub proposal_days: i64,
    pub name_revision_days: i64,
}

impl Default for DeadlineWindows {
    fn default() -> Self {
        Self {
            triage_days: DEFAULT_TRIAGE_WINDOW_DAYS,
            proposal_days: DEFAULT_PROPOSAL_WINDOW_DAYS,
            name_revision_days: DEFAULT_NAME_REVISION_WINDOW_DAYS,
        }
    }
}

/// What a committed transition does to the request's deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineEffect {
    /// Set the deadline to `now + window`.
    Set(Duration),
    /// Leave the running deadline alone.
    Keep,
    Clear,
}

/// Deadline effect of `transition` fired from `from`. Transitions without a
/// window clear any deadline left over from the previous step.
///
/// Reassigning restarts the triage window only while triage is pending
/// (SUBMITTED). Elsewhere the running deadline belongs to whoever the
/// request is waiting on, so it is kept.
pub fn deadline_effect(
    transition: Transition,
    from: RequestState,
    windows: &DeadlineWindows,
) -> DeadlineEffect {
    match transition {
        Transition::Reassign if from != RequestState::Submitted => DeadlineEffect::Keep,
        Transition::Assign | Transition::Receive | Transition::Reassign => {
            DeadlineEffect::Set(Duration::days(windows.triage_days))
        }
        Transition::RequestProposal => DeadlineEffect::Set(Duration::days(windows.proposal_days)),
        Transition::RequestNameRevision => {
            DeadlineEffect::Set(Duration::days(windows.name_revision_days))
        }
        _ => DeadlineEffect::Clear,
    }
}

/// New deadline value after `transition` commits at `now`, given the
/// request's state and deadline before the commit.
pub fn compute_deadline(
    transition: Transition,
    from: RequestState,
    current: Option<Timestamp>,
    now: Timestamp,
    windows: &DeadlineWindows,
) -> Option<Timestamp> {
    match deadline_effect(transition, from, windows) {
        DeadlineEffect::Set(window) => Some(now + window),
        DeadlineEffect::Keep => current,
        DeadlineEffect::Clear => None,
    }
}

/// A request is overdue once `now` is strictly past its deadline.
pub fn is_overdue(deadline: Option<Timestamp>, now: Timestamp) -> bool {
    deadline.is_some_and(|due| now > due)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_receive_sets_five_day_triage_window() {
        let now = Utc::now();
        let due = compute_deadline(
            Transition::Receive,
            RequestState::Submitted,
            None,
            now,
            &DeadlineWindows::default(),
        );
        assert_eq!(due, Some(now + Duration::days(5)));
    }

    #[test]
    fn test_request_proposal_uses_proposal_window() {
        let now = Utc::now();
        let windows = DeadlineWindows {
            proposal_days: 10,
            ..DeadlineWindows::default()
        };
        assert_eq!(
            compute_deadline(
                Transition::RequestProposal,
                RequestState::ContactConfirmed,
                None,
                now,
                &windows
            ),
            Some(now + Duration::days(10))
        );
    }

    #[test]
    fn test_other_transitions_clear_deadline() {
        let windows = DeadlineWindows::default();
        for t in [
            Transition::ConfirmContact,
            Transition::SubmitProposal,
            Transition::ApproveFinalForm,
            Transition::Cancel,
        ] {
            assert_eq!(
                deadline_effect(t, RequestState::Submitted, &windows),
                DeadlineEffect::Clear,
                "{t}"
            );
        }
    }

    #[test]
    fn test_reassign_restarts_triage_only_while_submitted() {
        let now = Utc::now();
        let windows = DeadlineWindows::default();
        let running = Some(now + Duration::days(9));

        assert_eq!(
            compute_deadline(Transition::Reassign, RequestState::Submitted, running, now, &windows),
            Some(now + Duration::days(5))
        );
        for from in [
            RequestState::ProposalRequested,
            RequestState::NameRevisionRequested,
            RequestState::ProposalRejected,
        ] {
            assert_eq!(
                compute_deadline(Transition::Reassign, from, running, now, &windows),
                running,
                "{from}"
            );
        }
    }

    #[test]
    fn test_overdue_is_strict() {
        let now = Utc::now();
        assert!(!is_overdue(None, now));
        assert!(!is_overdue(Some(now), now));
        assert!(is_overdue(Some(now - Duration::seconds(1)), now));
        assert!(!is_overdue(Some(now + Duration::days(1)), now));
    }
}
