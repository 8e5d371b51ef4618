//! Reconstruct a request's state by folding its audit trail.

use crate::error::CoreError;
use crate::workflow::{target_state, RequestState, Transition};

/// The parts of a history entry needed to replay it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryStep {
    pub transition: Transition,
    pub from_state: Option<RequestState>,
    pub to_state: RequestState,
}

/// Fold `steps` (commit order) from "no request" through the transition
/// table. Returns `None` for an empty trail.
///
/// Each step must start where the previous one ended and land where the
/// table says the transition leads.
pub fn replay(steps: &[HistoryStep]) -> Result<Option<RequestState>, CoreError> {
    let mut current: Option<RequestState> = None;

    for (idx, step) in steps.iter().enumerate() {
        if step.from_state != current {
            return Err(CoreError::Internal(format!(
                "History step {idx} ({}) starts at {}, expected {}",
                step.transition,
                describe(step.from_state),
                describe(current),
            )));
        }

        let expected = match (current, step.transition) {
            (None, Transition::Create) => Some(RequestState::Draft),
            (None, _) => None,
            (Some(state), transition) => target_state(state, transition),
        };

        if expected != Some(step.to_state) {
            return Err(CoreError::Internal(format!(
                "History step {idx} ({}) moves {} -> {}, which the transition table does not allow",
                step.transition,
                describe(step.from_state),
                step.to_state,
            )));
        }

        current = Some(step.to_state);
    }

    Ok(current)
}

/// Check that replaying `steps` lands on `current`.
pub fn verify(steps: &[HistoryStep], current: RequestState) -> Result<(), CoreError> {
    match replay(steps)? {
        Some(state) if state == current => Ok(()),
        replayed => Err(CoreError::Internal(format!(
            "Replayed state {} does not match current state {current}",
            describe(replayed)
        ))),
    }
}

fn describe(state: Option<RequestState>) -> &'static str {
    state.map(|s| s.as_str()).unwrap_or("(none)")
}
