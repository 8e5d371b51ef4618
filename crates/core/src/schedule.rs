//! Defense schedule confirmation states.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Proposed,
    Approved,
    Rejected,
    /// Replaced by a later proposal for the same request.
    Superseded,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposed => "PROPOSED",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Superseded => "SUPERSEDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PROPOSED" => Some(Self::Proposed),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            "SUPERSEDED" => Some(Self::Superseded),
            _ => None,
        }
    }

    /// At most one schedule per request may be active at a time.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Proposed | Self::Approved)
    }

    /// Only a schedule still awaiting review may be edited.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Proposed)
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that no more than one of `statuses` is active.
pub fn validate_single_active(statuses: &[ScheduleStatus]) -> Result<(), CoreError> {
    let active = statuses.iter().filter(|s| s.is_active()).count();
    if active > 1 {
        return Err(CoreError::Internal(format!(
            "{active} active defense schedules, expected at most one"
        )));
    }
    Ok(())
}
