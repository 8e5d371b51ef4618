//! Defense schedule rows.

use clubflow_core::error::CoreError;
use clubflow_core::schedule::ScheduleStatus;
use clubflow_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `defense_schedules` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct DefenseSchedule {
    pub id: DbId,
    pub request_id: DbId,
    pub scheduled_at: Timestamp,
    pub location: String,
    pub proposed_by: DbId,
    pub status: String,
    pub reviewer_note: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl DefenseSchedule {
    pub fn schedule_status(&self) -> Result<ScheduleStatus, CoreError> {
        ScheduleStatus::from_str(&self.status).ok_or_else(|| {
            CoreError::Internal(format!(
                "defense_schedule {} has unknown status '{}'",
                self.id, self.status
            ))
        })
    }
}

/// DTO for proposing a new schedule.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateDefenseSchedule {
    pub request_id: DbId,
    pub scheduled_at: Timestamp,
    pub location: String,
    pub proposed_by: DbId,
}
