//! Repository for the `defense_schedules` table.

use clubflow_core::schedule::ScheduleStatus;
use clubflow_core::types::{DbId, Timestamp};
use sqlx::{PgConnection, PgPool};

use crate::models::defense_schedule::{CreateDefenseSchedule, DefenseSchedule};

const COLUMNS: &str = "id, request_id, scheduled_at, location, proposed_by, status, \
    reviewer_note, created_at, updated_at";

/// Schedule proposals for a request's defense.
pub struct DefenseScheduleRepo;

impl DefenseScheduleRepo {
    /// Mark any still-PROPOSED schedule for the request as SUPERSEDED.
    /// Returns the number of rows changed.
    pub async fn supersede_proposed(
        conn: &mut PgConnection,
        request_id: DbId,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE defense_schedules SET status = $2, updated_at = NOW() \
             WHERE request_id = $1 AND status = $3",
        )
        .bind(request_id)
        .bind(ScheduleStatus::Superseded.as_str())
        .bind(ScheduleStatus::Proposed.as_str())
        .execute(conn)
        .await?;
        Ok(result.rows_affected())
    }

    /// Insert a new PROPOSED schedule. Call [`supersede_proposed`] first in
    /// the same transaction; `uq_defense_schedules_active` rejects a second
    /// active row.
    ///
    /// [`supersede_proposed`]: Self::supersede_proposed
    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateDefenseSchedule,
    ) -> Result<DefenseSchedule, sqlx::Error> {
        let query = format!(
            "INSERT INTO defense_schedules (request_id, scheduled_at, location, proposed_by, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DefenseSchedule>(&query)
            .bind(input.request_id)
            .bind(input.scheduled_at)
            .bind(&input.location)
            .bind(input.proposed_by)
            .bind(ScheduleStatus::Proposed.as_str())
            .fetch_one(conn)
            .await
    }

    /// Edit the PROPOSED schedule. Returns `None` when there is none.
    pub async fn update_proposed(
        conn: &mut PgConnection,
        request_id: DbId,
        scheduled_at: Timestamp,
        location: &str,
    ) -> Result<Option<DefenseSchedule>, sqlx::Error> {
        let query = format!(
            "UPDATE defense_schedules SET
                scheduled_at = $2,
                location = $3,
                updated_at = NOW()
             WHERE request_id = $1 AND status = $4
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DefenseSchedule>(&query)
            .bind(request_id)
            .bind(scheduled_at)
            .bind(location)
            .bind(ScheduleStatus::Proposed.as_str())
            .fetch_optional(conn)
            .await
    }

    /// Approve or reject the PROPOSED schedule. Returns `None` when there is
    /// none.
    pub async fn decide_proposed(
        conn: &mut PgConnection,
        request_id: DbId,
        status: ScheduleStatus,
        reviewer_note: Option<&str>,
    ) -> Result<Option<DefenseSchedule>, sqlx::Error> {
        let query = format!(
            "UPDATE defense_schedules SET
                status = $2,
                reviewer_note = $3,
                updated_at = NOW()
             WHERE request_id = $1 AND status = $4
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DefenseSchedule>(&query)
            .bind(request_id)
            .bind(status.as_str())
            .bind(reviewer_note)
            .bind(ScheduleStatus::Proposed.as_str())
            .fetch_optional(conn)
            .await
    }

    /// The active (PROPOSED or APPROVED) schedule, if any.
    pub async fn find_active(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Option<DefenseSchedule>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM defense_schedules
             WHERE request_id = $1 AND status IN ($2, $3)"
        );
        sqlx::query_as::<_, DefenseSchedule>(&query)
            .bind(request_id)
            .bind(ScheduleStatus::Proposed.as_str())
            .bind(ScheduleStatus::Approved.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Every schedule ever proposed for the request, oldest first.
    pub async fn list_for_request(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Vec<DefenseSchedule>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM defense_schedules WHERE request_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, DefenseSchedule>(&query)
            .bind(request_id)
            .fetch_all(pool)
            .await
    }
}
