//! Deadline queries over `club_requests.deadline_at`.

use clubflow_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use super::club_request_repo::COLUMNS;
use crate::models::club_request::ClubRequest;

/// Standalone deadline operations. Transitions write `deadline_at` through
/// [`ClubRequestRepo::apply_transition`](super::ClubRequestRepo::apply_transition);
/// these helpers serve out-of-band adjustments and dashboards.
pub struct DeadlineRepo;

impl DeadlineRepo {
    /// Set the deadline. Returns `false` if the request does not exist.
    pub async fn set(pool: &PgPool, request_id: DbId, due_at: Timestamp) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE club_requests SET deadline_at = $2, lock_version = lock_version + 1, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(request_id)
        .bind(due_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear the deadline. Returns `false` if the request does not exist.
    pub async fn clear(pool: &PgPool, request_id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE club_requests SET deadline_at = NULL, lock_version = lock_version + 1, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(request_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// `None` if the request does not exist.
    pub async fn is_overdue(
        pool: &PgPool,
        request_id: DbId,
        now: Timestamp,
    ) -> Result<Option<bool>, sqlx::Error> {
        let row: Option<(bool,)> = sqlx::query_as(
            "SELECT COALESCE(deadline_at < $2, false) FROM club_requests WHERE id = $1",
        )
        .bind(request_id)
        .bind(now)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|r| r.0))
    }

    /// Requests whose deadline passed before `now`, most overdue first.
    pub async fn list_overdue(
        pool: &PgPool,
        now: Timestamp,
        limit: i64,
    ) -> Result<Vec<ClubRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM club_requests
             WHERE deadline_at IS NOT NULL AND deadline_at < $1
             ORDER BY deadline_at ASC
             LIMIT $2"
        );
        sqlx::query_as::<_, ClubRequest>(&query)
            .bind(now)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
