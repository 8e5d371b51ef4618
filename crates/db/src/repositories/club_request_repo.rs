//! Repository for the `club_requests` table.

use clubflow_core::types::DbId;
use clubflow_core::workflow::RequestState;
use sqlx::{PgConnection, PgPool};

use crate::models::club_request::{ApplyTransition, ClubRequest, CreateClubRequest};

/// Column list shared across queries to avoid repetition.
pub(crate) const COLUMNS: &str = "id, creator_id, reviewer_id, state, club_name, club_code, \
    rejection_reason, defense_outcome, defense_feedback, deadline_at, lock_version, \
    created_at, updated_at";

/// Persistence for the request aggregate.
pub struct ClubRequestRepo;

impl ClubRequestRepo {
    /// Insert a new request in DRAFT.
    pub async fn create(
        conn: &mut PgConnection,
        input: &CreateClubRequest,
    ) -> Result<ClubRequest, sqlx::Error> {
        let query = format!(
            "INSERT INTO club_requests (creator_id, state, club_name, club_code)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClubRequest>(&query)
            .bind(input.creator_id)
            .bind(RequestState::Draft.as_str())
            .bind(&input.club_name)
            .bind(&input.club_code)
            .fetch_one(conn)
            .await
    }

    /// Find a request by id without locking it.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<ClubRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM club_requests WHERE id = $1");
        sqlx::query_as::<_, ClubRequest>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock the request row for the rest of the transaction.
    ///
    /// Uses `NOWAIT`, so a row already locked by a concurrent transition
    /// fails immediately with SQLSTATE 55P03 instead of queueing behind it.
    pub async fn lock_for_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<ClubRequest>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM club_requests WHERE id = $1 FOR UPDATE NOWAIT");
        sqlx::query_as::<_, ClubRequest>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Write the post-transition aggregate and bump `lock_version`.
    ///
    /// Returns `None` when `expected_lock_version` is stale, i.e. another
    /// transition committed since the caller loaded the request.
    pub async fn apply_transition(
        conn: &mut PgConnection,
        id: DbId,
        expected_lock_version: i32,
        input: &ApplyTransition,
    ) -> Result<Option<ClubRequest>, sqlx::Error> {
        let query = format!(
            "UPDATE club_requests SET
                state = $3,
                reviewer_id = $4,
                club_name = $5,
                club_code = $6,
                rejection_reason = $7,
                defense_outcome = $8,
                defense_feedback = $9,
                deadline_at = $10,
                lock_version = lock_version + 1,
                updated_at = NOW()
             WHERE id = $1 AND lock_version = $2
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClubRequest>(&query)
            .bind(id)
            .bind(expected_lock_version)
            .bind(input.state.as_str())
            .bind(input.reviewer_id)
            .bind(&input.club_name)
            .bind(&input.club_code)
            .bind(&input.rejection_reason)
            .bind(input.defense_outcome.map(|o| o.as_str()))
            .bind(&input.defense_feedback)
            .bind(input.deadline_at)
            .fetch_optional(conn)
            .await
    }

    /// Hard-delete a request that is still in DRAFT.
    ///
    /// Returns `false` if the row is gone, has left DRAFT, or its
    /// `lock_version` moved on.
    pub async fn delete_draft(
        conn: &mut PgConnection,
        id: DbId,
        expected_lock_version: i32,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM club_requests \
             WHERE id = $1 AND lock_version = $2 AND state = $3",
        )
        .bind(id)
        .bind(expected_lock_version)
        .bind(RequestState::Draft.as_str())
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Requests created by `creator_id`, newest first.
    pub async fn list_by_creator(
        pool: &PgPool,
        creator_id: DbId,
    ) -> Result<Vec<ClubRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM club_requests WHERE creator_id = $1 ORDER BY id DESC"
        );
        sqlx::query_as::<_, ClubRequest>(&query)
            .bind(creator_id)
            .fetch_all(pool)
            .await
    }

    /// Requests bound to `reviewer_id`, newest first.
    pub async fn list_by_reviewer(
        pool: &PgPool,
        reviewer_id: DbId,
    ) -> Result<Vec<ClubRequest>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM club_requests WHERE reviewer_id = $1 ORDER BY id DESC"
        );
        sqlx::query_as::<_, ClubRequest>(&query)
            .bind(reviewer_id)
            .fetch_all(pool)
            .await
    }
}
