//! Repository for the append-only `workflow_history` table.

use clubflow_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::workflow_history::{CreateHistoryEntry, WorkflowHistoryEntry};

const COLUMNS: &str =
    "id, request_id, actor_id, transition, from_state, to_state, note, acted_at";

/// Append and read audit entries. Entries are never updated or deleted.
pub struct WorkflowHistoryRepo;

impl WorkflowHistoryRepo {
    /// Append one entry inside the caller's transaction.
    pub async fn append(
        conn: &mut PgConnection,
        input: &CreateHistoryEntry,
    ) -> Result<WorkflowHistoryEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflow_history
                (request_id, actor_id, transition, from_state, to_state, note)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, WorkflowHistoryEntry>(&query)
            .bind(input.request_id)
            .bind(input.actor_id)
            .bind(input.transition.as_str())
            .bind(input.from_state.map(|s| s.as_str()))
            .bind(input.to_state.as_str())
            .bind(&input.note)
            .fetch_one(conn)
            .await
    }

    /// One page of entries for a request, oldest first (commit order).
    pub async fn list_for_request(
        pool: &PgPool,
        request_id: DbId,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WorkflowHistoryEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workflow_history
             WHERE request_id = $1
             ORDER BY id ASC
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, WorkflowHistoryEntry>(&query)
            .bind(request_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Every entry for a request, oldest first. Used for replay checks.
    pub async fn list_all_for_request(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Vec<WorkflowHistoryEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM workflow_history WHERE request_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, WorkflowHistoryEntry>(&query)
            .bind(request_id)
            .fetch_all(pool)
            .await
    }

    pub async fn count_for_request(pool: &PgPool, request_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM workflow_history WHERE request_id = $1")
                .bind(request_id)
                .fetch_one(pool)
                .await?;
        Ok(row.0)
    }
}
