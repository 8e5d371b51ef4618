//! Repository for the `club_provisionings` outbox.

use clubflow_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::club_provisioning::{ClubProvisioning, CreateClubProvisioning};

const COLUMNS: &str = "request_id, founder_id, club_name, club_code, club_id, attempts, \
    last_error, provisioned_at, created_at, updated_at";

/// Tracks which approved requests have a provisioned club.
pub struct ProvisioningRepo;

impl ProvisioningRepo {
    /// Enqueue provisioning inside the approve-final-form transaction.
    pub async fn enqueue(
        conn: &mut PgConnection,
        input: &CreateClubProvisioning,
    ) -> Result<ClubProvisioning, sqlx::Error> {
        let query = format!(
            "INSERT INTO club_provisionings (request_id, founder_id, club_name, club_code)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClubProvisioning>(&query)
            .bind(input.request_id)
            .bind(input.founder_id)
            .bind(&input.club_name)
            .bind(&input.club_code)
            .fetch_one(conn)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Option<ClubProvisioning>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM club_provisionings WHERE request_id = $1");
        sqlx::query_as::<_, ClubProvisioning>(&query)
            .bind(request_id)
            .fetch_optional(pool)
            .await
    }

    /// Record the provisioned club id.
    ///
    /// The first confirmation wins; a later call for an already-provisioned
    /// request leaves the row untouched and returns it as-is.
    pub async fn mark_provisioned(
        pool: &PgPool,
        request_id: DbId,
        club_id: DbId,
    ) -> Result<Option<ClubProvisioning>, sqlx::Error> {
        let query = format!(
            "UPDATE club_provisionings SET
                club_id = COALESCE(club_id, $2),
                attempts = attempts + 1,
                last_error = NULL,
                provisioned_at = COALESCE(provisioned_at, NOW()),
                updated_at = NOW()
             WHERE request_id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ClubProvisioning>(&query)
            .bind(request_id)
            .bind(club_id)
            .fetch_optional(pool)
            .await
    }

    /// Record a failed provisioning attempt for later retry.
    pub async fn record_failure(
        pool: &PgPool,
        request_id: DbId,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE club_provisionings SET attempts = attempts + 1, last_error = $2, \
             updated_at = NOW() WHERE request_id = $1 AND club_id IS NULL",
        )
        .bind(request_id)
        .bind(error)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Approved but unprovisioned requests, oldest first.
    pub async fn list_pending(
        pool: &PgPool,
        limit: i64,
    ) -> Result<Vec<ClubProvisioning>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM club_provisionings
             WHERE club_id IS NULL
             ORDER BY created_at ASC
             LIMIT $1"
        );
        sqlx::query_as::<_, ClubProvisioning>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
