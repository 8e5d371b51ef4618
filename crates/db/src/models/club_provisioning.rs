//! Provisioning outbox rows.

use clubflow_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `club_provisionings` table.
///
/// `club_id` stays `NULL` until the provisioner confirms; such rows are the
/// "approved but unprovisioned" set.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ClubProvisioning {
    pub request_id: DbId,
    pub founder_id: DbId,
    pub club_name: String,
    pub club_code: String,
    pub club_id: Option<DbId>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub provisioned_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for enqueueing provisioning of an approved request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateClubProvisioning {
    pub request_id: DbId,
    pub founder_id: DbId,
    pub club_name: String,
    pub club_code: String,
}
