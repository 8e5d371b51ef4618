//! Proposal and final-form version rows.

use clubflow_core::documents::DocumentKind;
use clubflow_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `document_versions` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct DocumentVersion {
    pub id: DbId,
    pub request_id: DbId,
    pub kind: String,
    pub version: i32,
    pub title: String,
    pub comment: Option<String>,
    pub document_ref: String,
    pub submitted_by: DbId,
    pub created_at: Timestamp,
}

/// DTO for adding a new version. The version number is assigned on insert.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateDocumentVersion {
    pub request_id: DbId,
    pub kind: DocumentKind,
    pub title: String,
    pub comment: Option<String>,
    pub document_ref: String,
    pub submitted_by: DbId,
}
