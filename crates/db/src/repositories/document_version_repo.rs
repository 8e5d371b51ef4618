//! Repository for the `document_versions` table.

use clubflow_core::documents::DocumentKind;
use clubflow_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::document_version::{CreateDocumentVersion, DocumentVersion};

const COLUMNS: &str = "id, request_id, kind, version, title, comment, document_ref, \
    submitted_by, created_at";

/// Append-only store of proposal and final-form versions.
pub struct DocumentVersionRepo;

impl DocumentVersionRepo {
    /// Insert the next version for (request, kind).
    ///
    /// The caller holds the request row lock, so `MAX + 1` cannot race; the
    /// `uq_document_versions_request_kind_version` constraint backs it up.
    pub async fn add_version(
        conn: &mut PgConnection,
        input: &CreateDocumentVersion,
    ) -> Result<DocumentVersion, sqlx::Error> {
        let query = format!(
            "INSERT INTO document_versions
                (request_id, kind, version, title, comment, document_ref, submitted_by)
             VALUES (
                $1,
                $2,
                (SELECT COALESCE(MAX(version), 0) + 1 FROM document_versions
                 WHERE request_id = $1 AND kind = $2),
                $3, $4, $5, $6
             )
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DocumentVersion>(&query)
            .bind(input.request_id)
            .bind(input.kind.as_str())
            .bind(&input.title)
            .bind(&input.comment)
            .bind(&input.document_ref)
            .bind(input.submitted_by)
            .fetch_one(conn)
            .await
    }

    /// The highest version for (request, kind).
    pub async fn latest(
        pool: &PgPool,
        request_id: DbId,
        kind: DocumentKind,
    ) -> Result<Option<DocumentVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM document_versions
             WHERE request_id = $1 AND kind = $2
             ORDER BY version DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, DocumentVersion>(&query)
            .bind(request_id)
            .bind(kind.as_str())
            .fetch_optional(pool)
            .await
    }

    /// All versions for (request, kind), oldest first.
    pub async fn history(
        pool: &PgPool,
        request_id: DbId,
        kind: DocumentKind,
    ) -> Result<Vec<DocumentVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM document_versions
             WHERE request_id = $1 AND kind = $2
             ORDER BY version ASC"
        );
        sqlx::query_as::<_, DocumentVersion>(&query)
            .bind(request_id)
            .bind(kind.as_str())
            .fetch_all(pool)
            .await
    }
}
