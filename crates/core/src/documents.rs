//! Versioned sub-documents attached to a request (proposal, final form).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum length of a document title.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length of a document comment.
pub const MAX_COMMENT_LENGTH: usize = 4000;

/// Maximum length of an opaque storage reference.
pub const MAX_DOCUMENT_REF_LENGTH: usize = 1024;

/// Kind of versioned document. Versions are numbered per (request, kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentKind {
    Proposal,
    FinalForm,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proposal => "PROPOSAL",
            Self::FinalForm => "FINAL_FORM",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PROPOSAL" => Some(Self::Proposal),
            "FINAL_FORM" => Some(Self::FinalForm),
            _ => None,
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document content submitted with submit-proposal / submit-final-form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSubmission {
    pub title: String,
    pub comment: Option<String>,
    /// Opaque handle returned by the document storage collaborator.
    pub document_ref: String,
}

/// Validate a document submission's fields.
pub fn validate_document(doc: &DocumentSubmission) -> Result<(), CoreError> {
    if doc.title.trim().is_empty() {
        return Err(CoreError::Validation("Document title must not be empty".into()));
    }
    if doc.title.chars().count() > MAX_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Document title exceeds maximum length of {MAX_TITLE_LENGTH} characters"
        )));
    }
    if let Some(comment) = &doc.comment {
        if comment.chars().count() > MAX_COMMENT_LENGTH {
            return Err(CoreError::Validation(format!(
                "Document comment exceeds maximum length of {MAX_COMMENT_LENGTH} characters"
            )));
        }
    }
    if doc.document_ref.trim().is_empty() {
        return Err(CoreError::Validation("document_ref must not be empty".into()));
    }
    if doc.document_ref.len() > MAX_DOCUMENT_REF_LENGTH {
        return Err(CoreError::Validation(format!(
            "document_ref exceeds maximum length of {MAX_DOCUMENT_REF_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Next version number given the current maximum (1 when none exist).
pub fn next_version(current_max: Option<i32>) -> i32 {
    current_max.unwrap_or(0) + 1
}

/// Check that `versions`, in ascending order, are exactly `1..=N`.
pub fn validate_version_sequence(versions: &[i32]) -> Result<(), CoreError> {
    for (idx, version) in versions.iter().enumerate() {
        let expected = idx as i32 + 1;
        if *version != expected {
            return Err(CoreError::Internal(format!(
                "Version sequence broken: expected {expected}, found {version}"
            )));
        }
    }
    Ok(())
}
