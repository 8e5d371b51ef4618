//! Interfaces of the services the workflow depends on but does not own.
//!
//! Identity lookup, file storage and club creation are provided by the host
//! application; the engine only sees these traits.

use async_trait::async_trait;
use clubflow_core::roles::Role;
use clubflow_core::types::DbId;

/// Id of a provisioned club aggregate.
pub type ClubId = DbId;

/// Opaque handle returned by document storage.
pub type DocumentRef = String;

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{service} unavailable: {message}")]
    Unavailable {
        service: &'static str,
        message: String,
    },

    #[error("{service} rejected the request: {message}")]
    Rejected {
        service: &'static str,
        message: String,
    },
}

/// Resolves platform users to their role.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `None` when the user does not exist.
    async fn role_of(&self, user_id: DbId) -> Result<Option<Role>, CollaboratorError>;
}

/// Stores uploaded proposal / final-form files.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    async fn store(&self, file_name: &str, content: &[u8]) -> Result<DocumentRef, CollaboratorError>;
}

/// Creates the club aggregate (roles, founding membership, wallet) for an
/// approved request.
///
/// Must be idempotent by `request_id`: calling it again for an already
/// provisioned request returns the existing club id.
#[async_trait]
pub trait ClubProvisioner: Send + Sync {
    async fn provision(
        &self,
        request_id: DbId,
        club_name: &str,
        club_code: &str,
        founder_id: DbId,
    ) -> Result<ClubId, CollaboratorError>;
}
