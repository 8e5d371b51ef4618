//! In-process collaborator implementations for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use clubflow_core::roles::Role;
use clubflow_core::types::DbId;

use crate::collaborators::{
    ClubId, ClubProvisioner, CollaboratorError, DocumentRef, DocumentStorage, IdentityProvider,
};

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Fixed user-to-role table.
#[derive(Debug, Default)]
pub struct StaticIdentityProvider {
    roles: HashMap<DbId, Role>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, user_id: DbId, role: Role) -> Self {
        self.roles.insert(user_id, role);
        self
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn role_of(&self, user_id: DbId) -> Result<Option<Role>, CollaboratorError> {
        Ok(self.roles.get(&user_id).copied())
    }
}

// ---------------------------------------------------------------------------
// Document storage
// ---------------------------------------------------------------------------

/// Keeps uploaded files in memory and hands out `mem://` references.
#[derive(Debug, Default)]
pub struct InMemoryDocumentStorage {
    files: Mutex<Vec<(String, Vec<u8>)>>,
}

impl InMemoryDocumentStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.files.lock().map(|files| files.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DocumentStorage for InMemoryDocumentStorage {
    async fn store(&self, file_name: &str, content: &[u8]) -> Result<DocumentRef, CollaboratorError> {
        if file_name.trim().is_empty() {
            return Err(CollaboratorError::Rejected {
                service: "document_storage",
                message: "file name is empty".into(),
            });
        }
        let mut files = self.files.lock().map_err(|_| CollaboratorError::Unavailable {
            service: "document_storage",
            message: "storage lock poisoned".into(),
        })?;
        files.push((file_name.to_string(), content.to_vec()));
        Ok(format!("mem://{}/{}", files.len(), file_name))
    }
}

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

const FIRST_CLUB_ID: ClubId = 1000;

/// Records every call and creates at most one club per request.
#[derive(Debug, Default)]
pub struct RecordingProvisioner {
    calls: Mutex<Vec<DbId>>,
    clubs: Mutex<HashMap<DbId, ClubId>>,
    failures_remaining: AtomicUsize,
}

impl RecordingProvisioner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail with `Unavailable`.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Request ids in call order, failed calls included.
    pub fn calls(&self) -> Vec<DbId> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn club_for(&self, request_id: DbId) -> Option<ClubId> {
        self.clubs
            .lock()
            .ok()
            .and_then(|clubs| clubs.get(&request_id).copied())
    }
}

#[async_trait]
impl ClubProvisioner for RecordingProvisioner {
    async fn provision(
        &self,
        request_id: DbId,
        club_name: &str,
        club_code: &str,
        founder_id: DbId,
    ) -> Result<ClubId, CollaboratorError> {
        let unavailable = |message: &str| CollaboratorError::Unavailable {
            service: "club_provisioner",
            message: message.to_string(),
        };

        self.calls
            .lock()
            .map_err(|_| unavailable("call log poisoned"))?
            .push(request_id);

        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(unavailable("simulated outage"));
        }

        let mut clubs = self.clubs.lock().map_err(|_| unavailable("club table poisoned"))?;
        let next_id = FIRST_CLUB_ID + clubs.len() as ClubId;
        let club_id = *clubs.entry(request_id).or_insert(next_id);

        tracing::debug!(request_id, club_id, club_name, club_code, founder_id, "Provisioned club");
        Ok(club_id)
    }
}
