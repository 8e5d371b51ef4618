//! Closed role set and the acting identity threaded through every command.
//!
//! Role names are resolved once at the boundary (identity provider, session
//! layer) into [`Role`]; nothing inside the workflow compares role strings.

use serde::{Deserialize, Serialize};

use crate::types::DbId;

/// Role of an authenticated platform user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Staff,
    /// Staff member allowed to re-bind a request to another reviewer.
    Admin,
}

impl Role {
    /// Return the role name as stored by the identity provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "STUDENT",
            Self::Staff => "STAFF",
            Self::Admin => "ADMIN",
        }
    }

    /// Parse a role name. Returns `None` for unknown values.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "STUDENT" => Some(Self::Student),
            "STAFF" => Some(Self::Staff),
            "ADMIN" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Staff-side roles: anyone who may triage or review requests.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Staff | Self::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The identity performing a workflow command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: DbId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: DbId, role: Role) -> Self {
        Self { id, role }
    }

    pub fn student(id: DbId) -> Self {
        Self::new(id, Role::Student)
    }

    pub fn staff(id: DbId) -> Self {
        Self::new(id, Role::Staff)
    }

    pub fn admin(id: DbId) -> Self {
        Self::new(id, Role::Admin)
    }
}
