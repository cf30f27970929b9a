//! Branch model - organizational units that scope who may sign in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Branch entity (e.g. a campus).
///
/// Branches are never physically deleted; deactivation flips `active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Branch {
    pub branch_id: Uuid,
    pub name: String,
    pub code: String,
    pub address: String,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl Branch {
    /// Create a new branch record.
    pub fn new(new: NewBranch) -> Self {
        Self {
            branch_id: Uuid::new_v4(),
            name: new.name,
            code: new.code,
            address: new.address,
            active: new.active,
            created_utc: Utc::now(),
        }
    }
}

/// Attributes of a branch about to be created.
#[derive(Debug, Clone)]
pub struct NewBranch {
    pub name: String,
    pub code: String,
    pub address: String,
    pub active: bool,
}

/// An allow-list entry permitting one email to authenticate for one branch.
///
/// The email is stored normalized (see [`normalize_email`]), so the
/// `(branch_id, email)` uniqueness holds case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct AllowedEmailEntry {
    pub entry_id: Uuid,
    pub branch_id: Uuid,
    pub email: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_utc: DateTime<Utc>,
}

impl AllowedEmailEntry {
    pub fn new(branch_id: Uuid, email: &str, description: Option<String>) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            branch_id,
            email: normalize_email(email),
            description,
            active: true,
            created_utc: Utc::now(),
        }
    }

    /// Case-insensitive, whitespace-insensitive comparison.
    pub fn matches(&self, email: &str) -> bool {
        self.email == normalize_email(email)
    }
}

/// Canonical form used as the allow-list match key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
