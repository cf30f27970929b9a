//! Permission model - the vocabulary of access checks.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An atomic, named capability. Identity is the `code`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub code: String,
    pub description: String,
}

impl Permission {
    pub fn new(code: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            description: description.into(),
        }
    }
}

/// Permission codes checked by the HTTP boundary and seeded at bootstrap.
pub mod codes {
    pub const USER_MANAGE: &str = "USER_MANAGE";
    pub const USER_TOKEN_MANAGEMENT: &str = "USER_TOKEN_MANAGEMENT";
    pub const TOKEN_INVALIDATE_OWN: &str = "TOKEN_INVALIDATE_OWN";
    pub const TOKEN_INVALIDATE_USER: &str = "TOKEN_INVALIDATE_USER";
    pub const TOKEN_VIEW_OWN: &str = "TOKEN_VIEW_OWN";
    pub const TOKEN_VIEW_USER: &str = "TOKEN_VIEW_USER";

    pub const ROLE_VIEW: &str = "ROLE_VIEW";
    pub const ROLE_CREATE: &str = "ROLE_CREATE";
    pub const ROLE_UPDATE: &str = "ROLE_UPDATE";
    pub const ROLE_DELETE: &str = "ROLE_DELETE";
    pub const ROLE_UPDATE_PERMISSIONS: &str = "ROLE_UPDATE_PERMISSIONS";

    pub const PERMISSION_VIEW: &str = "PERMISSION_VIEW";
    pub const PERMISSION_UPDATE: &str = "PERMISSION_UPDATE";

    pub const LOG_VIEW_ACTIVITY: &str = "LOG_VIEW_ACTIVITY";
    pub const ADMIN_ACTIVITY_LOG_EXPORT: &str = "ADMIN_ACTIVITY_LOG_EXPORT";
    pub const LOG_DELETE: &str = "LOG_DELETE";

    pub const USER_VIEW_OWN_LOGIN_HISTORY: &str = "USER_VIEW_OWN_LOGIN_HISTORY";

    pub const BRANCH_VIEW: &str = "BRANCH_VIEW";
    pub const BRANCH_CREATE: &str = "BRANCH_CREATE";
    pub const BRANCH_UPDATE: &str = "BRANCH_UPDATE";
    pub const BRANCH_DELETE: &str = "BRANCH_DELETE";
    pub const BRANCH_READ: &str = "BRANCH_READ";
}
