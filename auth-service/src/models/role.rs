//! Role model - named permission bundles assignable to principals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::Permission;

/// Role entity with its permission set.
///
/// The set has no ordering semantics; `BTreeSet` only keeps output stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub role_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub permissions: BTreeSet<Permission>,
    pub created_utc: DateTime<Utc>,
}

impl Role {
    /// Create a new role.
    pub fn new(
        name: String,
        description: Option<String>,
        permissions: impl IntoIterator<Item = Permission>,
    ) -> Self {
        Self {
            role_id: Uuid::new_v4(),
            name,
            description,
            permissions: permissions.into_iter().collect(),
            created_utc: Utc::now(),
        }
    }

    /// Permission codes granted by this role.
    pub fn permission_codes(&self) -> impl Iterator<Item = &str> {
        self.permissions.iter().map(|p| p.code.as_str())
    }

    pub fn grants(&self, code: &str) -> bool {
        self.permission_codes().any(|c| c == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_permissions_collapse() {
        let role = Role::new(
            "STUDENT".to_string(),
            None,
            vec![
                Permission::new("BRANCH_READ", "Read branch"),
                Permission::new("BRANCH_READ", "Read branch"),
                Permission::new("BRANCH_VIEW", "View branch"),
            ],
        );
        assert_eq!(role.permissions.len(), 2);
        assert!(role.grants("BRANCH_READ"));
        assert!(!role.grants("BRANCH_CREATE"));
    }
}
