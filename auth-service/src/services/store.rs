//! Persistence seams for branches, allow-lists, roles and permissions.
//!
//! Implementations must enforce uniqueness on branch code, branch name,
//! `(branch_id, email)`, role name and permission code themselves. The
//! services above run an advisory check first, but only the store's
//! constraint closes the check-then-act race.

use async_trait::async_trait;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::ServiceError;
use crate::models::{AllowedEmailEntry, Branch, Permission, Role};

#[async_trait]
pub trait BranchRepository: Send + Sync {
    /// Active branches in insertion order.
    async fn list_active_branches(&self) -> Result<Vec<Branch>, ServiceError>;
    async fn find_branch_by_id(&self, branch_id: Uuid) -> Result<Option<Branch>, ServiceError>;
    async fn find_branch_by_code(&self, code: &str) -> Result<Option<Branch>, ServiceError>;
    async fn find_branch_by_name(&self, name: &str) -> Result<Option<Branch>, ServiceError>;
    /// Fails with `Conflict` when the code or name is taken.
    async fn insert_branch(&self, branch: &Branch) -> Result<(), ServiceError>;
    /// Persists name, address and active flag. Fails with `Conflict` on a taken name.
    async fn update_branch(&self, branch: &Branch) -> Result<(), ServiceError>;

    /// Lookup regardless of the entry's active flag. `email` is normalized.
    async fn find_allowed_email(
        &self,
        branch_id: Uuid,
        email: &str,
    ) -> Result<Option<AllowedEmailEntry>, ServiceError>;
    /// Fails with `Conflict` when the `(branch, email)` pair exists.
    async fn insert_allowed_email(&self, entry: &AllowedEmailEntry) -> Result<(), ServiceError>;
    async fn set_allowed_email_active(
        &self,
        entry_id: Uuid,
        active: bool,
    ) -> Result<(), ServiceError>;
    async fn list_allowed_emails(
        &self,
        branch_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<AllowedEmailEntry>, ServiceError>;
    /// Active branches whose active allow-list contains `email`, oldest first.
    async fn find_branches_allowing_email(&self, email: &str) -> Result<Vec<Branch>, ServiceError>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn list_roles(&self) -> Result<Vec<Role>, ServiceError>;
    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, ServiceError>;
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, ServiceError>;
    /// Inserts the role together with its permission set. `Conflict` on a taken name.
    async fn insert_role(&self, role: &Role) -> Result<(), ServiceError>;
    /// Persists name and description only.
    async fn update_role(&self, role: &Role) -> Result<(), ServiceError>;
    /// `Conflict` when a principal still holds the role.
    async fn delete_role(&self, role_id: Uuid) -> Result<(), ServiceError>;
    /// Replaces the whole permission set in one atomic step.
    async fn replace_role_permissions(
        &self,
        role_id: Uuid,
        codes: &BTreeSet<String>,
    ) -> Result<(), ServiceError>;

    async fn list_permissions(&self) -> Result<Vec<Permission>, ServiceError>;
    async fn find_permissions_by_codes(
        &self,
        codes: &BTreeSet<String>,
    ) -> Result<Vec<Permission>, ServiceError>;
    async fn insert_permission(&self, permission: &Permission) -> Result<(), ServiceError>;

    async fn count_principals_with_role(&self, role_id: Uuid) -> Result<u64, ServiceError>;
    async fn roles_for_principal(&self, subject: &str) -> Result<Vec<Role>, ServiceError>;
    /// Idempotent.
    async fn assign_role(&self, subject: &str, role_id: Uuid) -> Result<(), ServiceError>;
    /// Returns whether a membership was removed.
    async fn revoke_role(&self, subject: &str, role_id: Uuid) -> Result<bool, ServiceError>;
}
