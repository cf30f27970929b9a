//! In-process store used by tests and database-less dev runs.
//!
//! Every write takes the single write lock and re-checks uniqueness under it,
//! which is this store's equivalent of a storage-level unique constraint.

use async_trait::async_trait;
use std::collections::{BTreeSet, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use super::store::{BranchRepository, RoleRepository};
use super::ServiceError;
use crate::models::{AllowedEmailEntry, Branch, Permission, Role};

#[derive(Default)]
struct MemoryState {
    branches: Vec<Branch>,
    allowed_emails: Vec<AllowedEmailEntry>,
    permissions: Vec<Permission>,
    roles: Vec<Role>,
    memberships: HashSet<(String, Uuid)>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>, ServiceError> {
        self.state
            .read()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Memory store lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>, ServiceError> {
        self.state
            .write()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Memory store lock poisoned: {}", e)))
    }
}

#[async_trait]
impl BranchRepository for InMemoryStore {
    async fn list_active_branches(&self) -> Result<Vec<Branch>, ServiceError> {
        Ok(self
            .read()?
            .branches
            .iter()
            .filter(|b| b.active)
            .cloned()
            .collect())
    }

    async fn find_branch_by_id(&self, branch_id: Uuid) -> Result<Option<Branch>, ServiceError> {
        Ok(self
            .read()?
            .branches
            .iter()
            .find(|b| b.branch_id == branch_id)
            .cloned())
    }

    async fn find_branch_by_code(&self, code: &str) -> Result<Option<Branch>, ServiceError> {
        Ok(self.read()?.branches.iter().find(|b| b.code == code).cloned())
    }

    async fn find_branch_by_name(&self, name: &str) -> Result<Option<Branch>, ServiceError> {
        Ok(self.read()?.branches.iter().find(|b| b.name == name).cloned())
    }

    async fn insert_branch(&self, branch: &Branch) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        if state.branches.iter().any(|b| b.code == branch.code) {
            return Err(ServiceError::conflict(format!(
                "Branch code already exists: {}",
                branch.code
            )));
        }
        if state.branches.iter().any(|b| b.name == branch.name) {
            return Err(ServiceError::conflict(format!(
                "Branch name already exists: {}",
                branch.name
            )));
        }
        state.branches.push(branch.clone());
        Ok(())
    }

    async fn update_branch(&self, branch: &Branch) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        if state
            .branches
            .iter()
            .any(|b| b.name == branch.name && b.branch_id != branch.branch_id)
        {
            return Err(ServiceError::conflict(format!(
                "Branch name already exists: {}",
                branch.name
            )));
        }
        let existing = state
            .branches
            .iter_mut()
            .find(|b| b.branch_id == branch.branch_id)
            .ok_or_else(|| {
                ServiceError::not_found(format!("Branch not found with id: {}", branch.branch_id))
            })?;
        existing.name = branch.name.clone();
        existing.address = branch.address.clone();
        existing.active = branch.active;
        Ok(())
    }

    async fn find_allowed_email(
        &self,
        branch_id: Uuid,
        email: &str,
    ) -> Result<Option<AllowedEmailEntry>, ServiceError> {
        Ok(self
            .read()?
            .allowed_emails
            .iter()
            .find(|e| e.branch_id == branch_id && e.matches(email))
            .cloned())
    }

    async fn insert_allowed_email(&self, entry: &AllowedEmailEntry) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        if state
            .allowed_emails
            .iter()
            .any(|e| e.branch_id == entry.branch_id && e.email == entry.email)
        {
            return Err(ServiceError::conflict(format!(
                "Email already exists for this branch: {}",
                entry.email
            )));
        }
        state.allowed_emails.push(entry.clone());
        Ok(())
    }

    async fn set_allowed_email_active(
        &self,
        entry_id: Uuid,
        active: bool,
    ) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        let entry = state
            .allowed_emails
            .iter_mut()
            .find(|e| e.entry_id == entry_id)
            .ok_or_else(|| ServiceError::not_found("Allowed email not found"))?;
        entry.active = active;
        Ok(())
    }

    async fn list_allowed_emails(
        &self,
        branch_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<AllowedEmailEntry>, ServiceError> {
        Ok(self
            .read()?
            .allowed_emails
            .iter()
            .filter(|e| e.branch_id == branch_id && (e.active || !active_only))
            .cloned()
            .collect())
    }

    async fn find_branches_allowing_email(&self, email: &str) -> Result<Vec<Branch>, ServiceError> {
        let state = self.read()?;
        Ok(state
            .branches
            .iter()
            .filter(|b| b.active)
            .filter(|b| {
                state
                    .allowed_emails
                    .iter()
                    .any(|e| e.branch_id == b.branch_id && e.active && e.matches(email))
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl RoleRepository for InMemoryStore {
    async fn list_roles(&self) -> Result<Vec<Role>, ServiceError> {
        Ok(self.read()?.roles.clone())
    }

    async fn find_role_by_id(&self, role_id: Uuid) -> Result<Option<Role>, ServiceError> {
        Ok(self
            .read()?
            .roles
            .iter()
            .find(|r| r.role_id == role_id)
            .cloned())
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, ServiceError> {
        Ok(self.read()?.roles.iter().find(|r| r.name == name).cloned())
    }

    async fn insert_role(&self, role: &Role) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        if state.roles.iter().any(|r| r.name == role.name) {
            return Err(ServiceError::conflict("Role name already exists"));
        }
        if let Some(unknown) = role
            .permissions
            .iter()
            .find(|p| !state.permissions.iter().any(|known| known.code == p.code))
        {
            return Err(ServiceError::bad_request(format!(
                "Unknown permission code: {}",
                unknown.code
            )));
        }
        state.roles.push(role.clone());
        Ok(())
    }

    async fn update_role(&self, role: &Role) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        if state
            .roles
            .iter()
            .any(|r| r.name == role.name && r.role_id != role.role_id)
        {
            return Err(ServiceError::conflict("Role name already exists"));
        }
        let existing = state
            .roles
            .iter_mut()
            .find(|r| r.role_id == role.role_id)
            .ok_or_else(|| {
                ServiceError::not_found(format!("Role with id {} not found", role.role_id))
            })?;
        existing.name = role.name.clone();
        existing.description = role.description.clone();
        Ok(())
    }

    async fn delete_role(&self, role_id: Uuid) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        if state.memberships.iter().any(|(_, r)| *r == role_id) {
            return Err(ServiceError::conflict(
                "Role is assigned to users. Cannot delete.",
            ));
        }
        state.roles.retain(|r| r.role_id != role_id);
        Ok(())
    }

    async fn replace_role_permissions(
        &self,
        role_id: Uuid,
        codes: &BTreeSet<String>,
    ) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        let mut resolved = BTreeSet::new();
        for code in codes {
            let permission = state
                .permissions
                .iter()
                .find(|p| &p.code == code)
                .ok_or_else(|| {
                    ServiceError::bad_request(format!("Unknown permission code: {}", code))
                })?;
            resolved.insert(permission.clone());
        }
        let role = state
            .roles
            .iter_mut()
            .find(|r| r.role_id == role_id)
            .ok_or_else(|| ServiceError::not_found(format!("Role with id {} not found", role_id)))?;
        role.permissions = resolved;
        Ok(())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, ServiceError> {
        Ok(self.read()?.permissions.clone())
    }

    async fn find_permissions_by_codes(
        &self,
        codes: &BTreeSet<String>,
    ) -> Result<Vec<Permission>, ServiceError> {
        Ok(self
            .read()?
            .permissions
            .iter()
            .filter(|p| codes.contains(&p.code))
            .cloned()
            .collect())
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        if state.permissions.iter().any(|p| p.code == permission.code) {
            return Err(ServiceError::conflict(format!(
                "Permission code already exists: {}",
                permission.code
            )));
        }
        state.permissions.push(permission.clone());
        Ok(())
    }

    async fn count_principals_with_role(&self, role_id: Uuid) -> Result<u64, ServiceError> {
        Ok(self
            .read()?
            .memberships
            .iter()
            .filter(|(_, r)| *r == role_id)
            .count() as u64)
    }

    async fn roles_for_principal(&self, subject: &str) -> Result<Vec<Role>, ServiceError> {
        let state = self.read()?;
        Ok(state
            .roles
            .iter()
            .filter(|r| state.memberships.contains(&(subject.to_string(), r.role_id)))
            .cloned()
            .collect())
    }

    async fn assign_role(&self, subject: &str, role_id: Uuid) -> Result<(), ServiceError> {
        let mut state = self.write()?;
        if !state.roles.iter().any(|r| r.role_id == role_id) {
            return Err(ServiceError::not_found(format!(
                "Role with id {} not found",
                role_id
            )));
        }
        state.memberships.insert((subject.to_string(), role_id));
        Ok(())
    }

    async fn revoke_role(&self, subject: &str, role_id: Uuid) -> Result<bool, ServiceError> {
        Ok(self
            .write()?
            .memberships
            .remove(&(subject.to_string(), role_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewBranch;

    fn branch(code: &str, name: &str) -> Branch {
        Branch::new(NewBranch {
            name: name.to_string(),
            code: code.to_string(),
            address: "1 Campus Road".to_string(),
            active: true,
        })
    }

    #[tokio::test]
    async fn test_store_enforces_branch_uniqueness() {
        let store = InMemoryStore::new();
        store.insert_branch(&branch("HCM", "Ho Chi Minh Campus")).await.unwrap();

        let dup_code = store.insert_branch(&branch("HCM", "Other")).await;
        assert!(matches!(dup_code, Err(ServiceError::Conflict(_))));

        let dup_name = store
            .insert_branch(&branch("HN", "Ho Chi Minh Campus"))
            .await;
        assert!(matches!(dup_name, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_store_allowed_email_pair_unique_regardless_of_case() {
        let store = InMemoryStore::new();
        let hcm = branch("HCM", "Ho Chi Minh Campus");
        store.insert_branch(&hcm).await.unwrap();

        let entry = AllowedEmailEntry::new(hcm.branch_id, "Student1@fe.edu.vn", None);
        store.insert_allowed_email(&entry).await.unwrap();
        store
            .set_allowed_email_active(entry.entry_id, false)
            .await
            .unwrap();

        let again = AllowedEmailEntry::new(hcm.branch_id, "student1@FE.edu.vn ", None);
        let result = store.insert_allowed_email(&again).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_store_blocks_deleting_referenced_role() {
        let store = InMemoryStore::new();
        let role = Role::new("STUDENT".to_string(), None, vec![]);
        store.insert_role(&role).await.unwrap();
        store.assign_role("a@b.c", role.role_id).await.unwrap();

        let result = store.delete_role(role.role_id).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
        assert!(store.find_role_by_id(role.role_id).await.unwrap().is_some());
    }
}
