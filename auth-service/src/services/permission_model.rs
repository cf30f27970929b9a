//! Roles, permissions and the principal -> role -> permission graph.

use std::collections::BTreeSet;
use std::sync::Arc;
use uuid::Uuid;

use super::store::RoleRepository;
use super::ServiceError;
use crate::models::{normalize_email, Permission, Role};

#[derive(Clone)]
pub struct PermissionModel {
    store: Arc<dyn RoleRepository>,
}

impl PermissionModel {
    pub fn new(store: Arc<dyn RoleRepository>) -> Self {
        Self { store }
    }

    /// All roles. An empty catalogue is a configuration error, reported as `NotFound`.
    pub async fn list_roles(&self) -> Result<Vec<Role>, ServiceError> {
        let roles = self.store.list_roles().await?;
        if roles.is_empty() {
            return Err(ServiceError::not_found("No roles found"));
        }
        Ok(roles)
    }

    pub async fn get_role(&self, role_id: Uuid) -> Result<Role, ServiceError> {
        self.store
            .find_role_by_id(role_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Role with id {} not found", role_id)))
    }

    pub async fn create_role(
        &self,
        name: &str,
        description: Option<String>,
        permission_codes: &[String],
    ) -> Result<Role, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::bad_request("Role name must not be blank"));
        }
        if self.store.find_role_by_name(name).await?.is_some() {
            return Err(ServiceError::conflict("Role name already exists"));
        }

        let permissions = self.resolve_permissions(permission_codes).await?;
        let role = Role::new(name.to_string(), description, permissions);
        self.store.insert_role(&role).await?;

        tracing::info!(role_id = %role.role_id, name = %role.name, "Created role");
        Ok(role)
    }

    /// Renames or re-describes a role. The permission set is left untouched.
    pub async fn update_role(
        &self,
        role_id: Uuid,
        name: &str,
        description: Option<String>,
    ) -> Result<Role, ServiceError> {
        let mut role = self.get_role(role_id).await?;

        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::bad_request("Role name must not be blank"));
        }
        if let Some(existing) = self.store.find_role_by_name(name).await? {
            if existing.role_id != role_id {
                return Err(ServiceError::conflict("Role name already exists"));
            }
        }

        role.name = name.to_string();
        role.description = description;
        self.store.update_role(&role).await?;

        tracing::info!(role_id = %role.role_id, name = %role.name, "Updated role");
        Ok(role)
    }

    pub async fn delete_role(&self, role_id: Uuid) -> Result<(), ServiceError> {
        let role = self.get_role(role_id).await?;
        if self.store.count_principals_with_role(role_id).await? > 0 {
            return Err(ServiceError::conflict(
                "Role is assigned to users. Cannot delete.",
            ));
        }
        // The store repeats the reference check atomically with the delete.
        self.store.delete_role(role_id).await?;

        tracing::info!(role_id = %role_id, name = %role.name, "Deleted role");
        Ok(())
    }

    /// Replace the whole permission set of a role.
    ///
    /// Every code must resolve, otherwise nothing changes and the call fails
    /// with `BadRequest`. Replaying the same set is a no-op.
    pub async fn replace_permissions(
        &self,
        role_id: Uuid,
        permission_codes: &[String],
    ) -> Result<Role, ServiceError> {
        self.get_role(role_id).await?;

        let codes: BTreeSet<String> = permission_codes
            .iter()
            .map(|c| c.trim().to_string())
            .collect();
        self.store.replace_role_permissions(role_id, &codes).await?;

        let role = self.get_role(role_id).await?;
        tracing::info!(
            role_id = %role.role_id,
            permissions = ?role.permission_codes().collect::<Vec<_>>(),
            "Replaced role permissions"
        );
        Ok(role)
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>, ServiceError> {
        self.store.list_permissions().await
    }

    pub async fn assign_role(&self, subject: &str, role_id: Uuid) -> Result<(), ServiceError> {
        let subject = require_subject(subject)?;
        self.store.assign_role(&subject, role_id).await?;
        tracing::info!(role_id = %role_id, "Assigned role to principal");
        Ok(())
    }

    /// Fails with `NotFound` when the role is unknown or the principal does not hold it.
    pub async fn revoke_role(&self, subject: &str, role_id: Uuid) -> Result<(), ServiceError> {
        let subject = require_subject(subject)?;
        self.get_role(role_id).await?;
        if !self.store.revoke_role(&subject, role_id).await? {
            return Err(ServiceError::not_found(format!(
                "Principal does not hold role {}",
                role_id
            )));
        }
        tracing::info!(role_id = %role_id, "Revoked role from principal");
        Ok(())
    }

    pub async fn roles_for(&self, subject: &str) -> Result<Vec<Role>, ServiceError> {
        self.store
            .roles_for_principal(&normalize_email(subject))
            .await
    }

    /// Union of the permission codes of every role the principal holds.
    pub async fn effective_permissions(
        &self,
        subject: &str,
    ) -> Result<BTreeSet<String>, ServiceError> {
        Ok(self
            .roles_for(subject)
            .await?
            .iter()
            .flat_map(|role| role.permission_codes().map(str::to_string))
            .collect())
    }

    async fn resolve_permissions(&self, codes: &[String]) -> Result<Vec<Permission>, ServiceError> {
        let wanted: BTreeSet<String> = codes.iter().map(|c| c.trim().to_string()).collect();
        let found = self.store.find_permissions_by_codes(&wanted).await?;

        if found.len() != wanted.len() {
            let missing: Vec<&str> = wanted
                .iter()
                .filter(|code| !found.iter().any(|p| &p.code == *code))
                .map(String::as_str)
                .collect();
            return Err(ServiceError::bad_request(format!(
                "Unknown permission code: {}",
                missing.join(", ")
            )));
        }
        Ok(found)
    }
}

fn require_subject(subject: &str) -> Result<String, ServiceError> {
    let subject = normalize_email(subject);
    if subject.is_empty() {
        return Err(ServiceError::bad_request("Principal subject must not be blank"));
    }
    Ok(subject)
}
