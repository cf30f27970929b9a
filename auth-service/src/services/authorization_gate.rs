//! Permission check evaluated before every protected operation.

use super::{PermissionModel, ServiceError};
use crate::models::Principal;

#[derive(Clone)]
pub struct AuthorizationGate {
    permissions: PermissionModel,
}

impl AuthorizationGate {
    pub fn new(permissions: PermissionModel) -> Self {
        Self { permissions }
    }

    /// Succeeds silently when the principal's effective permissions contain
    /// `required`, fails with `Forbidden` otherwise. Lookup faults propagate.
    pub async fn authorize(&self, principal: &Principal, required: &str) -> Result<(), ServiceError> {
        let effective = self
            .permissions
            .effective_permissions(&principal.subject)
            .await?;

        if effective.contains(required) {
            return Ok(());
        }

        tracing::warn!(
            permission = %required,
            branch_code = ?principal.branch_code,
            "Authorization denied"
        );
        Err(ServiceError::forbidden(format!(
            "Missing required permission: {}",
            required
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{permission_codes as codes, Permission};
    use crate::services::store::RoleRepository;
    use crate::services::InMemoryStore;
    use std::sync::Arc;

    async fn gate_with_student(subject: &str) -> AuthorizationGate {
        let store = Arc::new(InMemoryStore::new());
        for code in [codes::BRANCH_READ, codes::BRANCH_CREATE] {
            store.insert_permission(&Permission::new(code, code)).await.unwrap();
        }
        let model = PermissionModel::new(store);
        let role = model
            .create_role("STUDENT", None, &[codes::BRANCH_READ.to_string()])
            .await
            .unwrap();
        model.assign_role(subject, role.role_id).await.unwrap();
        AuthorizationGate::new(model)
    }

    #[tokio::test]
    async fn test_granted_permission_passes() {
        let gate = gate_with_student("student1@fe.edu.vn").await;
        let principal = Principal::new("student1@fe.edu.vn");
        assert!(gate.authorize(&principal, codes::BRANCH_READ).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_permission_is_forbidden() {
        let gate = gate_with_student("student1@fe.edu.vn").await;
        let principal = Principal::new("student1@fe.edu.vn");
        let result = gate.authorize(&principal, codes::BRANCH_CREATE).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_principal_without_roles_is_forbidden() {
        let gate = gate_with_student("student1@fe.edu.vn").await;
        let stranger = Principal::new("stranger@fe.edu.vn");
        let result = gate.authorize(&stranger, codes::BRANCH_READ).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
    }
}
