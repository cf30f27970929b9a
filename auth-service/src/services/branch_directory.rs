//! Branch directory: branch records and their email allow-lists.

use std::sync::Arc;
use uuid::Uuid;

use super::store::BranchRepository;
use super::ServiceError;
use crate::models::{normalize_email, AllowedEmailEntry, Branch, NewBranch};

/// Column widths of the branch tables.
pub const MAX_BRANCH_NAME_LEN: usize = 100;
pub const MAX_BRANCH_CODE_LEN: usize = 10;
pub const MAX_ADDRESS_LEN: usize = 255;
pub const MAX_EMAIL_LEN: usize = 255;

/// Mutable attributes of an existing branch. The code is immutable.
#[derive(Debug, Clone)]
pub struct BranchUpdate {
    pub name: String,
    pub address: String,
    pub active: bool,
}

#[derive(Clone)]
pub struct BranchDirectory {
    store: Arc<dyn BranchRepository>,
}

impl BranchDirectory {
    pub fn new(store: Arc<dyn BranchRepository>) -> Self {
        Self { store }
    }

    pub async fn find_active_branches(&self) -> Result<Vec<Branch>, ServiceError> {
        self.store.list_active_branches().await
    }

    /// Exact match; callers fold case themselves if they need to.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Branch>, ServiceError> {
        self.store.find_branch_by_code(code).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Branch>, ServiceError> {
        self.store.find_branch_by_name(name).await
    }

    pub async fn get_branch(&self, branch_id: Uuid) -> Result<Branch, ServiceError> {
        self.store
            .find_branch_by_id(branch_id)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Branch not found with id: {}", branch_id)))
    }

    pub async fn get_branch_by_code(&self, code: &str) -> Result<Branch, ServiceError> {
        self.find_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Branch not found with code: {}", code)))
    }

    /// Create a branch. Code conflicts are reported before name conflicts.
    pub async fn create_branch(&self, new: NewBranch) -> Result<Branch, ServiceError> {
        let new = NewBranch {
            name: new.name.trim().to_string(),
            code: new.code.trim().to_string(),
            address: new.address.trim().to_string(),
            active: new.active,
        };
        require_field("Branch name", &new.name, MAX_BRANCH_NAME_LEN)?;
        require_field("Branch code", &new.code, MAX_BRANCH_CODE_LEN)?;
        require_field("Address", &new.address, MAX_ADDRESS_LEN)?;

        if self.store.find_branch_by_code(&new.code).await?.is_some() {
            return Err(ServiceError::conflict(format!(
                "Branch code already exists: {}",
                new.code
            )));
        }
        if self.store.find_branch_by_name(&new.name).await?.is_some() {
            return Err(ServiceError::conflict(format!(
                "Branch name already exists: {}",
                new.name
            )));
        }

        let branch = Branch::new(new);
        // The store's unique constraint decides races the checks above miss.
        self.store.insert_branch(&branch).await?;

        tracing::info!(
            branch_id = %branch.branch_id,
            name = %branch.name,
            code = %branch.code,
            "Created new branch"
        );
        Ok(branch)
    }

    pub async fn update_branch(
        &self,
        branch_id: Uuid,
        update: BranchUpdate,
    ) -> Result<Branch, ServiceError> {
        let mut branch = self.get_branch(branch_id).await?;

        let name = update.name.trim().to_string();
        let address = update.address.trim().to_string();
        require_field("Branch name", &name, MAX_BRANCH_NAME_LEN)?;
        require_field("Address", &address, MAX_ADDRESS_LEN)?;

        if let Some(existing) = self.store.find_branch_by_name(&name).await? {
            if existing.branch_id != branch_id {
                return Err(ServiceError::conflict(format!(
                    "Branch name already exists: {}",
                    name
                )));
            }
        }

        branch.name = name;
        branch.address = address;
        branch.active = update.active;
        self.store.update_branch(&branch).await?;

        tracing::info!(branch_id = %branch.branch_id, name = %branch.name, "Updated branch");
        Ok(branch)
    }

    /// Soft delete: the row stays, `active` becomes false.
    pub async fn deactivate_branch(&self, branch_id: Uuid) -> Result<(), ServiceError> {
        let mut branch = self.get_branch(branch_id).await?;
        branch.active = false;
        self.store.update_branch(&branch).await?;

        tracing::info!(branch_id = %branch.branch_id, name = %branch.name, "Deactivated branch");
        Ok(())
    }

    /// Add an allow-list entry.
    ///
    /// Re-adding a previously removed email is a conflict, not a silent
    /// reactivation.
    pub async fn add_allowed_email(
        &self,
        branch_id: Uuid,
        email: &str,
        description: Option<String>,
    ) -> Result<AllowedEmailEntry, ServiceError> {
        let branch = self.get_branch(branch_id).await?;
        let email = normalize_email(email);
        require_field("Email", &email, MAX_EMAIL_LEN)?;

        if self.store.find_allowed_email(branch_id, &email).await?.is_some() {
            return Err(ServiceError::conflict(format!(
                "Email already exists for this branch: {}",
                email
            )));
        }

        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        let entry = AllowedEmailEntry::new(branch_id, &email, description);
        self.store.insert_allowed_email(&entry).await?;

        tracing::info!(branch_code = %branch.code, "Added allowed email to branch");
        tracing::debug!(email = %entry.email, branch_code = %branch.code, "Allowed email added");
        Ok(entry)
    }

    /// Soft delete of an allow-list entry.
    pub async fn remove_allowed_email(&self, branch_id: Uuid, email: &str) -> Result<(), ServiceError> {
        let branch = self.get_branch(branch_id).await?;
        let email = normalize_email(email);

        let entry = self
            .store
            .find_allowed_email(branch_id, &email)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("Allowed email not found: {}", email)))?;

        self.store
            .set_allowed_email_active(entry.entry_id, false)
            .await?;

        tracing::info!(branch_code = %branch.code, "Removed allowed email from branch");
        Ok(())
    }

    /// Active allow-list of a branch.
    pub async fn list_allowed_emails(&self, branch_id: Uuid) -> Result<Vec<String>, ServiceError> {
        Ok(self
            .store
            .list_allowed_emails(branch_id, true)
            .await?
            .into_iter()
            .map(|e| e.email)
            .collect())
    }

    /// Every entry of a branch including removed ones, for audit views.
    pub async fn allowed_email_history(
        &self,
        branch_id: Uuid,
    ) -> Result<Vec<AllowedEmailEntry>, ServiceError> {
        self.get_branch(branch_id).await?;
        self.store.list_allowed_emails(branch_id, false).await
    }
}

fn require_field(field: &str, value: &str, max_len: usize) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::bad_request(format!("{} is required", field)));
    }
    if value.chars().count() > max_len {
        return Err(ServiceError::bad_request(format!(
            "{} must be at most {} characters",
            field, max_len
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryStore;

    fn directory() -> BranchDirectory {
        BranchDirectory::new(Arc::new(InMemoryStore::new()))
    }

    fn hcm() -> NewBranch {
        NewBranch {
            name: "Ho Chi Minh Campus".to_string(),
            code: "HCM".to_string(),
            address: "590 Cach Mang Thang Tam, District 3".to_string(),
            active: true,
        }
    }

    fn hn() -> NewBranch {
        NewBranch {
            name: "Ha Noi Campus".to_string(),
            code: "HN".to_string(),
            address: "Hoa Lac Hi-Tech Park".to_string(),
            active: true,
        }
    }

    #[tokio::test]
    async fn test_create_branch_twice_conflicts_on_code() {
        let dir = directory();
        dir.create_branch(hcm()).await.unwrap();

        let second = dir.create_branch(hcm()).await;
        match second {
            Err(ServiceError::Conflict(msg)) => assert!(msg.contains("HCM")),
            other => panic!("expected conflict, got {:?}", other.map(|b| b.code)),
        }
        assert_eq!(dir.find_active_branches().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_branch_conflicts_on_name() {
        let dir = directory();
        dir.create_branch(hcm()).await.unwrap();

        let mut other = hn();
        other.name = "Ho Chi Minh Campus".to_string();
        let result = dir.create_branch(other).await;
        match result {
            Err(ServiceError::Conflict(msg)) => assert!(msg.contains("name")),
            _ => panic!("expected name conflict"),
        }
    }

    #[tokio::test]
    async fn test_create_branch_rejects_blank_fields() {
        let dir = directory();
        let mut blank = hcm();
        blank.code = "   ".to_string();
        assert!(matches!(
            dir.create_branch(blank).await,
            Err(ServiceError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_create_branch_rejects_code_wider_than_column() {
        let dir = directory();
        let mut long = hcm();
        long.code = "CAMPUS_LONG".to_string();
        match dir.create_branch(long).await {
            Err(ServiceError::BadRequest(msg)) => assert!(msg.contains("at most 10")),
            other => panic!("expected bad request, got {:?}", other.map(|b| b.code)),
        }
        assert!(dir.find_by_code("CAMPUS_LONG").await.unwrap().is_none());

        let mut widest = hcm();
        widest.code = "CAMPUS_TEN".to_string();
        assert!(dir.create_branch(widest).await.is_ok());
    }

    #[tokio::test]
    async fn test_active_branches_keep_insertion_order() {
        let dir = directory();
        let first = dir.create_branch(hcm()).await.unwrap();
        let second = dir.create_branch(hn()).await.unwrap();
        let mut inactive = hn();
        inactive.code = "DN".to_string();
        inactive.name = "Da Nang Campus".to_string();
        inactive.active = false;
        dir.create_branch(inactive).await.unwrap();

        let codes: Vec<String> = dir
            .find_active_branches()
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.code)
            .collect();
        assert_eq!(codes, vec![first.code, second.code]);
    }

    #[tokio::test]
    async fn test_find_by_code_is_exact() {
        let dir = directory();
        dir.create_branch(hcm()).await.unwrap();
        assert!(dir.find_by_code("HCM").await.unwrap().is_some());
        assert!(dir.find_by_code("hcm").await.unwrap().is_none());
        assert!(dir.find_by_name("Ho Chi Minh Campus").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_branch_allows_keeping_own_name() {
        let dir = directory();
        let branch = dir.create_branch(hcm()).await.unwrap();

        let updated = dir
            .update_branch(
                branch.branch_id,
                BranchUpdate {
                    name: "Ho Chi Minh Campus".to_string(),
                    address: "New address".to_string(),
                    active: true,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.address, "New address");
        assert_eq!(updated.code, "HCM");
    }

    #[tokio::test]
    async fn test_update_branch_rejects_name_of_other_branch() {
        let dir = directory();
        dir.create_branch(hcm()).await.unwrap();
        let hn = dir.create_branch(hn()).await.unwrap();

        let result = dir
            .update_branch(
                hn.branch_id,
                BranchUpdate {
                    name: "Ho Chi Minh Campus".to_string(),
                    address: "x".to_string(),
                    active: true,
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_unknown_branch_is_not_found() {
        let dir = directory();
        let result = dir
            .update_branch(
                Uuid::new_v4(),
                BranchUpdate {
                    name: "x".to_string(),
                    address: "y".to_string(),
                    active: true,
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_deactivate_keeps_branch_queryable() {
        let dir = directory();
        let branch = dir.create_branch(hcm()).await.unwrap();

        dir.deactivate_branch(branch.branch_id).await.unwrap();

        assert!(dir.find_active_branches().await.unwrap().is_empty());
        let stored = dir.get_branch(branch.branch_id).await.unwrap();
        assert!(!stored.active);
        assert!(matches!(
            dir.deactivate_branch(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_allowed_email_lifecycle() {
        let dir = directory();
        let branch = dir.create_branch(hcm()).await.unwrap();

        dir.add_allowed_email(branch.branch_id, "Student1@fe.edu.vn", Some("Student".into()))
            .await
            .unwrap();
        assert_eq!(
            dir.list_allowed_emails(branch.branch_id).await.unwrap(),
            vec!["student1@fe.edu.vn".to_string()]
        );

        dir.remove_allowed_email(branch.branch_id, "student1@fe.edu.vn")
            .await
            .unwrap();
        assert!(dir.list_allowed_emails(branch.branch_id).await.unwrap().is_empty());

        let history = dir.allowed_email_history(branch.branch_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(!history[0].active);

        // Re-adding a soft-deleted email is rejected.
        let readd = dir
            .add_allowed_email(branch.branch_id, "student1@fe.edu.vn", None)
            .await;
        assert!(matches!(readd, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_allowed_email_missing_branch_or_entry() {
        let dir = directory();
        let missing = dir
            .add_allowed_email(Uuid::new_v4(), "a@b.c", None)
            .await;
        assert!(matches!(missing, Err(ServiceError::NotFound(_))));

        let branch = dir.create_branch(hcm()).await.unwrap();
        let absent = dir.remove_allowed_email(branch.branch_id, "nobody@b.c").await;
        assert!(matches!(absent, Err(ServiceError::NotFound(_))));
    }
}
