//! Decides whether an email may authenticate against a branch.

use std::sync::Arc;

use super::store::BranchRepository;
use super::ServiceError;
use crate::models::{normalize_email, Branch};

#[derive(Clone)]
pub struct EmailAuthorizationEngine {
    store: Arc<dyn BranchRepository>,
}

impl EmailAuthorizationEngine {
    pub fn new(store: Arc<dyn BranchRepository>) -> Self {
        Self { store }
    }

    /// Total predicate: unknown or inactive branches, missing entries and
    /// store faults all answer `false`.
    pub async fn validate_email_for_branch(&self, email: &str, branch_code: &str) -> bool {
        match self.check(email, branch_code).await {
            Ok(allowed) => {
                tracing::debug!(email = %email, branch_code = %branch_code, allowed, "Email validation for branch");
                allowed
            }
            Err(e) => {
                tracing::error!(error = %e, branch_code = %branch_code, "Email validation failed closed");
                false
            }
        }
    }

    async fn check(&self, email: &str, branch_code: &str) -> Result<bool, ServiceError> {
        let branch = match self.store.find_branch_by_code(branch_code).await? {
            Some(branch) if branch.active => branch,
            _ => {
                tracing::warn!(branch_code = %branch_code, "Branch not found or inactive");
                return Ok(false);
            }
        };

        let email = normalize_email(email);
        if email.is_empty() {
            return Ok(false);
        }

        Ok(self
            .store
            .find_allowed_email(branch.branch_id, &email)
            .await?
            .is_some_and(|entry| entry.active))
    }

    /// Reverse lookup for logins without a pre-selected branch.
    ///
    /// When several active branches allow the same address the oldest branch
    /// wins and the ambiguity is logged; see DESIGN.md for this policy.
    pub async fn find_branch_by_allowed_email(
        &self,
        email: &str,
    ) -> Result<Option<Branch>, ServiceError> {
        let email = normalize_email(email);
        let mut branches = self.store.find_branches_allowing_email(&email).await?;

        if branches.len() > 1 {
            let codes: Vec<&str> = branches.iter().map(|b| b.code.as_str()).collect();
            tracing::warn!(
                branch_codes = ?codes,
                "Email is allowed by several branches, using the oldest"
            );
        }

        Ok(if branches.is_empty() {
            None
        } else {
            Some(branches.remove(0))
        })
    }
}
