use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{AllowedEmailEntry, Branch};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBranchRequest {
    #[validate(length(min = 1, max = 100, message = "Branch name is required"))]
    pub name: String,

    #[validate(length(min = 1, max = 10, message = "Branch code must be 1 to 10 characters"))]
    pub code: String,

    #[validate(length(min = 1, max = 255, message = "Address is required"))]
    pub address: String,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBranchRequest {
    #[validate(length(min = 1, max = 100, message = "Branch name is required"))]
    pub name: String,

    #[validate(length(min = 1, max = 255, message = "Address is required"))]
    pub address: String,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AllowedEmailRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(max = 255))]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveAllowedEmailQuery {
    pub email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateEmailQuery {
    pub email: String,
    pub branch_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchResponse {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub address: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Branch> for BranchResponse {
    fn from(branch: Branch) -> Self {
        Self {
            id: branch.branch_id,
            name: branch.name,
            code: branch.code,
            address: branch.address,
            is_active: branch.active,
            created_at: branch.created_utc,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowedEmailResponse {
    pub id: Uuid,
    pub branch_id: Uuid,
    pub email: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<AllowedEmailEntry> for AllowedEmailResponse {
    fn from(entry: AllowedEmailEntry) -> Self {
        Self {
            id: entry.entry_id,
            branch_id: entry.branch_id,
            email: entry.email,
            description: entry.description,
            is_active: entry.active,
            created_at: entry.created_utc,
        }
    }
}
