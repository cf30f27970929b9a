//! Branch directory handlers.
//!
//! Listing and email validation are public; everything else is gated.

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::record_admin_action;
use crate::dtos::branch::{
    AllowedEmailRequest, AllowedEmailResponse, BranchResponse, CreateBranchRequest,
    RemoveAllowedEmailQuery, UpdateBranchRequest, ValidateEmailQuery,
};
use crate::dtos::MessageResponse;
use crate::middleware::AuthenticatedPrincipal;
use crate::models::{permission_codes as codes, NewBranch};
use crate::services::BranchUpdate;
use crate::AppState;

/// GET /api/branches
pub async fn list_active_branches(
    State(state): State<AppState>,
) -> Result<Json<Vec<BranchResponse>>, AppError> {
    let branches = state.branches.find_active_branches().await?;
    Ok(Json(branches.into_iter().map(BranchResponse::from).collect()))
}

/// GET /api/branches/validate-email?email=..&branchCode=..
pub async fn validate_email(
    State(state): State<AppState>,
    Query(query): Query<ValidateEmailQuery>,
) -> Json<bool> {
    Json(
        state
            .email_authorization
            .validate_email_for_branch(&query.email, &query.branch_code)
            .await,
    )
}

/// POST /api/branches
pub async fn create_branch(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Json(req): Json<CreateBranchRequest>,
) -> Result<(StatusCode, Json<BranchResponse>), AppError> {
    state.gate.authorize(&principal, codes::BRANCH_CREATE).await?;
    req.validate()?;

    let branch = state
        .branches
        .create_branch(NewBranch {
            name: req.name,
            code: req.code,
            address: req.address,
            active: req.is_active,
        })
        .await?;

    record_admin_action(
        &state,
        &principal,
        &format!("Created branch {} ({})", branch.code, branch.branch_id),
    )
    .await;

    Ok((StatusCode::CREATED, Json(BranchResponse::from(branch))))
}

/// GET /api/branches/:id
pub async fn get_branch(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(branch_id): Path<Uuid>,
) -> Result<Json<BranchResponse>, AppError> {
    state.gate.authorize(&principal, codes::BRANCH_READ).await?;

    let branch = state.branches.get_branch(branch_id).await?;
    Ok(Json(BranchResponse::from(branch)))
}

/// PUT /api/branches/:id
pub async fn update_branch(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(branch_id): Path<Uuid>,
    Json(req): Json<UpdateBranchRequest>,
) -> Result<Json<BranchResponse>, AppError> {
    state.gate.authorize(&principal, codes::BRANCH_UPDATE).await?;
    req.validate()?;

    let branch = state
        .branches
        .update_branch(
            branch_id,
            BranchUpdate {
                name: req.name,
                address: req.address,
                active: req.is_active,
            },
        )
        .await?;

    record_admin_action(&state, &principal, &format!("Updated branch {}", branch.code)).await;

    Ok(Json(BranchResponse::from(branch)))
}

/// DELETE /api/branches/:id
///
/// Soft delete.
pub async fn deactivate_branch(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(branch_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state.gate.authorize(&principal, codes::BRANCH_DELETE).await?;

    state.branches.deactivate_branch(branch_id).await?;

    record_admin_action(&state, &principal, &format!("Deactivated branch {}", branch_id)).await;

    Ok(Json(MessageResponse::new("Branch deactivated successfully")))
}

/// GET /api/branches/:id/allowed-emails
pub async fn list_allowed_emails(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(branch_id): Path<Uuid>,
) -> Result<Json<Vec<String>>, AppError> {
    state.gate.authorize(&principal, codes::BRANCH_READ).await?;

    let emails = state.branches.list_allowed_emails(branch_id).await?;
    Ok(Json(emails))
}

/// GET /api/branches/:id/allowed-emails/history
///
/// Every entry of the branch, removed ones included (`isActive: false`).
pub async fn list_allowed_email_history(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(branch_id): Path<Uuid>,
) -> Result<Json<Vec<AllowedEmailResponse>>, AppError> {
    state.gate.authorize(&principal, codes::BRANCH_READ).await?;

    let entries = state.branches.allowed_email_history(branch_id).await?;
    Ok(Json(
        entries.into_iter().map(AllowedEmailResponse::from).collect(),
    ))
}

/// POST /api/branches/:id/allowed-emails
pub async fn add_allowed_email(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(branch_id): Path<Uuid>,
    Json(req): Json<AllowedEmailRequest>,
) -> Result<(StatusCode, Json<AllowedEmailResponse>), AppError> {
    state.gate.authorize(&principal, codes::BRANCH_UPDATE).await?;
    req.validate()?;

    let entry = state
        .branches
        .add_allowed_email(branch_id, &req.email, req.description)
        .await?;

    record_admin_action(
        &state,
        &principal,
        &format!("Added allowed email {} to branch {}", entry.email, branch_id),
    )
    .await;

    Ok((StatusCode::CREATED, Json(AllowedEmailResponse::from(entry))))
}

/// DELETE /api/branches/:id/allowed-emails?email=..
pub async fn remove_allowed_email(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(branch_id): Path<Uuid>,
    Query(query): Query<RemoveAllowedEmailQuery>,
) -> Result<Json<MessageResponse>, AppError> {
    state.gate.authorize(&principal, codes::BRANCH_UPDATE).await?;

    state
        .branches
        .remove_allowed_email(branch_id, &query.email)
        .await?;

    record_admin_action(
        &state,
        &principal,
        &format!("Removed allowed email {} from branch {}", query.email, branch_id),
    )
    .await;

    Ok(Json(MessageResponse::new("Allowed email removed successfully")))
}
