//! Role and permission administration handlers.

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use super::record_admin_action;
use crate::dtos::role::{
    CreateRoleRequest, PermissionResponse, RolePermissionsRequest, RoleResponse, UpdateRoleRequest,
};
use crate::dtos::MessageResponse;
use crate::middleware::AuthenticatedPrincipal;
use crate::models::permission_codes as codes;
use crate::AppState;

/// GET /api/admin/roles
pub async fn list_roles(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
) -> Result<Json<Vec<RoleResponse>>, AppError> {
    state.gate.authorize(&principal, codes::ROLE_VIEW).await?;

    let roles = state.permissions.list_roles().await?;
    Ok(Json(roles.into_iter().map(RoleResponse::from).collect()))
}

/// GET /api/admin/roles/:id
pub async fn get_role(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(role_id): Path<Uuid>,
) -> Result<Json<RoleResponse>, AppError> {
    state.gate.authorize(&principal, codes::ROLE_VIEW).await?;

    let role = state.permissions.get_role(role_id).await?;
    Ok(Json(RoleResponse::from(role)))
}

/// POST /api/admin/roles
pub async fn create_role(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Json(req): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), AppError> {
    state.gate.authorize(&principal, codes::ROLE_CREATE).await?;
    req.validate()?;

    let role = state
        .permissions
        .create_role(&req.name, req.description, &req.permission_codes)
        .await?;

    record_admin_action(&state, &principal, &format!("Created role {}", role.name)).await;

    Ok((StatusCode::CREATED, Json(RoleResponse::from(role))))
}

/// PUT /api/admin/roles/:id
pub async fn update_role(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(role_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<RoleResponse>, AppError> {
    state.gate.authorize(&principal, codes::ROLE_UPDATE).await?;
    req.validate()?;

    let role = state
        .permissions
        .update_role(role_id, &req.name, req.description)
        .await?;

    record_admin_action(&state, &principal, &format!("Updated role {}", role.name)).await;

    Ok(Json(RoleResponse::from(role)))
}

/// DELETE /api/admin/roles/:id
pub async fn delete_role(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(role_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.gate.authorize(&principal, codes::ROLE_DELETE).await?;

    state.permissions.delete_role(role_id).await?;

    record_admin_action(&state, &principal, &format!("Deleted role {}", role_id)).await;

    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/admin/roles/:id/permissions
pub async fn replace_role_permissions(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path(role_id): Path<Uuid>,
    Json(req): Json<RolePermissionsRequest>,
) -> Result<Json<RoleResponse>, AppError> {
    state
        .gate
        .authorize(&principal, codes::ROLE_UPDATE_PERMISSIONS)
        .await?;

    let role = state
        .permissions
        .replace_permissions(role_id, &req.permission_codes)
        .await?;

    record_admin_action(
        &state,
        &principal,
        &format!(
            "Replaced permissions of role {}: {}",
            role.name,
            req.permission_codes.join(",")
        ),
    )
    .await;

    Ok(Json(RoleResponse::from(role)))
}

/// PUT /api/admin/roles/:id/members/:subject
pub async fn assign_role_member(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path((role_id, subject)): Path<(Uuid, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    state.gate.authorize(&principal, codes::ROLE_UPDATE).await?;

    state.permissions.assign_role(&subject, role_id).await?;

    record_admin_action(
        &state,
        &principal,
        &format!("Assigned role {} to {}", role_id, subject),
    )
    .await;

    Ok(Json(MessageResponse::new("Role assigned")))
}

/// DELETE /api/admin/roles/:id/members/:subject
pub async fn revoke_role_member(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
    Path((role_id, subject)): Path<(Uuid, String)>,
) -> Result<Json<MessageResponse>, AppError> {
    state.gate.authorize(&principal, codes::ROLE_UPDATE).await?;

    state.permissions.revoke_role(&subject, role_id).await?;

    record_admin_action(
        &state,
        &principal,
        &format!("Revoked role {} from {}", role_id, subject),
    )
    .await;

    Ok(Json(MessageResponse::new("Role revoked")))
}

/// GET /api/admin/permissions
pub async fn list_permissions(
    State(state): State<AppState>,
    AuthenticatedPrincipal(principal): AuthenticatedPrincipal,
) -> Result<Json<Vec<PermissionResponse>>, AppError> {
    state.gate.authorize(&principal, codes::PERMISSION_VIEW).await?;

    let permissions = state.permissions.list_permissions().await?;
    Ok(Json(
        permissions.into_iter().map(PermissionResponse::from).collect(),
    ))
}
