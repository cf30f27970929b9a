use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::session::{RefreshRequest, TokenResponse};
use crate::services::CredentialIssuer;
use crate::AppState;

/// POST /api/auth/refresh
///
/// Trades a refresh token for a new token pair bound to the same subject and
/// branch. The allow-list is consulted again, so removing an email from a
/// branch stops further refreshes.
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    req.validate()?;

    let claims = state
        .jwt
        .validate_refresh_token(&req.refresh_token)
        .map_err(|e| {
            tracing::debug!(error = %e, "Rejected refresh token");
            AppError::Unauthorized(anyhow::anyhow!("Invalid or expired refresh token"))
        })?;

    if !state
        .email_authorization
        .validate_email_for_branch(&claims.sub, &claims.branch)
        .await
    {
        tracing::warn!(branch_code = %claims.branch, "Refresh refused, email no longer allowed");
        return Err(AppError::Unauthorized(anyhow::anyhow!(
            "Email is no longer allowed for branch {}",
            claims.branch
        )));
    }

    let tokens = state
        .jwt
        .issue_tokens(&claims.sub, claims.name.as_deref(), &claims.branch)
        .await?;

    tracing::info!(branch_code = %claims.branch, "Access token refreshed");
    Ok((StatusCode::OK, Json(tokens.into())))
}
