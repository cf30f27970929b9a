use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use service_core::error::AppError;

use crate::{models::Principal, services::JwtService, AppState};

/// Resolve the caller from a `Bearer` access token.
pub fn principal_from_headers(jwt: &JwtService, headers: &HeaderMap) -> Result<Principal, AppError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = jwt.validate_access_token(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        AppError::Unauthorized(anyhow::anyhow!("Invalid or expired token"))
    })?;

    let mut principal = Principal::new(claims.sub);
    principal.name = claims.name;
    principal.branch_code = Some(claims.branch);
    Ok(principal)
}

/// The authenticated caller. Rejects the request with 401 before the
/// handler body runs.
pub struct AuthenticatedPrincipal(pub Principal);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthenticatedPrincipal {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(AuthenticatedPrincipal(principal.clone()));
        }

        let principal = principal_from_headers(&state.jwt, &parts.headers)?;
        parts.extensions.insert(principal.clone());
        Ok(AuthenticatedPrincipal(principal))
    }
}
