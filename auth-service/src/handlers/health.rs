use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::AppState;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let database = match &state.database {
        Some(db) => {
            crate::db::ping(db).await.map_err(|e| {
                tracing::error!(error = %e, "PostgreSQL health check failed");
                AppError::ServiceUnavailable
            })?;
            "up"
        }
        None => "in-memory",
    };

    state.sessions.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Session store health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "database": database,
            "sessions": "up"
        }
    })))
}
