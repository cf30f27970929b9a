//! PostgreSQL bootstrap: pool, schema, liveness.
//!
//! Branches and roles live in PostgreSQL only when `DATABASE_URL` is set.
//! Without it the service falls back to the in-process store and nothing
//! here touches the network.

use service_core::error::AppError;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::services::Database;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_LIFETIME: Duration = Duration::from_secs(1800);

/// Open the branch/role database and bring its schema up to date.
///
/// `Ok(None)` when no URL is configured.
pub async fn connect(config: &DatabaseConfig) -> Result<Option<Database>, AppError> {
    let Some(url) = config.url.as_deref().filter(|u| !u.trim().is_empty()) else {
        return Ok(None);
    };

    tracing::info!(
        max_connections = config.max_connections,
        "Connecting to the branch database"
    );
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect(url)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;

    // Branch, allow-list and role tables, plus the permission catalogue.
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
    tracing::info!("Branch database schema is current");

    Ok(Some(Database::new(pool)))
}

/// Round-trip used by `/health`.
pub async fn ping(database: &Database) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(database.pool()).await?;
    Ok(())
}
