use branch_auth_service::{
    build_router,
    config::AuthConfig,
    db,
    services::{
        seed_defaults, BranchRepository, Database, GoogleIdentityProvider, InMemoryStore,
        JwtService, MemorySessionStore, RedisSessionStore, RoleRepository, SessionStore,
        TracingActivityLog,
    },
    AppState, Collaborators,
};
use service_core::error::AppError;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting branch authentication service"
    );

    let (branch_store, role_store, database): (
        Arc<dyn BranchRepository>,
        Arc<dyn RoleRepository>,
        Option<Database>,
    ) = match db::connect(&config.database).await? {
        Some(database) => (
            Arc::new(database.clone()),
            Arc::new(database.clone()),
            Some(database),
        ),
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-process store");
            let store = Arc::new(InMemoryStore::new());
            (store.clone(), store, None)
        }
    };

    let sessions: Arc<dyn SessionStore> = match config.redis.url.as_deref() {
        Some(url) => Arc::new(RedisSessionStore::new(url).await?),
        None => {
            tracing::warn!("REDIS_URL not set, login sessions are kept in process memory");
            Arc::new(MemorySessionStore::new())
        }
    };

    let jwt = JwtService::new(&config.jwt)?;

    let collaborators = Collaborators {
        branch_store,
        role_store: role_store.clone(),
        sessions,
        identity_provider: Arc::new(GoogleIdentityProvider::new(config.google.clone())),
        activity: Arc::new(TracingActivityLog),
        database,
    };
    let state = AppState::new(config.clone(), jwt, collaborators);

    let report = seed_defaults(
        role_store,
        &state.permissions,
        &state.branches,
        &config.bootstrap,
    )
    .await?;
    tracing::info!(?report, "Bootstrap complete");

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));

    let service_span = tracing::info_span!(
        "service",
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
    );
    let _guard = service_span.enter();

    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
