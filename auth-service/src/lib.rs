pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use service_core::axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::{get, post, put},
    Router,
};
use service_core::middleware::{
    security_headers::security_headers_middleware, tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AuthConfig;
use crate::services::{
    ActivityLogSink, AuthorizationGate, BranchDirectory, BranchRepository, Database,
    EmailAuthorizationEngine, IdentityProviderClient, JwtService, OAuth2LoginOrchestrator,
    PermissionModel, RoleRepository, SessionStore,
};
use service_core::error::AppError;

/// External collaborators the services are built on.
pub struct Collaborators {
    pub branch_store: Arc<dyn BranchRepository>,
    pub role_store: Arc<dyn RoleRepository>,
    pub sessions: Arc<dyn SessionStore>,
    pub identity_provider: Arc<dyn IdentityProviderClient>,
    pub activity: Arc<dyn ActivityLogSink>,
    /// Present when running against PostgreSQL; used by the health check.
    pub database: Option<Database>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub jwt: JwtService,
    pub branches: BranchDirectory,
    pub email_authorization: EmailAuthorizationEngine,
    pub permissions: PermissionModel,
    pub gate: AuthorizationGate,
    pub login: OAuth2LoginOrchestrator,
    pub sessions: Arc<dyn SessionStore>,
    pub activity: Arc<dyn ActivityLogSink>,
    pub database: Option<Database>,
}

impl AppState {
    pub fn new(config: AuthConfig, jwt: JwtService, collaborators: Collaborators) -> Self {
        let branches = BranchDirectory::new(collaborators.branch_store.clone());
        let email_authorization = EmailAuthorizationEngine::new(collaborators.branch_store);
        let permissions = PermissionModel::new(collaborators.role_store);
        let gate = AuthorizationGate::new(permissions.clone());
        let login = OAuth2LoginOrchestrator::new(
            collaborators.identity_provider,
            collaborators.sessions.clone(),
            email_authorization.clone(),
            Arc::new(jwt.clone()),
            collaborators.activity.clone(),
            config.login.session_ttl_seconds,
        );

        Self {
            config,
            jwt,
            branches,
            email_authorization,
            permissions,
            gate,
            login,
            sessions: collaborators.sessions,
            activity: collaborators.activity,
            database: collaborators.database,
        }
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/branches",
            get(handlers::branch::list_active_branches).post(handlers::branch::create_branch),
        )
        .route(
            "/api/branches/validate-email",
            get(handlers::branch::validate_email),
        )
        .route(
            "/oauth2/authorization/:registration_id",
            get(handlers::oauth::authorize),
        )
        .route(
            "/login/oauth2/code/:registration_id",
            get(handlers::oauth::callback),
        )
        .route("/api/auth/refresh", post(handlers::session::refresh))
        .route(
            "/api/branches/:id",
            get(handlers::branch::get_branch)
                .put(handlers::branch::update_branch)
                .delete(handlers::branch::deactivate_branch),
        )
        .route(
            "/api/branches/:id/allowed-emails",
            get(handlers::branch::list_allowed_emails)
                .post(handlers::branch::add_allowed_email)
                .delete(handlers::branch::remove_allowed_email),
        )
        .route(
            "/api/branches/:id/allowed-emails/history",
            get(handlers::branch::list_allowed_email_history),
        )
        .route(
            "/api/admin/roles",
            get(handlers::role::list_roles).post(handlers::role::create_role),
        )
        .route(
            "/api/admin/roles/:id",
            get(handlers::role::get_role)
                .put(handlers::role::update_role)
                .delete(handlers::role::delete_role),
        )
        .route(
            "/api/admin/roles/:id/permissions",
            put(handlers::role::replace_role_permissions),
        )
        .route(
            "/api/admin/roles/:id/members/:subject",
            put(handlers::role::assign_role_member).delete(handlers::role::revoke_role_member),
        )
        .route(
            "/api/admin/permissions",
            get(handlers::role::list_permissions),
        )
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config)?);

    Ok(app)
}

fn cors_layer(config: &AuthConfig) -> Result<CorsLayer, AppError> {
    let origins = config
        .security
        .allowed_origins
        .iter()
        .map(|o| {
            if o == "*" {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin cannot be combined with credentialed requests"
                )));
            }
            o.parse::<HeaderValue>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("Invalid CORS origin '{}': {}", o, e))
            })
        })
        .collect::<Result<Vec<HeaderValue>, AppError>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]))
}
