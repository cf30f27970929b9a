//! Federated login endpoints.
//!
//! Both legs answer with `302 Found`. The inbound leg always redirects to the
//! front-end, carrying either tokens or an error code.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use service_core::error::AppError;

use crate::services::login::{RedirectOutcome, INVALID_STATE};
use crate::services::{HandshakeRequest, InboundRequest};
use crate::AppState;

pub const SESSION_COOKIE: &str = "login_session";

#[derive(Debug, Deserialize)]
pub struct AuthorizationQuery {
    pub branch: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub branch: Option<String>,
    pub error: Option<String>,
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// GET /oauth2/authorization/:registration_id?branch=..
pub async fn authorize(
    State(state): State<AppState>,
    Path(registration_id): Path<String>,
    Query(query): Query<AuthorizationQuery>,
    jar: CookieJar,
) -> Result<(CookieJar, Response), AppError> {
    let session_id = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let request = HandshakeRequest {
        registration_id: registration_id.clone(),
        session_id: session_id.clone(),
        branch: query.branch.filter(|b| !b.trim().is_empty()),
    };

    let params = state.login.begin_handshake(&request).await?.ok_or_else(|| {
        AppError::NotFound(anyhow::anyhow!(
            "Unknown OAuth2 registration: {}",
            registration_id
        ))
    })?;

    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .secure(state.config.security.secure_cookies)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(
            state.config.login.session_ttl_seconds as i64,
        ))
        .build();

    Ok((jar.add(cookie), found(&params.authorization_uri)))
}

/// GET /login/oauth2/code/:registration_id
pub async fn callback(
    State(state): State<AppState>,
    Path(registration_id): Path<String>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> (CookieJar, Response) {
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    let outcome = match (session_id.as_deref(), query.error.as_deref()) {
        (None, _) => {
            tracing::warn!(registration_id = %registration_id, "OAuth2 callback without login session");
            RedirectOutcome::failure(INVALID_STATE)
        }
        (Some(session_id), Some(error)) => state.login.abandon_handshake(session_id, error).await,
        (Some(session_id), None) => {
            let inbound = InboundRequest {
                session_id: session_id.to_string(),
                branch: query.branch,
            };
            match (query.code.as_deref(), query.state.as_deref()) {
                (Some(code), Some(oauth_state)) => {
                    state.login.handle_callback(&inbound, code, oauth_state).await
                }
                _ => {
                    state
                        .login
                        .abandon_handshake(session_id, "missing code or state")
                        .await
                }
            }
        }
    };

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/").build());
    let location = outcome.redirect_url(&state.config.login.frontend_url);
    (jar, found(&location))
}
