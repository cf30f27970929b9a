//! Branch-aware OAuth2 login handshake.
//!
//! Outbound: the provider builds the authorization request and the selected
//! branch is stashed in the login session. Inbound: the branch is recovered,
//! the email is checked against the branch allow-list, credentials are minted
//! and every outcome becomes a redirect. Nothing on the inbound leg surfaces
//! as an error to the browser.

use std::sync::Arc;

use super::activity_log::{ActivityKind, ActivityLogSink};
use super::identity_provider::{
    AuthorizationRequestParameters, CallbackParameters, HandshakeRequest, IdentityProviderClient,
    VerifiedIdentity,
};
use super::jwt::CredentialIssuer;
use super::session::SessionStore;
use super::{EmailAuthorizationEngine, ServiceError};
use crate::models::normalize_email;

pub const SELECTED_BRANCH_KEY: &str = "selectedBranch";
const OAUTH_STATE_KEY: &str = "oauthState";
const CODE_VERIFIER_KEY: &str = "codeVerifier";

pub const MISSING_EMAIL: &str = "missing_email";
pub const MISSING_BRANCH_SELECTION: &str = "missing_branch_selection";
pub const AUTHENTICATION_FAILED: &str = "oauth2_authentication_failed";
pub const INVALID_STATE: &str = "invalid_state";
pub const EMAIL_NOT_ALLOWED: &str = "Email domain not allowed for selected branch";

/// Result of the inbound leg, turned into a front-end redirect by the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    Success {
        access_token: String,
        refresh_token: String,
    },
    Failure {
        reason_code: String,
    },
}

impl RedirectOutcome {
    pub fn failure(reason: &str) -> Self {
        RedirectOutcome::Failure {
            reason_code: reason_code(reason),
        }
    }

    /// `frontend_base` must end with `/`.
    pub fn redirect_url(&self, frontend_base: &str) -> String {
        match self {
            RedirectOutcome::Success {
                access_token,
                refresh_token,
            } => format!(
                "{}login?token={}&refreshToken={}",
                frontend_base,
                urlencoding::encode(access_token),
                urlencoding::encode(refresh_token)
            ),
            RedirectOutcome::Failure { reason_code } => format!(
                "{}login?error={}",
                frontend_base,
                urlencoding::encode(reason_code)
            ),
        }
    }
}

/// Machine-readable code for a failure message: spaces become underscores.
pub fn reason_code(message: &str) -> String {
    message.trim().replace(' ', "_")
}

/// Inbound leg request context.
#[derive(Debug, Clone, Default)]
pub struct InboundRequest {
    pub session_id: String,
    /// `branch` query parameter on the callback, if the provider echoed one.
    pub branch: Option<String>,
}

#[derive(Clone)]
pub struct OAuth2LoginOrchestrator {
    provider: Arc<dyn IdentityProviderClient>,
    sessions: Arc<dyn SessionStore>,
    email_authorization: EmailAuthorizationEngine,
    issuer: Arc<dyn CredentialIssuer>,
    activity: Arc<dyn ActivityLogSink>,
    session_ttl_seconds: u64,
}

impl OAuth2LoginOrchestrator {
    pub fn new(
        provider: Arc<dyn IdentityProviderClient>,
        sessions: Arc<dyn SessionStore>,
        email_authorization: EmailAuthorizationEngine,
        issuer: Arc<dyn CredentialIssuer>,
        activity: Arc<dyn ActivityLogSink>,
        session_ttl_seconds: u64,
    ) -> Self {
        Self {
            provider,
            sessions,
            email_authorization,
            issuer,
            activity,
            session_ttl_seconds,
        }
    }

    /// Outbound leg.
    ///
    /// The selected branch, `state` and the PKCE verifier are stored for the
    /// callback. Nothing is stored when the provider does not handle the
    /// registration id, since no session cookie is issued for that request.
    pub async fn begin_handshake(
        &self,
        request: &HandshakeRequest,
    ) -> Result<Option<AuthorizationRequestParameters>, ServiceError> {
        let Some(params) = self.provider.resolve_base_authorization_request(request) else {
            tracing::debug!(
                registration_id = %request.registration_id,
                "No provider for registration, login session untouched"
            );
            return Ok(None);
        };

        if let Some(branch) = request.branch.as_deref() {
            self.put(&request.session_id, SELECTED_BRANCH_KEY, branch)
                .await?;
            tracing::debug!(branch_code = %branch, "Stored selected branch for login");
        }

        self.put(&request.session_id, OAUTH_STATE_KEY, &params.state)
            .await?;
        self.put(&request.session_id, CODE_VERIFIER_KEY, &params.code_verifier)
            .await?;

        Ok(Some(params))
    }

    /// Provider callback: checks `state`, exchanges the code, then completes
    /// the handshake. Provider faults map to `oauth2_authentication_failed`.
    pub async fn handle_callback(
        &self,
        request: &InboundRequest,
        code: &str,
        state: &str,
    ) -> RedirectOutcome {
        let stored_state = self.take(&request.session_id, OAUTH_STATE_KEY).await;
        let code_verifier = self.take(&request.session_id, CODE_VERIFIER_KEY).await;

        let code_verifier = match (stored_state, code_verifier) {
            (Some(expected), Some(verifier)) if expected == state => verifier,
            _ => {
                tracing::warn!("OAuth2 callback with unknown or mismatched state");
                self.forget_branch(&request.session_id).await;
                return RedirectOutcome::failure(INVALID_STATE);
            }
        };

        let callback = CallbackParameters {
            code: code.to_string(),
            code_verifier,
        };
        match self.provider.fetch_verified_identity(&callback).await {
            Ok(identity) => self.complete_handshake(&identity, request).await,
            Err(e) => {
                tracing::error!(error = %e, "OAuth2 code exchange failed");
                self.record(None, &format!("OAuth2 login failed: {}", e)).await;
                self.forget_branch(&request.session_id).await;
                RedirectOutcome::failure(AUTHENTICATION_FAILED)
            }
        }
    }

    /// The provider redirected back with an error (e.g. the user declined).
    pub async fn abandon_handshake(&self, session_id: &str, provider_error: &str) -> RedirectOutcome {
        tracing::warn!(provider_error = %provider_error, "OAuth2 provider returned an error");
        for key in [OAUTH_STATE_KEY, CODE_VERIFIER_KEY, SELECTED_BRANCH_KEY] {
            self.take(session_id, key).await;
        }
        self.record(None, &format!("OAuth2 login failed: {}", provider_error))
            .await;
        RedirectOutcome::failure(AUTHENTICATION_FAILED)
    }

    /// Inbound leg given a verified identity. Consumes the stored branch.
    pub async fn complete_handshake(
        &self,
        identity: &VerifiedIdentity,
        request: &InboundRequest,
    ) -> RedirectOutcome {
        let stored_branch = self.take(&request.session_id, SELECTED_BRANCH_KEY).await;
        let branch_code = request
            .branch
            .clone()
            .filter(|b| !b.trim().is_empty())
            .or(stored_branch)
            .map(|b| b.trim().to_string());

        let email = match identity
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
        {
            Some(email) => email,
            None => return RedirectOutcome::failure(MISSING_EMAIL),
        };

        let branch_code = match branch_code {
            Some(code) => code,
            None => return RedirectOutcome::failure(MISSING_BRANCH_SELECTION),
        };

        match self
            .authorize_and_issue(&email, identity.name.as_deref(), &branch_code)
            .await
        {
            Ok(tokens) => {
                let detail = format!(
                    "OAuth2 login successful via {} for branch: {}",
                    identity.provider_name(),
                    branch_code
                );
                self.record(Some(&email), &detail).await;
                tracing::info!(branch_code = %branch_code, "OAuth2 login succeeded");
                tokens
            }
            Err(message) => {
                tracing::warn!(branch_code = %branch_code, reason = %message, "OAuth2 login rejected");
                self.record(Some(&email), &format!("OAuth2 login failed: {}", message))
                    .await;
                RedirectOutcome::failure(&message)
            }
        }
    }

    async fn authorize_and_issue(
        &self,
        email: &str,
        name: Option<&str>,
        branch_code: &str,
    ) -> Result<RedirectOutcome, String> {
        if !self
            .email_authorization
            .validate_email_for_branch(email, branch_code)
            .await
        {
            return Err(EMAIL_NOT_ALLOWED.to_string());
        }

        let tokens = self
            .issuer
            .issue_tokens(email, name, branch_code)
            .await
            .map_err(|e| e.to_string())?;

        Ok(RedirectOutcome::Success {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        })
    }

    async fn put(&self, session_id: &str, key: &str, value: &str) -> Result<(), ServiceError> {
        self.sessions
            .set(session_id, key, value, self.session_ttl_seconds)
            .await
            .map_err(|e| ServiceError::Session(e.to_string()))
    }

    /// Read and delete. A failing store reads as absent.
    async fn take(&self, session_id: &str, key: &str) -> Option<String> {
        let value = match self.sessions.get(session_id, key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, key = %key, "Failed to read login session");
                return None;
            }
        };
        if let Err(e) = self.sessions.remove(session_id, key).await {
            tracing::warn!(error = %e, key = %key, "Failed to clear login session value");
        }
        value
    }

    async fn forget_branch(&self, session_id: &str) {
        if let Err(e) = self.sessions.remove(session_id, SELECTED_BRANCH_KEY).await {
            tracing::warn!(error = %e, "Failed to clear selected branch");
        }
    }

    async fn record(&self, actor: Option<&str>, detail: &str) {
        if let Err(e) = self
            .activity
            .record(actor, ActivityKind::LoginAttempt, detail)
            .await
        {
            tracing::warn!(error = %e, "Failed to record login activity");
        }
    }
}
