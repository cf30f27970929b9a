//! Identity-provider client seam and the Google adapter.
//!
//! The Google adapter is a thin authorization-code + PKCE exchange against the
//! token and userinfo endpoints. It does no discovery and does not verify ID
//! token signatures; the userinfo response over TLS is taken as the verified
//! identity.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::Rng;
use secrecy::ExposeSecret;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::GoogleOAuthConfig;

/// Outbound leg input, extracted from the HTTP request by the boundary.
#[derive(Debug, Clone, Default)]
pub struct HandshakeRequest {
    pub registration_id: String,
    pub session_id: String,
    pub branch: Option<String>,
}

/// Where to send the browser, plus the secrets the inbound leg must see again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequestParameters {
    pub authorization_uri: String,
    pub state: String,
    pub code_verifier: String,
}

/// Inbound leg input handed to the provider for the code exchange.
#[derive(Debug, Clone)]
pub struct CallbackParameters {
    pub code: String,
    pub code_verifier: String,
}

/// Identity asserted by the provider after a successful exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: Option<String>,
    pub name: Option<String>,
    /// Provider-side principal identifier.
    pub principal_name: String,
    pub provider: Option<String>,
}

impl VerifiedIdentity {
    /// Display name of the provider, used in activity records.
    ///
    /// Prefers the explicit `provider` field and only falls back to matching
    /// on the principal name.
    pub fn provider_name(&self) -> String {
        if let Some(provider) = self.provider.as_deref().filter(|p| !p.trim().is_empty()) {
            return provider.to_string();
        }

        let principal = self.principal_name.to_lowercase();
        if principal.contains("google") {
            "Google".to_string()
        } else if principal.contains("facebook") {
            "Facebook".to_string()
        } else {
            "OAuth2 Provider".to_string()
        }
    }
}

#[async_trait]
pub trait IdentityProviderClient: Send + Sync {
    /// Base authorization request, or `None` when the request does not target
    /// this provider's registration id.
    fn resolve_base_authorization_request(
        &self,
        request: &HandshakeRequest,
    ) -> Option<AuthorizationRequestParameters>;

    async fn fetch_verified_identity(
        &self,
        callback: &CallbackParameters,
    ) -> Result<VerifiedIdentity, anyhow::Error>;
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

pub struct GoogleIdentityProvider {
    config: GoogleOAuthConfig,
    http: reqwest::Client,
}

impl GoogleIdentityProvider {
    pub const REGISTRATION_ID: &'static str = "google";

    pub fn new(config: GoogleOAuthConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

fn generate_code_verifier() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

#[async_trait]
impl IdentityProviderClient for GoogleIdentityProvider {
    fn resolve_base_authorization_request(
        &self,
        request: &HandshakeRequest,
    ) -> Option<AuthorizationRequestParameters> {
        if request.registration_id != Self::REGISTRATION_ID {
            return None;
        }

        let state = uuid::Uuid::new_v4().to_string();
        let code_verifier = generate_code_verifier();

        let authorization_uri = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email%20profile&state={}&code_challenge={}&code_challenge_method=S256",
            self.config.authorization_uri,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            state,
            code_challenge(&code_verifier),
        );

        Some(AuthorizationRequestParameters {
            authorization_uri,
            state,
            code_verifier,
        })
    }

    async fn fetch_verified_identity(
        &self,
        callback: &CallbackParameters,
    ) -> Result<VerifiedIdentity, anyhow::Error> {
        let token_res = self
            .http
            .post(&self.config.token_uri)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret().as_str()),
                ("code", callback.code.as_str()),
                ("code_verifier", callback.code_verifier.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to exchange Google code: {}", e))?;

        if !token_res.status().is_success() {
            let status = token_res.status();
            let body = token_res.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google token exchange error");
            return Err(anyhow::anyhow!("Google token exchange failed with {}", status));
        }

        let token: GoogleTokenResponse = token_res
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse Google token response: {}", e))?;

        let user_info: GoogleUserInfo = self
            .http
            .get(&self.config.userinfo_uri)
            .bearer_auth(token.access_token)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to fetch Google user info: {}", e))?
            .error_for_status()
            .map_err(|e| anyhow::anyhow!("Google user info request failed: {}", e))?
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse Google user info: {}", e))?;

        // An unverified address is treated as no address at all.
        let email = user_info.email.filter(|_| user_info.email_verified);
        if email.is_none() {
            tracing::warn!("Google account returned no verified email");
        }

        Ok(VerifiedIdentity {
            email,
            name: user_info.name,
            principal_name: user_info.sub,
            provider: Some("Google".to_string()),
        })
    }
}
