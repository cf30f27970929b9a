//! Shared setup for the HTTP integration tests.
//!
//! Spawns the real router on an ephemeral port over the in-process stores, with
//! a scripted identity provider standing in for Google.

#![allow(dead_code)]

use async_trait::async_trait;
use branch_auth_service::{
    build_router,
    config::{
        AuthConfig, BootstrapConfig, DatabaseConfig, Environment, GoogleOAuthConfig, JwtConfig,
        LoginConfig, RedisConfig, SecurityConfig,
    },
    services::{
        seed_defaults, AuthorizationRequestParameters, CallbackParameters, HandshakeRequest,
        IdentityProviderClient, InMemoryStore, JwtService, MemoryActivityLog, MemorySessionStore,
        VerifiedIdentity,
    },
    AppState, Collaborators,
};
use secrecy::Secret;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/jwt_private.pem");
pub const TEST_PUBLIC_KEY: &str = include_str!("../fixtures/jwt_public.pem");

pub const ADMIN_EMAIL: &str = "admin.hcm@fpt.edu.vn";
pub const FRONTEND_URL: &str = "http://localhost:3000/";
pub const PROVIDER_AUTHORIZE_URL: &str = "https://idp.test/authorize";

/// Identity provider whose exchange result is set by the test.
#[derive(Default)]
pub struct ScriptedProvider {
    identity: Mutex<Option<VerifiedIdentity>>,
}

impl ScriptedProvider {
    pub fn will_return(&self, identity: VerifiedIdentity) {
        *self.identity.lock().unwrap() = Some(identity);
    }
}

#[async_trait]
impl IdentityProviderClient for ScriptedProvider {
    fn resolve_base_authorization_request(
        &self,
        request: &HandshakeRequest,
    ) -> Option<AuthorizationRequestParameters> {
        if request.registration_id != "google" {
            return None;
        }
        let state = uuid::Uuid::new_v4().to_string();
        Some(AuthorizationRequestParameters {
            authorization_uri: format!("{}?state={}", PROVIDER_AUTHORIZE_URL, state),
            state,
            code_verifier: "verifier".to_string(),
        })
    }

    async fn fetch_verified_identity(
        &self,
        callback: &CallbackParameters,
    ) -> Result<VerifiedIdentity, anyhow::Error> {
        if callback.code_verifier != "verifier" {
            anyhow::bail!("code verifier mismatch");
        }
        self.identity
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("invalid_grant"))
    }
}

pub struct TestApp {
    pub address: String,
    pub state: AppState,
    pub provider: Arc<ScriptedProvider>,
    pub activity: Arc<MemoryActivityLog>,
}

impl TestApp {
    /// Spawn the service with default roles, the demo branches and an
    /// administrator holding ADMIN.
    pub async fn spawn() -> Self {
        let config = create_test_config();
        let store = Arc::new(InMemoryStore::new());
        let provider = Arc::new(ScriptedProvider::default());
        let activity = Arc::new(MemoryActivityLog::new());

        let jwt = JwtService::from_pem(
            TEST_PRIVATE_KEY.as_bytes(),
            TEST_PUBLIC_KEY.as_bytes(),
            config.jwt.access_token_expiry_minutes,
            config.jwt.refresh_token_expiry_days,
        )
        .expect("Failed to create JWT service");

        let state = AppState::new(
            config.clone(),
            jwt,
            Collaborators {
                branch_store: store.clone(),
                role_store: store.clone(),
                sessions: Arc::new(MemorySessionStore::new()),
                identity_provider: provider.clone(),
                activity: activity.clone(),
                database: None,
            },
        );

        seed_defaults(store, &state.permissions, &state.branches, &config.bootstrap)
            .await
            .expect("Failed to seed defaults");

        let app = build_router(state.clone())
            .await
            .expect("Failed to build router");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let _ = service_core::axum::serve(listener, app).await;
        });

        TestApp {
            address: format!("http://{}", SocketAddr::from(([127, 0, 0, 1], port))),
            state,
            provider,
            activity,
        }
    }

    /// HTTP client that does not follow redirects.
    pub fn client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build HTTP client")
    }

    pub fn token_for(&self, email: &str, branch_code: &str) -> String {
        self.state
            .jwt
            .generate_access_token(email, None, branch_code)
            .expect("Failed to mint access token")
    }

    pub fn admin_token(&self) -> String {
        self.token_for(ADMIN_EMAIL, "HCM")
    }

    pub async fn branch_id(&self, code: &str) -> uuid::Uuid {
        self.state
            .branches
            .get_branch_by_code(code)
            .await
            .expect("Branch not seeded")
            .branch_id
    }
}

pub fn create_test_config() -> AuthConfig {
    AuthConfig {
        common: service_core::config::Config { port: 0 },
        environment: Environment::Dev,
        service_name: "branch-auth-service-test".to_string(),
        service_version: "0.1.0".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: None,
            max_connections: 5,
            min_connections: 1,
        },
        redis: RedisConfig { url: None },
        jwt: JwtConfig {
            private_key_path: String::new(),
            public_key_path: String::new(),
            access_token_expiry_minutes: 15,
            refresh_token_expiry_days: 7,
        },
        google: GoogleOAuthConfig {
            client_id: "test-client-id".to_string(),
            client_secret: Secret::new("test-client-secret".to_string()),
            redirect_uri: "http://localhost/login/oauth2/code/google".to_string(),
            authorization_uri: PROVIDER_AUTHORIZE_URL.to_string(),
            token_uri: "https://idp.test/token".to_string(),
            userinfo_uri: "https://idp.test/userinfo".to_string(),
        },
        login: LoginConfig {
            frontend_url: FRONTEND_URL.to_string(),
            session_ttl_seconds: 600,
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
            secure_cookies: false,
        },
        bootstrap: BootstrapConfig {
            seed_default_data: true,
            seed_demo_branches: true,
            admin_email: Some(ADMIN_EMAIL.to_string()),
        },
    }
}

/// Value of the `login_session` cookie set by a response, if any.
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all(reqwest::header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| v.strip_prefix("login_session="))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
        .filter(|v| !v.is_empty())
}

/// Query parameter value from a redirect `Location`.
pub fn location_param(response: &reqwest::Response, name: &str) -> Option<String> {
    let location = response
        .headers()
        .get(reqwest::header::LOCATION)?
        .to_str()
        .ok()?;
    let query = location.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == name {
            urlencoding::decode(value).ok().map(|v| v.into_owned())
        } else {
            None
        }
    })
}
