use secrecy::Secret;
use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub google: GoogleOAuthConfig,
    pub login: LoginConfig,
    pub security: SecurityConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

/// `url` absent means the in-process store (dev only).
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub min_connections: u32,
}

/// `url` absent means the in-process session store (dev only).
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub private_key_path: String,
    pub public_key_path: String,
    pub access_token_expiry_minutes: i64,
    pub refresh_token_expiry_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    pub authorization_uri: String,
    pub token_uri: String,
    pub userinfo_uri: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    /// Redirect base of the front-end, always ending in `/`.
    pub frontend_url: String,
    pub session_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
    pub secure_cookies: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    pub seed_default_data: bool,
    pub seed_demo_branches: bool,
    pub admin_email: Option<String>,
}

/// Upper bound for `LOGIN_SESSION_TTL_SECONDS`.
pub const MAX_SESSION_TTL_SECONDS: u64 = 86_400;

impl AuthConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("branch-auth-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: get_optional_env("OTEL_EXPORTER_OTLP_ENDPOINT"),
            database: DatabaseConfig {
                url: get_required_in_prod("DATABASE_URL", is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10", is_prod)?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1", is_prod)?,
            },
            redis: RedisConfig {
                url: get_required_in_prod("REDIS_URL", is_prod)?,
            },
            jwt: JwtConfig {
                private_key_path: get_env("JWT_PRIVATE_KEY_PATH", None, is_prod)?,
                public_key_path: get_env("JWT_PUBLIC_KEY_PATH", None, is_prod)?,
                access_token_expiry_minutes: parse_env(
                    "JWT_ACCESS_TOKEN_EXPIRY_MINUTES",
                    "15",
                    is_prod,
                )?,
                refresh_token_expiry_days: parse_env("JWT_REFRESH_TOKEN_EXPIRY_DAYS", "7", is_prod)?,
            },
            google: GoogleOAuthConfig {
                client_id: get_env("GOOGLE_CLIENT_ID", None, is_prod)?,
                client_secret: Secret::new(get_env("GOOGLE_CLIENT_SECRET", None, is_prod)?),
                redirect_uri: get_env("GOOGLE_REDIRECT_URI", None, is_prod)?,
                authorization_uri: get_env(
                    "GOOGLE_AUTHORIZATION_URI",
                    Some("https://accounts.google.com/o/oauth2/v2/auth"),
                    is_prod,
                )?,
                token_uri: get_env(
                    "GOOGLE_TOKEN_URI",
                    Some("https://oauth2.googleapis.com/token"),
                    is_prod,
                )?,
                userinfo_uri: get_env(
                    "GOOGLE_USERINFO_URI",
                    Some("https://openidconnect.googleapis.com/v1/userinfo"),
                    is_prod,
                )?,
            },
            login: LoginConfig {
                frontend_url: with_trailing_slash(get_env(
                    "FRONTEND_URL",
                    Some("http://localhost:3000/"),
                    is_prod,
                )?),
                session_ttl_seconds: parse_env("LOGIN_SESSION_TTL_SECONDS", "600", is_prod)?,
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
                secure_cookies: parse_env("SECURE_COOKIES", if is_prod { "true" } else { "false" }, is_prod)?,
            },
            bootstrap: BootstrapConfig {
                seed_default_data: parse_env("SEED_DEFAULT_DATA", "true", is_prod)?,
                seed_demo_branches: parse_env("SEED_DEMO_BRANCHES", "false", is_prod)?,
                admin_email: get_optional_env("BOOTSTRAP_ADMIN_EMAIL"),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.jwt.access_token_expiry_minutes <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_ACCESS_TOKEN_EXPIRY_MINUTES must be positive"
            )));
        }

        if self.jwt.refresh_token_expiry_days <= 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "JWT_REFRESH_TOKEN_EXPIRY_DAYS must be positive"
            )));
        }

        if self.login.session_ttl_seconds == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "LOGIN_SESSION_TTL_SECONDS must be positive"
            )));
        }

        if self.login.session_ttl_seconds > MAX_SESSION_TTL_SECONDS {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "LOGIN_SESSION_TTL_SECONDS must not exceed {}",
                MAX_SESSION_TTL_SECONDS
            )));
        }

        if self.environment == Environment::Prod {
            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }

            // Both handshake legs must see the same session store.
            if self.redis.url.is_none() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "REDIS_URL is required in production"
                )));
            }

            if !self.security.secure_cookies {
                tracing::warn!("Session cookies are not marked Secure in production");
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn get_required_in_prod(key: &str, is_prod: bool) -> Result<Option<String>, AppError> {
    if is_prod {
        get_env(key, None, true).map(Some)
    } else {
        Ok(get_optional_env(key))
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .trim()
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("Invalid {}: {}", key, e)))
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
