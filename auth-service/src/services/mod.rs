//! Services layer: branch directory, email authorization, permission model,
//! the login handshake and the collaborators they consume.

pub mod activity_log;
pub mod authorization_gate;
pub mod bootstrap;
pub mod branch_directory;
mod database;
pub mod email_authorization;
pub mod error;
pub mod identity_provider;
pub mod jwt;
pub mod login;
mod memory;
pub mod permission_model;
pub mod session;
pub mod store;

pub use activity_log::{ActivityKind, ActivityLogSink, MemoryActivityLog, TracingActivityLog};
pub use authorization_gate::AuthorizationGate;
pub use bootstrap::{seed_defaults, SeedReport};
pub use branch_directory::{BranchDirectory, BranchUpdate};
pub use database::Database;
pub use email_authorization::EmailAuthorizationEngine;
pub use error::ServiceError;
pub use identity_provider::{
    AuthorizationRequestParameters, CallbackParameters, GoogleIdentityProvider, HandshakeRequest,
    IdentityProviderClient, VerifiedIdentity,
};
pub use jwt::{AccessTokenClaims, CredentialIssuer, JwtService, RefreshTokenClaims, TokenPair};
pub use login::{InboundRequest, OAuth2LoginOrchestrator, RedirectOutcome};
pub use memory::InMemoryStore;
pub use permission_model::PermissionModel;
pub use session::{MemorySessionStore, RedisSessionStore, SessionStore};
pub use store::{BranchRepository, RoleRepository};
