pub mod auth;

pub use auth::{principal_from_headers, AuthenticatedPrincipal};
