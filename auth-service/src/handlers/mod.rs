//! HTTP handlers.

pub mod branch;
pub mod health;
pub mod oauth;
pub mod role;
pub mod session;

use crate::models::Principal;
use crate::services::ActivityKind;
use crate::AppState;

/// Records an administrative mutation. Sink failures are logged only.
pub(crate) async fn record_admin_action(state: &AppState, principal: &Principal, detail: &str) {
    if let Err(e) = state
        .activity
        .record(Some(&principal.subject), ActivityKind::AdminAction, detail)
        .await
    {
        tracing::warn!(error = %e, "Failed to record admin activity");
    }
}
