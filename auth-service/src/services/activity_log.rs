//! Activity-log sink for login attempts and administrative actions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Mutex;

/// Activity event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityKind {
    LoginAttempt,
    AdminAction,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::LoginAttempt => "LOGIN_ATTEMPT",
            ActivityKind::AdminAction => "ADMIN_ACTION",
        }
    }
}

/// Fire-and-forget from the caller's side: callers log and ignore errors.
#[async_trait]
pub trait ActivityLogSink: Send + Sync {
    async fn record(
        &self,
        actor: Option<&str>,
        kind: ActivityKind,
        detail: &str,
    ) -> Result<(), anyhow::Error>;
}

/// Writes each event as a structured tracing event under the `activity` target.
#[derive(Debug, Default, Clone)]
pub struct TracingActivityLog;

#[async_trait]
impl ActivityLogSink for TracingActivityLog {
    async fn record(
        &self,
        actor: Option<&str>,
        kind: ActivityKind,
        detail: &str,
    ) -> Result<(), anyhow::Error> {
        tracing::info!(
            target: "activity",
            kind = kind.as_str(),
            actor = actor.unwrap_or("anonymous"),
            detail = %detail,
            "Activity recorded"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEvent {
    pub actor: Option<String>,
    pub kind: ActivityKind,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

/// Keeps events in memory.
#[derive(Default)]
pub struct MemoryActivityLog {
    events: Mutex<Vec<ActivityEvent>>,
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ActivityEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActivityLogSink for MemoryActivityLog {
    async fn record(
        &self,
        actor: Option<&str>,
        kind: ActivityKind,
        detail: &str,
    ) -> Result<(), anyhow::Error> {
        self.events
            .lock()
            .map_err(|e| anyhow::anyhow!("Activity log mutex poisoned: {}", e))?
            .push(ActivityEvent {
                actor: actor.map(str::to_string),
                kind,
                detail: detail.to_string(),
                created_at: Utc::now(),
            });
        Ok(())
    }
}
