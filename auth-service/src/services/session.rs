//! Session-scoped key-value state carried across the login redirect.

use async_trait::async_trait;
use dashmap::DashMap;
use redis::{aio::ConnectionManager, Client};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Writes between two expiry sweeps of the in-process store.
const SWEEP_EVERY_WRITES: u64 = 64;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, anyhow::Error>;
    async fn set(
        &self,
        session_id: &str,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), anyhow::Error>;
    async fn remove(&self, session_id: &str, key: &str) -> Result<(), anyhow::Error>;
    async fn health_check(&self) -> Result<(), anyhow::Error>;
}

fn session_key(session_id: &str, key: &str) -> String {
    format!("login_session:{}:{}", session_id, key)
}

/// Shared store for horizontally scaled deployments.
#[derive(Clone)]
pub struct RedisSessionStore {
    manager: ConnectionManager,
}

impl RedisSessionStore {
    pub async fn new(url: &str) -> Result<Self, anyhow::Error> {
        tracing::info!("Connecting to Redis session store");
        let client = Client::open(url)?;

        let manager = client.get_connection_manager().await.map_err(|e| {
            tracing::error!("Failed to get Redis connection manager: {}", e);
            anyhow::anyhow!("Failed to connect to Redis: {}", e)
        })?;

        tracing::info!("Successfully connected to Redis");
        Ok(Self { manager })
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("GET")
            .arg(session_key(session_id, key))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read session value: {}", e))
    }

    async fn set(
        &self,
        session_id: &str,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("SET")
            .arg(session_key(session_id, key))
            .arg(value)
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write session value: {}", e))
    }

    async fn remove(&self, session_id: &str, key: &str) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(session_key(session_id, key))
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to remove session value: {}", e))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        let mut conn = self.manager.clone();
        redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| anyhow::anyhow!("Redis health check failed: {}", e))
    }
}

/// In-process store. Only correct for a single instance.
///
/// Expired entries are dropped on read and by a sweep every
/// `SWEEP_EVERY_WRITES` writes, so abandoned logins do not accumulate.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: DashMap<String, (String, Instant)>,
    writes: AtomicU64,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.entries.len();
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            tracing::debug!(removed, "Purged expired login session entries");
        }
        removed
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str, key: &str) -> Result<Option<String>, anyhow::Error> {
        let key = session_key(session_id, key);
        let value = match self.entries.get(&key) {
            Some(entry) if entry.1 > Instant::now() => Some(entry.0.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if value.is_none() {
            self.entries.remove(&key);
        }
        Ok(value)
    }

    async fn set(
        &self,
        session_id: &str,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<(), anyhow::Error> {
        let expires_at = Instant::now()
            .checked_add(Duration::from_secs(ttl_seconds))
            .ok_or_else(|| anyhow::anyhow!("Session TTL out of range: {}s", ttl_seconds))?;

        let written = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        if written % SWEEP_EVERY_WRITES == 0 {
            self.purge_expired();
        }

        self.entries
            .insert(session_key(session_id, key), (value.to_string(), expires_at));
        Ok(())
    }

    async fn remove(&self, session_id: &str, key: &str) -> Result<(), anyhow::Error> {
        self.entries.remove(&session_key(session_id, key));
        Ok(())
    }

    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }
}
