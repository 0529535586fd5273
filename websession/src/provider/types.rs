use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::errors::SessionError;
use crate::id::SessionId;
use crate::session::SessionHandle;

/// Storage backend contract every session provider implements.
#[async_trait]
pub trait Provider: Send + Sync + 'static {
    /// Create an empty session under `id`.
    ///
    /// Fails with [`SessionError::DuplicateSession`] if `id` is taken.
    async fn init(&self, id: &SessionId) -> Result<SessionHandle, SessionError>;

    /// Resume the session stored under `id`, refreshing its last access time.
    ///
    /// Fails with [`SessionError::SessionNotFound`] if there is none.
    async fn read(&self, id: &SessionId) -> Result<SessionHandle, SessionError>;

    /// Remove the session stored under `id`.
    ///
    /// Idempotent: returns `Ok(false)` when nothing was stored.
    async fn destroy(&self, id: &SessionId) -> Result<bool, SessionError>;

    /// Evict every session idle for longer than `max_lifetime`.
    ///
    /// Returns how many sessions were removed.
    async fn garbage_collect(&self, max_lifetime: Duration) -> Result<usize, SessionError>;
}

/// Called with the id of every session a provider removes.
pub type DestroyHook = Arc<dyn Fn(&SessionId) + Send + Sync>;

/// Reference backend keeping sessions in process memory.
pub struct MemoryProvider {
    pub(super) sessions: DashMap<SessionId, Arc<MemorySession>>,
    pub(super) destroy_hook: Option<DestroyHook>,
}

pub(crate) struct MemorySession {
    pub(super) id: SessionId,
    pub(super) state: Mutex<SessionState>,
}

pub(super) struct SessionState {
    pub(super) data: HashMap<String, Value>,
    pub(super) last_accessed: DateTime<Utc>,
}

/// Backend storing each session as a Redis hash with a TTL.
pub struct RedisProvider {
    pub(super) client: redis::Client,
    pub(super) ttl_secs: u64,
}

pub(crate) struct RedisSession {
    pub(super) id: SessionId,
    pub(super) key: String,
    pub(super) client: redis::Client,
    pub(super) ttl_secs: u64,
}
