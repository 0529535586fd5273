use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use serde_json::Value;

use crate::errors::SessionError;
use crate::id::SessionId;
use crate::session::{Session, SessionHandle};

use super::types::{DestroyHook, MemoryProvider, MemorySession, Provider, SessionState};

impl MemoryProvider {
    pub fn new() -> Self {
        tracing::info!("Creating new in-memory session provider");
        Self {
            sessions: DashMap::new(),
            destroy_hook: None,
        }
    }

    /// Run `hook` for every session removed by `destroy` or GC.
    pub fn with_destroy_hook(mut self, hook: DestroyHook) -> Self {
        self.destroy_hook = Some(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn on_destroy(&self, id: &SessionId) {
        if let Some(hook) = &self.destroy_hook {
            hook(id);
        }
    }

    #[cfg(test)]
    pub(crate) fn set_last_accessed(&self, id: &SessionId, at: DateTime<Utc>) {
        if let Some(session) = self.sessions.get(id) {
            session.state.lock().last_accessed = at;
        }
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    fn new(id: SessionId) -> Self {
        Self {
            id,
            state: Mutex::new(SessionState {
                data: HashMap::new(),
                last_accessed: Utc::now(),
            }),
        }
    }

    fn touch(&self) {
        self.state.lock().last_accessed = Utc::now();
    }

    fn last_accessed(&self) -> DateTime<Utc> {
        self.state.lock().last_accessed
    }
}

#[async_trait]
impl Session for MemorySession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, SessionError> {
        let mut state = self.state.lock();
        state.last_accessed = Utc::now();
        Ok(state.data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.last_accessed = Utc::now();
        state.data.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        let mut state = self.state.lock();
        state.last_accessed = Utc::now();
        state.data.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, SessionError> {
        let mut state = self.state.lock();
        state.last_accessed = Utc::now();
        Ok(state.data.keys().cloned().collect())
    }
}

#[async_trait]
impl Provider for MemoryProvider {
    async fn init(&self, id: &SessionId) -> Result<SessionHandle, SessionError> {
        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => {
                tracing::warn!("Session id collision on init: {}..", id.short());
                Err(SessionError::DuplicateSession)
            }
            Entry::Vacant(entry) => {
                let session = Arc::new(MemorySession::new(id.clone()));
                entry.insert(Arc::clone(&session));
                tracing::debug!("Created session {}..", id.short());
                Ok(session)
            }
        }
    }

    async fn read(&self, id: &SessionId) -> Result<SessionHandle, SessionError> {
        // Touch under the shard read lock so a concurrent GC sweep either
        // evicts before the read or sees the refreshed access time
        let entry = self.sessions.get(id).ok_or(SessionError::SessionNotFound)?;
        entry.touch();
        let session: Arc<MemorySession> = Arc::clone(entry.value());
        Ok(session)
    }

    async fn destroy(&self, id: &SessionId) -> Result<bool, SessionError> {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            tracing::debug!("Destroyed session {}..", id.short());
            self.on_destroy(id);
        }
        Ok(removed)
    }

    async fn garbage_collect(&self, max_lifetime: Duration) -> Result<usize, SessionError> {
        let max_lifetime = chrono::Duration::from_std(max_lifetime)
            .map_err(|e| SessionError::Config(format!("Invalid max lifetime: {e}")))?;
        let cutoff = Utc::now() - max_lifetime;

        // retain() write-locks one shard at a time
        let mut expired = Vec::new();
        self.sessions.retain(|id, session| {
            if session.last_accessed() < cutoff {
                expired.push(id.clone());
                false
            } else {
                true
            }
        });

        for id in &expired {
            self.on_destroy(id);
        }

        if !expired.is_empty() {
            tracing::info!(
                "Evicted {} expired sessions, {} remaining",
                expired.len(),
                self.sessions.len()
            );
        }
        Ok(expired.len())
    }
}
