use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::SessionError;
use crate::id::SessionId;

/// Per-client key/value bag owned by a [`Provider`](crate::Provider).
///
/// Every call refreshes the session's last access time. Calls on one
/// session are linearizable; calls on different sessions never contend.
#[async_trait]
pub trait Session: Send + Sync {
    fn id(&self) -> &SessionId;

    async fn get(&self, key: &str) -> Result<Option<Value>, SessionError>;

    /// Insert or overwrite `key`.
    async fn set(&self, key: &str, value: Value) -> Result<(), SessionError>;

    /// Remove `key`. Absent keys are not an error.
    async fn delete(&self, key: &str) -> Result<(), SessionError>;

    /// Keys currently stored, in no particular order.
    async fn keys(&self) -> Result<Vec<String>, SessionError>;
}

/// Shared handle to a live session.
pub type SessionHandle = Arc<dyn Session>;
