use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::{self, AsyncCommands, Script};
use serde_json::Value;

use crate::errors::SessionError;
use crate::id::SessionId;
use crate::session::{Session, SessionHandle};

use super::types::{Provider, RedisProvider, RedisSession};

const KEY_PREFIX: &str = "websession";
// Marks the hash as existing even when the session holds no data
const CREATED_FIELD: &str = "created_at";
const DATA_FIELD_PREFIX: &str = "v:";

// Every script refuses to act on a hash without the creation marker, so a
// destroyed or expired session is never recreated by a late write.
// KEYS[1] = session key, ARGV[1] = marker field, ARGV[2] = ttl
const TOUCH_SOURCE: &str = r"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 0 then return 0 end
redis.call('EXPIRE', KEYS[1], ARGV[2])
return 1
";

// ARGV[3] = field, ARGV[4] = encoded value
const SET_SOURCE: &str = r"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 0 then return 0 end
redis.call('HSET', KEYS[1], ARGV[3], ARGV[4])
redis.call('EXPIRE', KEYS[1], ARGV[2])
return 1
";

// ARGV[3] = field
const DELETE_SOURCE: &str = r"
if redis.call('HEXISTS', KEYS[1], ARGV[1]) == 0 then return 0 end
redis.call('HDEL', KEYS[1], ARGV[3])
redis.call('EXPIRE', KEYS[1], ARGV[2])
return 1
";

static TOUCH_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(TOUCH_SOURCE));
static SET_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(SET_SOURCE));
static DELETE_SCRIPT: LazyLock<Script> = LazyLock::new(|| Script::new(DELETE_SOURCE));

impl RedisProvider {
    /// Open a client for `url`. Sessions expire after `ttl_secs` of inactivity.
    pub fn new(url: &str, ttl_secs: u64) -> Result<Self, SessionError> {
        let client = redis::Client::open(url)?;
        Ok(Self { client, ttl_secs })
    }

    /// Like [`RedisProvider::new`], but verifies the server is reachable.
    pub async fn connect(url: &str, ttl_secs: u64) -> Result<Self, SessionError> {
        let provider = Self::new(url, ttl_secs)?;
        let _conn = provider.client.get_multiplexed_async_connection().await?;
        tracing::info!("Connected to redis session store");
        Ok(provider)
    }

    fn make_key(id: &SessionId) -> String {
        format!("{KEY_PREFIX}:session:{id}")
    }

    fn session(&self, id: &SessionId) -> SessionHandle {
        Arc::new(RedisSession {
            id: id.clone(),
            key: Self::make_key(id),
            client: self.client.clone(),
            ttl_secs: self.ttl_secs,
        })
    }
}

fn data_field(key: &str) -> String {
    format!("{DATA_FIELD_PREFIX}{key}")
}

fn ttl_arg(ttl_secs: u64) -> i64 {
    i64::try_from(ttl_secs).unwrap_or(i64::MAX)
}

fn found(applied: i64) -> Result<(), SessionError> {
    if applied == 1 {
        Ok(())
    } else {
        Err(SessionError::SessionNotFound)
    }
}

/// Push the expiry of `key` forward. A session that vanished in the
/// meantime (expired or destroyed) reports `SessionNotFound`.
async fn touch_key(
    conn: &mut redis::aio::MultiplexedConnection,
    key: &str,
    ttl_secs: u64,
) -> Result<(), SessionError> {
    let applied: i64 = TOUCH_SCRIPT
        .key(key)
        .arg(CREATED_FIELD)
        .arg(ttl_arg(ttl_secs))
        .invoke_async(conn)
        .await?;
    found(applied)
}

impl RedisSession {
    async fn touch(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
    ) -> Result<(), SessionError> {
        touch_key(conn, &self.key, self.ttl_secs).await
    }
}

#[async_trait]
impl Session for RedisSession {
    fn id(&self) -> &SessionId {
        &self.id
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        self.touch(&mut conn).await?;

        let value: Option<String> = conn.hget(&self.key, data_field(key)).await?;
        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), SessionError> {
        let value = serde_json::to_string(&value)?;
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let applied: i64 = SET_SCRIPT
            .key(&self.key)
            .arg(CREATED_FIELD)
            .arg(ttl_arg(self.ttl_secs))
            .arg(data_field(key))
            .arg(value)
            .invoke_async(&mut conn)
            .await?;
        found(applied)
    }

    async fn delete(&self, key: &str) -> Result<(), SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let applied: i64 = DELETE_SCRIPT
            .key(&self.key)
            .arg(CREATED_FIELD)
            .arg(ttl_arg(self.ttl_secs))
            .arg(data_field(key))
            .invoke_async(&mut conn)
            .await?;
        found(applied)
    }

    async fn keys(&self) -> Result<Vec<String>, SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        self.touch(&mut conn).await?;

        let fields: Vec<String> = conn.hkeys(&self.key).await?;
        Ok(fields
            .into_iter()
            .filter_map(|f| f.strip_prefix(DATA_FIELD_PREFIX).map(str::to_string))
            .collect())
    }
}

#[async_trait]
impl Provider for RedisProvider {
    async fn init(&self, id: &SessionId) -> Result<SessionHandle, SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let key = Self::make_key(id);

        // HSETNX makes creation atomic across processes sharing the server
        let created: bool = conn
            .hset_nx(&key, CREATED_FIELD, Utc::now().timestamp())
            .await?;
        if !created {
            tracing::warn!("Session id collision on init: {}..", id.short());
            return Err(SessionError::DuplicateSession);
        }

        let _: () = conn.expire(&key, ttl_arg(self.ttl_secs)).await?;
        tracing::debug!("Created session {}..", id.short());
        Ok(self.session(id))
    }

    async fn read(&self, id: &SessionId) -> Result<SessionHandle, SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        touch_key(&mut conn, &Self::make_key(id), self.ttl_secs).await?;
        Ok(self.session(id))
    }

    async fn destroy(&self, id: &SessionId) -> Result<bool, SessionError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let removed: i64 = conn.del(Self::make_key(id)).await?;
        Ok(removed > 0)
    }

    async fn garbage_collect(&self, _max_lifetime: Duration) -> Result<usize, SessionError> {
        // Key expiry already evicts idle sessions
        tracing::trace!("Redis session provider relies on key expiry, nothing to sweep");
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_key() {
        let key = RedisProvider::make_key(&SessionId::new("abc123"));
        assert_eq!(key, "websession:session:abc123");
    }

    #[test]
    fn test_data_field_never_collides_with_marker() {
        // A user key named like the marker still lands in its own field
        assert_eq!(data_field(CREATED_FIELD), "v:created_at");
        assert_ne!(data_field(CREATED_FIELD), CREATED_FIELD);
    }

    #[test]
    fn test_found_maps_script_result() {
        assert!(found(1).is_ok());
        assert!(matches!(found(0), Err(SessionError::SessionNotFound)));
    }

    #[test]
    fn test_write_scripts_require_creation_marker() {
        // A write on a missing hash must bail out before HSET/HDEL recreate it
        for source in [SET_SOURCE, DELETE_SOURCE, TOUCH_SOURCE] {
            let guard = source.find("HEXISTS").unwrap();
            let write = ["HSET", "HDEL", "EXPIRE"]
                .iter()
                .filter_map(|cmd| source.find(cmd))
                .min()
                .unwrap();
            assert!(guard < write);
        }
    }

    #[test]
    fn test_ttl_arg_saturates() {
        assert_eq!(ttl_arg(600), 600);
        assert_eq!(ttl_arg(u64::MAX), i64::MAX);
    }

    #[test]
    fn test_new_rejects_invalid_url() {
        let result = RedisProvider::new("not a url", 600);
        assert!(matches!(result, Err(SessionError::Provider(_))));
    }

    #[test]
    fn test_new_does_not_connect() {
        // Opening a client only parses the url
        let result = RedisProvider::new("redis://127.0.0.1:1", 600);
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_garbage_collect_is_noop() {
        let provider = RedisProvider::new("redis://127.0.0.1:1", 600).unwrap();
        let evicted = provider
            .garbage_collect(Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(evicted, 0);
    }
}
