use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use http::HeaderMap;
use tokio::sync::Mutex;

use crate::config::ManagerConfig;
use crate::errors::SessionError;
use crate::id::{IdGenerator, RandomIdGenerator, SessionId};
use crate::provider::{Provider, ProviderRegistry};
use crate::session::SessionHandle;

use super::cookie::{
    decode_cookie_value, encode_cookie_value, get_cookie_value, header_expire_cookie,
    header_set_cookie,
};

/// How many freshly generated ids `start` tries before giving up on
/// collisions.
pub const MAX_ID_ATTEMPTS: usize = 3;

/// Result of a successful [`Manager::destroy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestroyOutcome {
    /// The session existed and was removed
    Destroyed,
    /// Nothing was stored under the cookie's id (expired, or destroyed by a
    /// concurrent request)
    AlreadyGone,
}

/// Ties the session cookie of each request to a session held by the active
/// provider.
///
/// `start` and `destroy` run under one mutex so that two concurrent first
/// requests from the same client cannot both mint a session. GC runs outside
/// of it.
pub struct Manager {
    cookie_name: String,
    provider: Arc<dyn Provider>,
    max_lifetime: Duration,
    pub(super) gc_interval: Duration,
    id_generator: Arc<dyn IdGenerator>,
    lock: Mutex<()>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("cookie_name", &self.cookie_name)
            .field("max_lifetime", &self.max_lifetime)
            .field("gc_interval", &self.gc_interval)
            .finish_non_exhaustive()
    }
}

impl Manager {
    /// Build a manager over the provider registered as `config.provider_name`.
    pub fn new(registry: &ProviderRegistry, config: ManagerConfig) -> Result<Self, SessionError> {
        let provider = registry.lookup(&config.provider_name).ok_or_else(|| {
            tracing::error!(
                "Session provider '{}' is not registered (available: {:?})",
                config.provider_name,
                registry.names()
            );
            SessionError::UnknownProvider(config.provider_name.clone())
        })?;

        if config.cookie_name.trim().is_empty() {
            return Err(SessionError::Config(
                "cookie name must not be empty".to_string(),
            ));
        }
        if config.max_lifetime.is_zero() {
            return Err(SessionError::Config(
                "max lifetime must be positive".to_string(),
            ));
        }
        if config.gc_interval.is_zero() {
            return Err(SessionError::Config(
                "gc interval must be positive".to_string(),
            ));
        }

        tracing::info!(
            "Session manager using provider '{}', cookie '{}', max lifetime {}s",
            config.provider_name,
            config.cookie_name,
            config.max_lifetime.as_secs()
        );

        Ok(Self {
            cookie_name: config.cookie_name,
            provider,
            max_lifetime: config.max_lifetime,
            gc_interval: config.gc_interval,
            id_generator: Arc::new(RandomIdGenerator),
            lock: Mutex::new(()),
        })
    }

    /// Replace the id source, e.g. with a deterministic one in tests.
    pub fn with_id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = id_generator;
        self
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn max_lifetime(&self) -> Duration {
        self.max_lifetime
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    /// Resume the session named by the request cookie, or start a new one.
    ///
    /// A missing, empty, malformed or stale cookie yields a new session and
    /// a `Set-Cookie` header on `response`. A resumed session has its cookie
    /// refreshed so the client side expiry slides along with the server's.
    /// Only provider failures are returned as errors.
    #[tracing::instrument(skip_all, fields(cookie = %self.cookie_name))]
    pub async fn start(
        &self,
        request: &HeaderMap,
        response: &mut HeaderMap,
    ) -> Result<SessionHandle, SessionError> {
        let _guard = self.lock.lock().await;

        if let Some(session) = self.resume(request).await? {
            header_set_cookie(
                response,
                &self.cookie_name,
                &encode_cookie_value(session.id()),
                self.max_lifetime.as_secs(),
            )?;
            tracing::debug!("Resumed session {}..", session.id().short());
            return Ok(session);
        }

        self.create(response).await
    }

    async fn resume(&self, request: &HeaderMap) -> Result<Option<SessionHandle>, SessionError> {
        let Some(raw) = get_cookie_value(request, &self.cookie_name) else {
            return Ok(None);
        };
        if raw.is_empty() {
            tracing::debug!("Session cookie is empty");
            return Ok(None);
        }

        let id = match decode_cookie_value(&raw) {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("Ignoring session cookie: {}", e);
                return Ok(None);
            }
        };

        match self.provider.read(&id).await {
            Ok(session) => Ok(Some(session)),
            Err(SessionError::SessionNotFound) => {
                tracing::debug!("Session {}.. not found, starting fresh", id.short());
                Ok(None)
            }
            Err(e) => {
                tracing::error!("Failed to read session: {}", e);
                Err(e)
            }
        }
    }

    async fn create(&self, response: &mut HeaderMap) -> Result<SessionHandle, SessionError> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = self.next_id()?;
            match self.provider.init(&id).await {
                Ok(session) => {
                    header_set_cookie(
                        response,
                        &self.cookie_name,
                        &encode_cookie_value(&id),
                        self.max_lifetime.as_secs(),
                    )?;
                    tracing::debug!("Started session {}..", id.short());
                    return Ok(session);
                }
                Err(SessionError::DuplicateSession) => {
                    tracing::warn!(
                        "Generated session id collided (attempt {}/{})",
                        attempt,
                        MAX_ID_ATTEMPTS
                    );
                }
                Err(e) => {
                    tracing::error!("Failed to init session: {}", e);
                    return Err(e);
                }
            }
        }

        Err(SessionError::Provider(format!(
            "no unique session id after {MAX_ID_ATTEMPTS} attempts"
        )))
    }

    fn next_id(&self) -> Result<SessionId, SessionError> {
        let id = self.id_generator.new_id()?;
        if id.as_str().is_empty() {
            return Err(SessionError::Crypto(
                "id generator returned an empty id".to_string(),
            ));
        }
        Ok(id)
    }

    /// Destroy the session named by the request cookie and tell the client
    /// to drop the cookie.
    ///
    /// Fails with `MissingCookie`/`EmptyCookie` when there is nothing to
    /// destroy and with `InvalidCookie` on malformed escaping. Destroying an
    /// already removed session succeeds with [`DestroyOutcome::AlreadyGone`].
    #[tracing::instrument(skip_all, fields(cookie = %self.cookie_name))]
    pub async fn destroy(
        &self,
        request: &HeaderMap,
        response: &mut HeaderMap,
    ) -> Result<DestroyOutcome, SessionError> {
        let raw = get_cookie_value(request, &self.cookie_name).ok_or(SessionError::MissingCookie)?;
        if raw.is_empty() {
            return Err(SessionError::EmptyCookie);
        }
        let id = decode_cookie_value(&raw)?;

        let _guard = self.lock.lock().await;

        let removed = self.provider.destroy(&id).await?;
        header_expire_cookie(response, &self.cookie_name, Utc::now())?;

        if removed {
            tracing::debug!("Destroyed session {}..", id.short());
            Ok(DestroyOutcome::Destroyed)
        } else {
            tracing::debug!("Session {}.. was already gone", id.short());
            Ok(DestroyOutcome::AlreadyGone)
        }
    }

    /// Run a single sweep and return the number of evicted sessions.
    pub async fn run_gc_once(&self) -> Result<usize, SessionError> {
        let evicted = self.provider.garbage_collect(self.max_lifetime).await?;
        tracing::debug!("Session GC sweep evicted {} sessions", evicted);
        Ok(evicted)
    }
}
