//! websession - cookie based session management with pluggable storage
//!
//! A [`Manager`] maps the session cookie of each request to a [`Session`]
//! held by a [`Provider`]. Providers are registered by name in a
//! [`ProviderRegistry`] at startup; the crate ships an in-memory provider and
//! a Redis provider. Expired sessions are reclaimed by a background task
//! started with [`Manager::spawn_gc`].
//!
//! The manager only reads and writes `http::HeaderMap`s, so it works with any
//! HTTP server built on the `http` crate.

mod config;
mod errors;
mod id;
mod manager;
mod provider;
mod session;
mod utils;

pub use config::{
    ManagerConfig, SESSION_COOKIE_NAME, SESSION_GC_INTERVAL, SESSION_MAX_LIFETIME,
    SESSION_PROVIDER, SESSION_REDIS_URL,
};
pub use errors::SessionError;
pub use id::{IdGenerator, RandomIdGenerator, SESSION_ID_BYTES, SessionId};
pub use manager::{DestroyOutcome, GcHandle, MAX_ID_ATTEMPTS, Manager};
pub use provider::{
    DestroyHook, MEMORY_PROVIDER, MemoryProvider, Provider, ProviderRegistry,
    ProviderRegistryBuilder, REDIS_PROVIDER, RedisProvider, default_registry,
};
pub use session::{Session, SessionHandle};

/// Build the default registry and a manager configured from the environment.
pub async fn init() -> Result<Manager, SessionError> {
    let registry = default_registry().await?;
    Manager::new(&registry, ManagerConfig::from_env())
}
