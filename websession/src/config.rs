//! Environment driven defaults for the session manager

use std::env;
use std::sync::LazyLock;
use std::time::Duration;

pub static SESSION_COOKIE_NAME: LazyLock<String> = LazyLock::new(|| {
    env::var("SESSION_COOKIE_NAME")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string())
});

/// Maximum idle lifetime of a session in seconds
pub static SESSION_MAX_LIFETIME: LazyLock<u64> =
    LazyLock::new(|| parse_seconds(env::var("SESSION_MAX_LIFETIME").ok().as_deref()));

pub static SESSION_PROVIDER: LazyLock<String> = LazyLock::new(|| {
    env::var("SESSION_PROVIDER")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_PROVIDER.to_string())
});

/// Seconds between two GC sweeps. Falls back to the max lifetime when unset.
pub static SESSION_GC_INTERVAL: LazyLock<Option<u64>> = LazyLock::new(|| {
    env::var("SESSION_GC_INTERVAL")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&secs: &u64| secs > 0)
});

pub static SESSION_REDIS_URL: LazyLock<Option<String>> =
    LazyLock::new(|| env::var("SESSION_REDIS_URL").ok().filter(|s| !s.is_empty()));

pub(crate) const DEFAULT_COOKIE_NAME: &str = "sessionid";
pub(crate) const DEFAULT_MAX_LIFETIME: u64 = 3600;
pub(crate) const DEFAULT_PROVIDER: &str = "memory";

fn parse_seconds(value: Option<&str>) -> u64 {
    value
        .and_then(|s| s.parse().ok())
        .filter(|&secs: &u64| secs > 0)
        .unwrap_or(DEFAULT_MAX_LIFETIME)
}

/// Settings a [`Manager`](crate::Manager) is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Name the provider was registered under
    pub provider_name: String,
    pub cookie_name: String,
    pub max_lifetime: Duration,
    pub gc_interval: Duration,
}

impl ManagerConfig {
    pub fn new(
        provider_name: impl Into<String>,
        cookie_name: impl Into<String>,
        max_lifetime_secs: u64,
    ) -> Self {
        let max_lifetime = Duration::from_secs(max_lifetime_secs);
        Self {
            provider_name: provider_name.into(),
            cookie_name: cookie_name.into(),
            max_lifetime,
            gc_interval: max_lifetime,
        }
    }

    pub fn with_gc_interval(mut self, interval: Duration) -> Self {
        self.gc_interval = interval;
        self
    }

    pub fn from_env() -> Self {
        let config = Self::new(
            SESSION_PROVIDER.as_str(),
            SESSION_COOKIE_NAME.as_str(),
            *SESSION_MAX_LIFETIME,
        );
        match *SESSION_GC_INTERVAL {
            Some(secs) => config.with_gc_interval(Duration::from_secs(secs)),
            None => config,
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
