//! Name to provider mapping, filled during startup and frozen afterwards

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::{SESSION_MAX_LIFETIME, SESSION_REDIS_URL};
use crate::errors::SessionError;

use super::types::{MemoryProvider, Provider, RedisProvider};

pub const MEMORY_PROVIDER: &str = "memory";
pub const REDIS_PROVIDER: &str = "redis";

/// Collects providers before the registry is frozen with [`build`](Self::build).
#[derive(Default)]
pub struct ProviderRegistryBuilder {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl ProviderRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `provider` under `name`.
    ///
    /// An empty name or a name that is already taken is a configuration
    /// error; callers are expected to abort startup on it.
    pub fn register(
        &mut self,
        name: &str,
        provider: Arc<dyn Provider>,
    ) -> Result<&mut Self, SessionError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::InvalidRegistration(
                "provider name must not be empty".to_string(),
            ));
        }
        if self.providers.contains_key(name) {
            tracing::error!("Provider registered twice: {}", name);
            return Err(SessionError::RegistrationConflict(name.to_string()));
        }

        tracing::info!("Registered session provider: {}", name);
        self.providers.insert(name.to_string(), provider);
        Ok(self)
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            providers: Arc::new(self.providers),
        }
    }
}

/// Immutable set of registered providers. Cloning is cheap and lookups take
/// no lock.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Arc<HashMap<String, Arc<dyn Provider>>>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::new()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

/// Registry with the in-memory provider, plus the Redis provider when
/// `SESSION_REDIS_URL` is set.
pub async fn default_registry() -> Result<ProviderRegistry, SessionError> {
    let mut builder = ProviderRegistry::builder();
    builder.register(MEMORY_PROVIDER, Arc::new(MemoryProvider::new()))?;

    if let Some(url) = SESSION_REDIS_URL.as_deref() {
        let provider = RedisProvider::connect(url, *SESSION_MAX_LIFETIME).await?;
        builder.register(REDIS_PROVIDER, Arc::new(provider))?;
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        // Given a registry with the memory provider
        let mut builder = ProviderRegistry::builder();
        builder
            .register("memory", Arc::new(MemoryProvider::new()))
            .unwrap();
        let registry = builder.build();

        // Then it resolves by name
        assert!(registry.lookup("memory").is_some());
        assert!(registry.lookup("redis").is_none());
        assert_eq!(registry.names(), vec!["memory"]);
    }

    #[test]
    fn test_register_twice_conflicts() {
        let mut builder = ProviderRegistry::builder();
        builder
            .register("memory", Arc::new(MemoryProvider::new()))
            .unwrap();

        let result = builder.register("memory", Arc::new(MemoryProvider::new()));

        match result {
            Err(SessionError::RegistrationConflict(name)) => assert_eq!(name, "memory"),
            Err(other) => panic!("Expected RegistrationConflict, got {other:?}"),
            Ok(_) => panic!("Expected RegistrationConflict, got Ok"),
        }
    }

    #[test]
    fn test_register_empty_name() {
        let mut builder = ProviderRegistry::builder();

        let result = builder.register("  ", Arc::new(MemoryProvider::new()));

        assert!(matches!(result, Err(SessionError::InvalidRegistration(_))));
    }

    #[test]
    fn test_register_is_chainable() {
        let mut builder = ProviderRegistry::builder();
        builder
            .register("a", Arc::new(MemoryProvider::new()))
            .and_then(|b| b.register("b", Arc::new(MemoryProvider::new())))
            .unwrap();

        assert_eq!(builder.build().names(), vec!["a", "b"]);
    }

    #[test]
    fn test_clones_share_providers() {
        let mut builder = ProviderRegistry::builder();
        builder
            .register("memory", Arc::new(MemoryProvider::new()))
            .unwrap();
        let registry = builder.build();
        let clone = registry.clone();

        let a = registry.lookup("memory").unwrap();
        let b = clone.lookup("memory").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_default_registry_has_memory() {
        let registry = default_registry().await;
        // Without SESSION_REDIS_URL only the memory backend exists
        if SESSION_REDIS_URL.is_none() {
            let registry = registry.unwrap();
            assert!(registry.lookup(MEMORY_PROVIDER).is_some());
        }
    }
}
