mod memory;
mod redis;
mod registry;
mod types;

pub use registry::{
    MEMORY_PROVIDER, ProviderRegistry, ProviderRegistryBuilder, REDIS_PROVIDER, default_registry,
};
pub use types::{DestroyHook, MemoryProvider, Provider, RedisProvider};
