//! Session identifiers and how they are minted

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;
use crate::utils::gen_random_string;

/// Number of random bytes behind every generated id (256 bits).
pub const SESSION_ID_BYTES: usize = 32;

/// Opaque, URL safe session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading characters of the id, enough to correlate log lines.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Source of fresh session identifiers.
pub trait IdGenerator: Send + Sync + 'static {
    fn new_id(&self) -> Result<SessionId, SessionError>;
}

/// Draws [`SESSION_ID_BYTES`] from the operating system CSPRNG per call.
///
/// `ring::rand::SystemRandom` holds no state of its own, so concurrent
/// callers never share a generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn new_id(&self) -> Result<SessionId, SessionError> {
        gen_random_string(SESSION_ID_BYTES).map(SessionId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn is_url_safe(s: &str) -> bool {
        s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    #[test]
    fn test_random_id_is_not_empty() {
        let id = RandomIdGenerator.new_id().unwrap();
        assert!(!id.as_str().is_empty());
        assert_eq!(id.as_str().len(), 43);
    }

    #[test]
    fn test_random_ids_are_unique() {
        // Given many ids drawn in a tight loop
        let ids: HashSet<SessionId> = (0..10_000)
            .map(|_| RandomIdGenerator.new_id().unwrap())
            .collect();

        // Then none of them collide
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_random_ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                std::thread::spawn(|| {
                    (0..500)
                        .map(|_| RandomIdGenerator.new_id().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(ids.insert(id), "duplicate id generated");
            }
        }
        assert_eq!(ids.len(), 4000);
    }

    #[test]
    fn test_short_prefix() {
        let id = SessionId::new("abcdefghijklmnop");
        assert_eq!(id.short(), "abcdefgh");

        let id = SessionId::new("abc");
        assert_eq!(id.short(), "abc");
    }

    #[test]
    fn test_display_is_full_id() {
        let id = SessionId::from("abc-def_123");
        assert_eq!(id.to_string(), "abc-def_123");
    }

    proptest! {
        #[test]
        fn generated_ids_are_cookie_safe(_round in 0u8..64) {
            let id = RandomIdGenerator.new_id().unwrap();
            prop_assert!(is_url_safe(id.as_str()));
            let encoded = urlencoding::encode(id.as_str());
            prop_assert_eq!(encoded.as_ref(), id.as_str());
        }
    }
}
