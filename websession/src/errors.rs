use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session id already exists")]
    DuplicateSession,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Invalid session cookie: {0}")]
    InvalidCookie(String),

    #[error("Session cookie is missing")]
    MissingCookie,

    #[error("Session cookie is empty")]
    EmptyCookie,

    /// Backend specific failure, carrying the underlying cause
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Provider registered twice: {0}")]
    RegistrationConflict(String),

    #[error("Invalid provider registration: {0}")]
    InvalidRegistration(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Header error: {0}")]
    Header(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SessionError {
    /// True when the failure was caused by what the client sent (or did not
    /// send) rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MissingCookie | Self::EmptyCookie | Self::InvalidCookie(_)
        )
    }
}

impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        Self::Provider(err.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        Self::Provider(format!("Json conversion(Serde) error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        // Given a Provider variant
        let error = SessionError::Provider("Connection failed".to_string());

        // Then it should format with the wrapped cause
        assert_eq!(error.to_string(), "Provider error: Connection failed");
    }

    #[test]
    fn test_client_errors() {
        assert!(SessionError::MissingCookie.is_client_error());
        assert!(SessionError::EmptyCookie.is_client_error());
        assert!(SessionError::InvalidCookie("bad".to_string()).is_client_error());

        assert!(!SessionError::SessionNotFound.is_client_error());
        assert!(!SessionError::Provider("down".to_string()).is_client_error());
        assert!(!SessionError::DuplicateSession.is_client_error());
    }

    #[test]
    fn test_from_redis_error() {
        // Given a RedisError
        let redis_error =
            redis::RedisError::from((redis::ErrorKind::IoError, "Connection refused"));

        // When converting to SessionError
        let error = SessionError::from(redis_error);

        // Then it should be a Provider variant
        match error {
            SessionError::Provider(msg) => assert!(msg.contains("Connection refused")),
            other => panic!("Expected Provider variant, got {other:?}"),
        }
    }

    #[test]
    fn test_from_serde_error() {
        let serde_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();

        match SessionError::from(serde_error) {
            SessionError::Provider(msg) => assert!(msg.starts_with("Json conversion(Serde)")),
            other => panic!("Expected Provider variant, got {other:?}"),
        }
    }

    #[test]
    fn test_error_is_sync_and_send() {
        fn assert_sync_send<T: Sync + Send>() {}
        assert_sync_send::<SessionError>();
    }
}
