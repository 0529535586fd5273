use std::sync::LazyLock;

/// Where `/logout` sends the browser afterwards
/// Default: "/"
pub static SESSION_LOGOUT_REDIRECT: LazyLock<String> = LazyLock::new(|| {
    std::env::var("SESSION_LOGOUT_REDIRECT")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/".to_string())
});
