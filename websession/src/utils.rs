use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use ring::rand::SecureRandom;

use crate::errors::SessionError;

pub(crate) fn base64url_encode(input: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

/// Returns `len` bytes from the system CSPRNG, base64url encoded without padding.
pub(crate) fn gen_random_string(len: usize) -> Result<String, SessionError> {
    let rng = ring::rand::SystemRandom::new();
    let mut buf = vec![0u8; len];
    rng.fill(&mut buf)
        .map_err(|_| SessionError::Crypto("Failed to generate random string".to_string()))?;
    Ok(base64url_encode(&buf))
}
