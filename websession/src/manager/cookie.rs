use chrono::{DateTime, Utc};
use headers::{Cookie, HeaderMapExt};
use http::header::{HeaderMap, HeaderValue, SET_COOKIE};

use crate::errors::SessionError;
use crate::id::SessionId;

/// Raw value of cookie `name` from the request headers, if present.
pub(super) fn get_cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let Some(cookies) = headers.typed_get::<Cookie>() else {
        tracing::debug!("No cookie header found");
        return None;
    };

    let value = cookies.get(name).map(str::to_string);
    if value.is_none() {
        tracing::debug!("No session cookie '{}' found in cookies", name);
    }
    value
}

pub(super) fn encode_cookie_value(id: &SessionId) -> String {
    urlencoding::encode(id.as_str()).into_owned()
}

/// True if every `%` starts a two-digit hex escape
fn has_valid_escapes(value: &str) -> bool {
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape_ok = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !escape_ok {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

pub(super) fn decode_cookie_value(value: &str) -> Result<SessionId, SessionError> {
    if !has_valid_escapes(value) {
        return Err(SessionError::InvalidCookie(
            "Malformed percent escape in cookie".to_string(),
        ));
    }
    let decoded = urlencoding::decode(value)
        .map_err(|e| SessionError::InvalidCookie(format!("Failed to unescape cookie: {e}")))?;
    if decoded.is_empty() {
        return Err(SessionError::EmptyCookie);
    }
    Ok(SessionId::new(decoded.into_owned()))
}

fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Append a session cookie carrying `value` that lives for `max_age` seconds.
pub(super) fn header_set_cookie(
    headers: &mut HeaderMap,
    name: &str,
    value: &str,
    max_age: u64,
) -> Result<(), SessionError> {
    let cookie = format!("{name}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age}");
    append(headers, &cookie)
}

/// Append a cookie that makes the client drop `name` immediately.
pub(super) fn header_expire_cookie(
    headers: &mut HeaderMap,
    name: &str,
    now: DateTime<Utc>,
) -> Result<(), SessionError> {
    let cookie = format!(
        "{name}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=-1; Expires={}",
        http_date(now)
    );
    append(headers, &cookie)
}

fn append(headers: &mut HeaderMap, cookie: &str) -> Result<(), SessionError> {
    let value = HeaderValue::from_str(cookie)
        .map_err(|_| SessionError::Header("Failed to parse cookie".to_string()))?;
    headers.append(SET_COOKIE, value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use http::header::COOKIE;
    use proptest::prelude::*;

    fn request_with_cookie(cookie: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
        headers
    }

    #[test]
    fn test_get_cookie_value_found() {
        let headers = request_with_cookie("theme=dark; sid=abc123; lang=en");
        assert_eq!(get_cookie_value(&headers, "sid"), Some("abc123".to_string()));
    }

    #[test]
    fn test_get_cookie_value_missing() {
        let headers = request_with_cookie("theme=dark");
        assert_eq!(get_cookie_value(&headers, "sid"), None);
        assert_eq!(get_cookie_value(&HeaderMap::new(), "sid"), None);
    }

    #[test]
    fn test_get_cookie_value_empty() {
        let headers = request_with_cookie("sid=");
        assert_eq!(get_cookie_value(&headers, "sid"), Some(String::new()));
    }

    #[test]
    fn test_get_cookie_value_across_headers() {
        // Given two separate Cookie headers
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("a=1"));
        headers.append(COOKIE, HeaderValue::from_static("sid=xyz"));

        // Then both are searched
        assert_eq!(get_cookie_value(&headers, "sid"), Some("xyz".to_string()));
    }

    #[test]
    fn test_decode_percent_escaped() {
        let id = decode_cookie_value("a%2Bb%2Fc").unwrap();
        assert_eq!(id.as_str(), "a+b/c");
    }

    #[test]
    fn test_decode_invalid_utf8() {
        // %C3%28 is not valid UTF-8 once unescaped
        let result = decode_cookie_value("%C3%28");
        assert!(matches!(result, Err(SessionError::InvalidCookie(_))));
    }

    #[test]
    fn test_decode_malformed_escapes() {
        for value in ["%ZZ", "%", "abc%4", "abc%", "%G1x"] {
            let result = decode_cookie_value(value);
            assert!(
                matches!(result, Err(SessionError::InvalidCookie(_))),
                "{value} should be rejected"
            );
        }
    }

    #[test]
    fn test_has_valid_escapes() {
        assert!(has_valid_escapes("plain-id_123"));
        assert!(has_valid_escapes("a%2Bb%2fc"));
        assert!(!has_valid_escapes("a%2"));
        assert!(!has_valid_escapes("%%41"));
    }

    #[test]
    fn test_decode_empty() {
        assert!(matches!(
            decode_cookie_value(""),
            Err(SessionError::EmptyCookie)
        ));
    }

    #[test]
    fn test_header_set_cookie() {
        // Given empty response headers
        let mut headers = HeaderMap::new();

        // When setting a session cookie
        header_set_cookie(&mut headers, "sid", "abc", 3600).unwrap();

        // Then the attributes are present
        let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("sid=abc;"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=3600"));
    }

    #[test]
    fn test_header_set_cookie_rejects_control_chars() {
        let mut headers = HeaderMap::new();
        let result = header_set_cookie(&mut headers, "sid", "bad\nvalue", 60);
        assert!(matches!(result, Err(SessionError::Header(_))));
        assert!(headers.get(SET_COOKIE).is_none());
    }

    #[test]
    fn test_header_expire_cookie() {
        let mut headers = HeaderMap::new();
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

        header_expire_cookie(&mut headers, "sid", now).unwrap();

        let cookie = headers.get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("sid=;"));
        assert!(cookie.contains("Max-Age=-1"));
        assert!(cookie.contains("Expires=Tue, 02 Jan 2024 03:04:05 GMT"));
        assert!(cookie.contains("HttpOnly"));
    }

    proptest! {
        #[test]
        fn escaped_values_unescape_to_the_original(raw in "[^\u{0}]{1,64}") {
            let id = SessionId::new(raw.clone());
            let encoded = encode_cookie_value(&id);
            prop_assert!(encoded.is_ascii());
            prop_assert!(!encoded.contains(';'));
            let decoded = decode_cookie_value(&encoded).unwrap();
            prop_assert_eq!(decoded.as_str(), raw.as_str());
        }
    }
}
