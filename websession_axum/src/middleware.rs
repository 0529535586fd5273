use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::{HeaderMap, header::SET_COOKIE};
use websession::Manager;

use super::session::PendingSession;

/// True if `headers` already sets cookie `name`
fn sets_cookie(headers: &HeaderMap, name: &str) -> bool {
    headers.get_all(SET_COOKIE).iter().any(|value| {
        value
            .to_str()
            .ok()
            .and_then(|v| v.split_once('='))
            .is_some_and(|(n, _)| n.trim() == name)
    })
}

/// Make the session of every request passing through available to
/// handlers as [`CurrentSession`](crate::CurrentSession).
///
/// The session is started (or resumed) on the first extraction, so routes
/// that never ask for it do not create one. When it was started, its cookie
/// is added to the response unless the handler set that cookie itself.
///
/// Install with `axum::middleware::from_fn_with_state(manager, session_layer)`.
pub async fn session_layer(
    State(manager): State<Arc<Manager>>,
    mut req: Request,
    next: Next,
) -> Response {
    let cookie_name = manager.cookie_name().to_string();
    let pending = PendingSession::new(manager, req.headers().clone());
    req.extensions_mut().insert(pending.clone());

    let mut response = next.run(req).await;

    if !pending.is_started() {
        return response;
    }
    if sets_cookie(response.headers(), &cookie_name) {
        tracing::trace!("Handler set the session cookie, leaving it alone");
        return response;
    }
    let cookie_headers = pending.take_cookie_headers();
    for value in cookie_headers.get_all(SET_COOKIE) {
        response.headers_mut().append(SET_COOKIE, value.clone());
    }
    response
}
