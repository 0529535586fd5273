//! Session endpoints for applications to nest under a prefix of their choice

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use websession::{DestroyOutcome, Manager};

use super::config::SESSION_LOGOUT_REDIRECT;
use super::error::IntoResponseError;
use super::session::CurrentSession;

/// Routes:
/// - `GET /logout`: destroy the session and redirect to `SESSION_LOGOUT_REDIRECT`
/// - `GET /summary`: JSON description of the current session
///
/// `/summary` needs [`session_layer`](crate::session_layer) in front of it.
pub fn session_router() -> Router<Arc<Manager>> {
    Router::new()
        .route("/logout", get(logout))
        .route("/summary", get(summary))
}

async fn logout(
    State(manager): State<Arc<Manager>>,
    headers: HeaderMap,
) -> Result<Response, (StatusCode, String)> {
    let mut response_headers = HeaderMap::new();
    let outcome = manager
        .destroy(&headers, &mut response_headers)
        .await
        .into_response_error()?;

    if outcome == DestroyOutcome::AlreadyGone {
        tracing::debug!("Logout for a session that no longer exists");
    }

    Ok((
        response_headers,
        Redirect::to(SESSION_LOGOUT_REDIRECT.as_str()),
    )
        .into_response())
}

#[derive(Debug, Serialize)]
struct SessionSummary {
    id_prefix: String,
    keys: Vec<String>,
}

async fn summary(session: CurrentSession) -> Result<Json<SessionSummary>, (StatusCode, String)> {
    let mut keys = session.keys().await.into_response_error()?;
    keys.sort();

    Ok(Json(SessionSummary {
        id_prefix: session.id().short().to_string(),
        keys,
    }))
}
