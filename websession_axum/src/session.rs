use std::ops::Deref;
use std::sync::Arc;

use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use http::{HeaderMap, StatusCode, request::Parts};
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use websession::{Manager, Session, SessionError, SessionHandle};

use super::error::IntoResponseError;

/// Per-request slot filled on the first `CurrentSession` extraction.
///
/// Requests whose handlers never ask for the session (logout, static
/// routes) therefore never create one.
#[derive(Clone)]
pub(crate) struct PendingSession(Arc<PendingInner>);

struct PendingInner {
    manager: Arc<Manager>,
    request: HeaderMap,
    session: OnceCell<SessionHandle>,
    cookie_headers: Mutex<HeaderMap>,
}

impl PendingSession {
    pub(crate) fn new(manager: Arc<Manager>, request: HeaderMap) -> Self {
        Self(Arc::new(PendingInner {
            manager,
            request,
            session: OnceCell::new(),
            cookie_headers: Mutex::new(HeaderMap::new()),
        }))
    }

    pub(crate) async fn get_or_start(&self) -> Result<SessionHandle, SessionError> {
        let inner = &self.0;
        inner
            .session
            .get_or_try_init(|| async {
                let mut headers = HeaderMap::new();
                let session = inner.manager.start(&inner.request, &mut headers).await?;
                *inner.cookie_headers.lock() = headers;
                Ok::<_, SessionError>(session)
            })
            .await
            .cloned()
    }

    pub(crate) fn is_started(&self) -> bool {
        self.0.session.initialized()
    }

    /// `Set-Cookie` headers produced by starting the session, empty if it never started
    pub(crate) fn take_cookie_headers(&self) -> HeaderMap {
        std::mem::take(&mut *self.0.cookie_headers.lock())
    }
}

/// The session of the current request, available as an Axum extractor.
///
/// Started (or resumed) by the first extraction on a route behind
/// [`session_layer`](crate::session_layer); extracting it on a route without
/// the layer is a server misconfiguration and yields 500.
///
/// # Example
///
/// ```no_run
/// use websession_axum::CurrentSession;
///
/// async fn visits(session: CurrentSession) -> String {
///     let count = session.get("visits").await.ok().flatten();
///     format!("{count:?}")
/// }
/// ```
#[derive(Clone)]
pub struct CurrentSession(pub SessionHandle);

impl CurrentSession {
    pub fn handle(&self) -> SessionHandle {
        self.0.clone()
    }
}

impl Deref for CurrentSession {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl std::fmt::Debug for CurrentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CurrentSession")
            .field(&self.0.id().short())
            .finish()
    }
}

impl<S> FromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        let pending = parts.extensions.get::<PendingSession>().cloned().ok_or_else(|| {
            tracing::error!("CurrentSession extracted on a route without session_layer");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Session layer is not installed".to_string(),
            )
        })?;

        let session = pending.get_or_start().await.into_response_error()?;
        Ok(CurrentSession(session))
    }
}

/// `None` only when the route is not behind the session layer
impl<S> OptionalFromRequestParts<S> for CurrentSession
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        _: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let Some(pending) = parts.extensions.get::<PendingSession>().cloned() else {
            return Ok(None);
        };
        let session = pending.get_or_start().await.into_response_error()?;
        Ok(Some(CurrentSession(session)))
    }
}
