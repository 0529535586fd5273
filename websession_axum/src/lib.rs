//! Axum integration for the `websession` session manager
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use axum::{Router, middleware::from_fn_with_state, routing::get};
//! use websession_axum::{CurrentSession, session_layer, session_router};
//!
//! async fn index(session: CurrentSession) -> String {
//!     format!("session {}", session.id().short())
//! }
//!
//! # async fn run() -> Result<(), websession::SessionError> {
//! let manager = Arc::new(websession::init().await?);
//! let app: Router = Router::new()
//!     .route("/", get(index))
//!     .nest("/session", session_router())
//!     .layer(from_fn_with_state(manager.clone(), session_layer))
//!     .with_state(manager);
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod middleware;
mod router;
mod session;

pub use config::SESSION_LOGOUT_REDIRECT;
pub use error::IntoResponseError;
pub use middleware::session_layer;
pub use router::session_router;
pub use session::CurrentSession;

// Re-export the core crate so applications need a single dependency
pub use websession;
