use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::get,
};
use websession_axum::{session_layer, session_router};

mod handlers;
mod server;

use handlers::{index, login, login_form};
use server::{init_tracing, listen_port, shutdown_signal};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing("demo_session");

    let manager = Arc::new(websession::init().await?);
    let gc = manager.spawn_gc();

    let app = Router::new()
        .route("/", get(index))
        .route("/login", get(login_form).post(login))
        .nest("/session", session_router())
        .layer(from_fn_with_state(manager.clone(), session_layer))
        .with_state(manager);

    let port = listen_port();
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("Starting server on http://localhost:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    gc.shutdown().await;
    Ok(())
}
