//! Axum server setup and router configuration.

use crate::api;
use crate::config::AllowedOrigins;
use crate::shutdown::shutdown_signal;
use crate::state::AppState;
use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Build the main application router.
pub fn build_router(state: AppState, allowed_origins: &AllowedOrigins) -> Router {
    Router::new()
        // Health check endpoint
        .route("/health", get(health_check))
        .merge(api::router())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

/// CORS policy for browser frontends served from another origin.
fn cors_layer(allowed_origins: &AllowedOrigins) -> CorsLayer {
    let origin = match allowed_origins {
        AllowedOrigins::Any => AllowOrigin::any(),
        AllowedOrigins::List(origins) => AllowOrigin::list(origins.iter().cloned()),
    };
    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Simple health check - returns OK if the server is running.
async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Run the server with graceful shutdown support.
///
/// On SIGINT/SIGTERM, `shutdown_tx` is set so the hub closes open sessions;
/// otherwise upgraded WebSocket connections would hold the shutdown open.
pub async fn run_server(
    router: Router,
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
) -> Result<(), std::io::Error> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
}
