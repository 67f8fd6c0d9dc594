//! HTTP and WebSocket handlers.
//!
//! # Endpoints
//!
//! - `GET /`                      – welcome message
//! - `GET /points`                – totals for every window
//! - `GET /points/{time_window}`  – totals for one window
//! - `GET /stream/status`         – whether the event stream is running
//! - `GET /events/recent?limit=N` – most recent recorded events
//! - `GET /ws`                    – control channel and live updates

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use housecup_core::store::StoreError;
use housecup_sdk::objects::InvalidWindowError;
use serde::Serialize;

use crate::state::AppState;

mod points;
mod ws;

/// Build the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(points::welcome))
        .route("/points", get(points::get_all_points))
        .route("/points/{time_window}", get(points::get_points))
        .route("/stream/status", get(points::stream_status))
        .route("/events/recent", get(points::recent_events))
        .route("/ws", get(ws::stream_ws))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in the points handlers.
#[derive(Debug)]
enum PointsApiError {
    /// The requested window name is unknown.
    InvalidWindow(InvalidWindowError),
    /// The store could not be read.
    Storage(StoreError),
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

impl IntoResponse for PointsApiError {
    fn into_response(self) -> Response {
        match self {
            PointsApiError::InvalidWindow(e) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    detail: e.to_string(),
                }),
            )
                .into_response(),
            PointsApiError::Storage(e) => {
                tracing::error!(error = %e, "Points API storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        detail: "internal server error".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}
