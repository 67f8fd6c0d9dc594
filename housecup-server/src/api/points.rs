use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use housecup_sdk::objects::{StreamStatus, Window};
use serde::{Deserialize, Serialize};

use super::PointsApiError;
use crate::state::AppState;

#[derive(Serialize)]
struct WelcomeResponse {
    message: &'static str,
}

/// `GET /`
pub(super) async fn welcome() -> impl IntoResponse {
    Json(WelcomeResponse {
        message: "Welcome to the House Cup API",
    })
}

/// `GET /points/{time_window}` – totals for one window.
///
/// Accepts `short`, `medium`, `unbounded` and the legacy names `5m`, `1h`,
/// `all`. Anything else is a 400.
pub(super) async fn get_points(
    State(state): State<AppState>,
    Path(time_window): Path<String>,
) -> Result<impl IntoResponse, PointsApiError> {
    let window: Window = time_window
        .parse()
        .map_err(PointsApiError::InvalidWindow)?;
    let totals = state
        .aggregator
        .snapshot_window(window)
        .await
        .map_err(PointsApiError::Storage)?;
    Ok(Json(totals))
}

/// `GET /points` – totals for every window, evaluated at one instant.
pub(super) async fn get_all_points(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, PointsApiError> {
    let totals = state
        .aggregator
        .snapshot()
        .await
        .map_err(PointsApiError::Storage)?;
    Ok(Json(totals))
}

#[derive(Serialize)]
struct StatusResponse {
    status: StreamStatus,
}

/// `GET /stream/status`
pub(super) async fn stream_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        status: state.producer().status().await,
    })
}

const DEFAULT_RECENT_LIMIT: i64 = 20;
const MAX_RECENT_LIMIT: i64 = 100;

#[derive(Deserialize)]
pub(super) struct RecentQuery {
    limit: Option<i64>,
}

/// `GET /events/recent?limit=N` – the latest events, newest first.
///
/// `limit` defaults to 20 and is clamped to `1..=100`.
pub(super) async fn recent_events(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> Result<impl IntoResponse, PointsApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);
    let events = state
        .aggregator
        .store()
        .recent(limit)
        .await
        .map_err(PointsApiError::Storage)?;
    Ok(Json(events))
}
