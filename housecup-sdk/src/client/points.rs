//! HTTP client for point-in-time totals.

use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::ClientError;
use crate::objects::{AllWindowTotals, HousePointEvent, StreamStatus, Window, WindowTotals};

/// Typed HTTP client for the read-only points endpoints.
#[derive(Debug, Clone)]
pub struct PointsClient {
    http: Client,
    base_url: Url,
}

#[derive(Deserialize)]
struct StatusBody {
    status: StreamStatus,
}

impl PointsClient {
    /// Create a new `PointsClient` rooted at `base_url`.
    pub fn new(base_url: Url) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `GET /points/{time_window}` – totals for one window.
    pub async fn get_points(&self, window: Window) -> Result<WindowTotals, ClientError> {
        let url = self.base_url.join(&format!("/points/{}", window.name()))?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /points` – totals for every window, evaluated at one instant.
    pub async fn get_all_points(&self) -> Result<AllWindowTotals, ClientError> {
        let url = self.base_url.join("/points")?;
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }

    /// `GET /stream/status` – whether the event stream is running.
    pub async fn stream_status(&self) -> Result<StreamStatus, ClientError> {
        let url = self.base_url.join("/stream/status")?;
        let resp = self.http.get(url).send().await?;
        let body: StatusBody = parse_response(resp).await?;
        Ok(body.status)
    }

    /// `GET /events/recent` – up to `limit` recorded events, newest first.
    pub async fn recent_events(&self, limit: u32) -> Result<Vec<HousePointEvent>, ClientError> {
        let mut url = self.base_url.join("/events/recent")?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        let resp = self.http.get(url).send().await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(ClientError::Json)
}
