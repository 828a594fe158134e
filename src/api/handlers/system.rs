//! System endpoints: health check and push-channel occupancy.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::DeviceId;

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `healthy` while the process serves requests.
    pub status: String,
    /// Server time.
    pub timestamp: String,
    /// Crate version.
    pub version: String,
    /// Open push-channel sessions.
    pub ws_clients: usize,
}

/// Subscriber count for one device.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubscribersResponse {
    /// Device queried.
    pub device_id: String,
    /// Sessions currently subscribed to it.
    pub subscribers: usize,
}

/// `GET /health`: service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, current timestamp and the number of open push-channel sessions.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            ws_clients: state.registry.count().await,
        }),
    )
}

/// `GET /devices/{id}/subscribers`: observers subscribed to a device.
#[utoipa::path(
    get,
    path = "/devices/{id}/subscribers",
    tag = "System",
    summary = "Subscriber count",
    params(("id" = String, Path, description = "Device id")),
    responses(
        (status = 200, description = "Subscriber count", body = SubscribersResponse),
    )
)]
pub async fn subscribers_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let device_id = DeviceId::new(id);
    let subscribers = state.registry.count_for(&device_id).await;
    Json(SubscribersResponse {
        device_id: device_id.to_string(),
        subscribers,
    })
}

/// System routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/devices/{id}/subscribers", get(subscribers_handler))
}
