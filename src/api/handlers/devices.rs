//! Device catalog handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CreateDeviceRequest, DeviceDto, DeviceListResponse};
use crate::app_state::AppState;
use crate::domain::DeviceId;
use crate::error::{ErrorResponse, RelayError};

/// `GET /devices`: every registered device.
///
/// # Errors
///
/// Returns [`RelayError`] on store failure.
#[utoipa::path(
    get,
    path = "/devices",
    tag = "Devices",
    summary = "List devices",
    responses(
        (status = 200, description = "Device catalog", body = DeviceListResponse),
    )
)]
pub async fn list_devices(State(state): State<AppState>) -> Result<impl IntoResponse, RelayError> {
    let devices = state.telemetry.devices().await?;
    Ok(Json(DeviceListResponse {
        devices: devices.into_iter().map(DeviceDto::from).collect(),
    }))
}

/// `GET /devices/{id}`: one device.
///
/// # Errors
///
/// Returns [`RelayError::DeviceNotFound`] for an unknown id.
#[utoipa::path(
    get,
    path = "/devices/{id}",
    tag = "Devices",
    summary = "Get a device",
    params(("id" = String, Path, description = "Device id")),
    responses(
        (status = 200, description = "Device found", body = DeviceDto),
        (status = 404, description = "Unknown device", body = ErrorResponse),
    )
)]
pub async fn get_device(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, RelayError> {
    let device = state.telemetry.device(&DeviceId::new(id)).await?;
    Ok(Json(DeviceDto::from(device)))
}

/// `POST /devices`: register a device under a new UUID.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] if the name is missing.
#[utoipa::path(
    post,
    path = "/devices",
    tag = "Devices",
    summary = "Register a device",
    request_body = CreateDeviceRequest,
    responses(
        (status = 201, description = "Device registered", body = DeviceDto),
        (status = 400, description = "Missing name", body = ErrorResponse),
    )
)]
pub async fn create_device(
    State(state): State<AppState>,
    Json(req): Json<CreateDeviceRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let device = state
        .telemetry
        .register_device(req.name.as_deref().unwrap_or_default(), req.firmware_version)
        .await?;
    Ok((StatusCode::CREATED, Json(DeviceDto::from(device))))
}

/// Device catalog routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/devices", get(list_devices).post(create_device))
        .route("/devices/{id}", get(get_device))
}
