//! Reading ingest and history handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CreateReadingRequest, PaginationParams, ReadingDto, ReadingListResponse};
use crate::app_state::AppState;
use crate::domain::DeviceId;
use crate::error::{ErrorResponse, RelayError};

/// `POST /devices/{id}/readings`: record a reading and relay it.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] if either value is missing or
/// not finite, or [`RelayError::DeviceNotFound`] for an unknown device.
#[utoipa::path(
    post,
    path = "/devices/{id}/readings",
    tag = "Readings",
    summary = "Record a reading",
    description = "Stores a temperature/humidity sample and pushes it to every observer subscribed to the device.",
    params(("id" = String, Path, description = "Device id")),
    request_body = CreateReadingRequest,
    responses(
        (status = 201, description = "Reading recorded", body = ReadingDto),
        (status = 400, description = "Missing or invalid values", body = ErrorResponse),
        (status = 404, description = "Unknown device", body = ErrorResponse),
    )
)]
pub async fn create_reading(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateReadingRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let (Some(temperature), Some(humidity)) = (req.temperature, req.humidity) else {
        return Err(RelayError::InvalidRequest(
            "temperature and humidity are required".to_string(),
        ));
    };

    let stored = state
        .telemetry
        .record_reading(DeviceId::new(id), temperature, humidity)
        .await?;

    Ok((StatusCode::CREATED, Json(ReadingDto::from(stored))))
}

/// `GET /devices/{id}/readings`: reading history, newest first.
///
/// # Errors
///
/// Returns [`RelayError::DeviceNotFound`] for an unknown device.
#[utoipa::path(
    get,
    path = "/devices/{id}/readings",
    tag = "Readings",
    summary = "List readings",
    params(("id" = String, Path, description = "Device id"), PaginationParams),
    responses(
        (status = 200, description = "One page of readings", body = ReadingListResponse),
        (status = 404, description = "Unknown device", body = ErrorResponse),
    )
)]
pub async fn list_readings(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, RelayError> {
    let page = params.page();
    let paged = state.telemetry.readings(&DeviceId::new(id), page).await?;
    Ok(Json(ReadingListResponse::new(paged, page)))
}

/// `GET /devices/{id}/readings/latest`: most recent reading.
///
/// # Errors
///
/// Returns [`RelayError::DeviceNotFound`] for an unknown device, or
/// [`RelayError::NoReadings`] if the device has none.
#[utoipa::path(
    get,
    path = "/devices/{id}/readings/latest",
    tag = "Readings",
    summary = "Latest reading",
    params(("id" = String, Path, description = "Device id")),
    responses(
        (status = 200, description = "Latest reading", body = ReadingDto),
        (status = 404, description = "Unknown device or no readings yet", body = ErrorResponse),
    )
)]
pub async fn latest_reading(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, RelayError> {
    let stored = state.telemetry.latest_reading(&DeviceId::new(id)).await?;
    Ok(Json(ReadingDto::from(stored)))
}

/// Reading routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/devices/{id}/readings",
            get(list_readings).post(create_reading),
        )
        .route("/devices/{id}/readings/latest", get(latest_reading))
}
