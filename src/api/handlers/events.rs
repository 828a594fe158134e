//! Device event ingest and history handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CreateEventRequest, EventDto, EventListResponse, PaginationParams};
use crate::app_state::AppState;
use crate::domain::{DeviceId, EventType};
use crate::error::{ErrorResponse, RelayError};

/// `POST /devices/{id}/events`: record an event and relay it.
///
/// # Errors
///
/// Returns [`RelayError::InvalidRequest`] for a missing or unknown event
/// type or a non-object payload, or [`RelayError::DeviceNotFound`] for an
/// unknown device.
#[utoipa::path(
    post,
    path = "/devices/{id}/events",
    tag = "Events",
    summary = "Record a device event",
    description = "Stores a discrete device event and pushes it to every observer subscribed to the device.",
    params(("id" = String, Path, description = "Device id")),
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event recorded", body = EventDto),
        (status = 400, description = "Invalid event type or payload", body = ErrorResponse),
        (status = 404, description = "Unknown device", body = ErrorResponse),
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateEventRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let event_type = req
        .event_type
        .as_deref()
        .and_then(|raw| raw.parse::<EventType>().ok())
        .ok_or_else(|| {
            RelayError::InvalidRequest(format!(
                "invalid event type; valid types: {}",
                EventType::valid_names()
            ))
        })?;

    let stored = state
        .telemetry
        .record_event(DeviceId::new(id), event_type, req.payload)
        .await?;

    Ok((StatusCode::CREATED, Json(EventDto::from(stored))))
}

/// `GET /devices/{id}/events`: event history, newest first.
///
/// # Errors
///
/// Returns [`RelayError::DeviceNotFound`] for an unknown device.
#[utoipa::path(
    get,
    path = "/devices/{id}/events",
    tag = "Events",
    summary = "List device events",
    params(("id" = String, Path, description = "Device id"), PaginationParams),
    responses(
        (status = 200, description = "One page of events", body = EventListResponse),
        (status = 404, description = "Unknown device", body = ErrorResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, RelayError> {
    let page = params.page();
    let paged = state.telemetry.events(&DeviceId::new(id), page).await?;
    Ok(Json(EventListResponse::new(paged, page)))
}

/// Event routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/devices/{id}/events", get(list_events).post(create_event))
}
