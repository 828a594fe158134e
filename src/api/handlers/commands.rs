//! Command log handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CommandDto, CommandListResponse, CreateCommandRequest, PaginationParams};
use crate::app_state::AppState;
use crate::domain::{CommandType, DeviceId};
use crate::error::{ErrorResponse, RelayError};

/// `POST /devices/{id}/commands`: append to the command log.
///
/// The relay only records the command; delivery to the device is the
/// device bridge's job.
///
/// # Errors
///
/// Returns [`RelayError::InvalidCommandType`] for a missing or unknown
/// command type, or [`RelayError::DeviceNotFound`] for an unknown device.
#[utoipa::path(
    post,
    path = "/devices/{id}/commands",
    tag = "Commands",
    summary = "Log a command",
    params(("id" = String, Path, description = "Device id")),
    request_body = CreateCommandRequest,
    responses(
        (status = 201, description = "Command logged with status `sent`", body = CommandDto),
        (status = 400, description = "Invalid command type", body = ErrorResponse),
        (status = 404, description = "Unknown device", body = ErrorResponse),
    )
)]
pub async fn create_command(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<CreateCommandRequest>,
) -> Result<impl IntoResponse, RelayError> {
    let command_type = req
        .command_type
        .as_deref()
        .and_then(|raw| raw.parse::<CommandType>().ok())
        .ok_or_else(|| {
            RelayError::InvalidCommandType(format!(
                "{}; valid types: {}",
                req.command_type.as_deref().unwrap_or("<missing>"),
                CommandType::valid_names()
            ))
        })?;

    let stored = state
        .telemetry
        .log_command(DeviceId::new(id), command_type, req.payload)
        .await?;

    Ok((StatusCode::CREATED, Json(CommandDto::from(stored))))
}

/// `GET /devices/{id}/commands`: command log, newest first.
///
/// # Errors
///
/// Returns [`RelayError::DeviceNotFound`] for an unknown device.
#[utoipa::path(
    get,
    path = "/devices/{id}/commands",
    tag = "Commands",
    summary = "List logged commands",
    params(("id" = String, Path, description = "Device id"), PaginationParams),
    responses(
        (status = 200, description = "One page of commands", body = CommandListResponse),
        (status = 404, description = "Unknown device", body = ErrorResponse),
    )
)]
pub async fn list_commands(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<PaginationParams>,
) -> Result<impl IntoResponse, RelayError> {
    let page = params.page();
    let paged = state.telemetry.commands(&DeviceId::new(id), page).await?;
    Ok(Json(CommandListResponse::new(paged, page)))
}

/// Command routes.
pub fn routes() -> Router<AppState> {
    Router::new().route(
        "/devices/{id}/commands",
        get(list_commands).post(create_command),
    )
}
