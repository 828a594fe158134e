//! Error types for the relay, the push-channel protocol and the device bridge.
//!
//! [`RelayError`] is the HTTP-facing error of the ingest/query surface and
//! maps each variant to a status code and a structured JSON body.
//! [`EnvelopeError`] covers protocol faults on the push channel, which are
//! always logged and dropped. [`BridgeError`] covers capability and
//! transport faults raised by the device bridge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::DeviceId;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: temperature and humidity are required",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                |
/// |-----------|-----------------|----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request            |
/// | 2000–2999 | Not Found       | 404 Not Found              |
/// | 3000–3999 | Server          | 500 Internal Server Error  |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unsupported command type string.
    #[error("invalid command type: {0}")]
    InvalidCommandType(String),

    /// The device is not in the catalog.
    #[error("device with id {0} not found")]
    DeviceNotFound(DeviceId),

    /// The device has no recorded readings.
    #[error("no readings found for device {0}")]
    NoReadings(DeviceId),

    /// Record store failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidCommandType(_) => 1002,
            Self::NoReadings(_) => 2001,
            Self::DeviceNotFound(_) => 2002,
            Self::PersistenceError(_) => 3001,
            Self::Internal(_) => 3000,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidCommandType(_) => StatusCode::BAD_REQUEST,
            Self::NoReadings(_) | Self::DeviceNotFound(_) => StatusCode::NOT_FOUND,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

/// Protocol fault on the push channel.
///
/// Never closes a session: the offending frame is logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    /// Invalid JSON, missing tag, or missing/ill-typed fields.
    #[error("malformed envelope: {0}")]
    Malformed(String),

    /// The `type` tag is not a known envelope.
    #[error("unknown envelope type: {0}")]
    UnknownType(String),
}

/// Capability or transport fault raised by the device bridge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// A command was sent with no active connection.
    #[error("no device connected")]
    NotConnected,

    /// A connect was requested while another device is active.
    #[error("already connected to {active}; disconnect before connecting to {requested}")]
    Busy {
        /// Currently connected device.
        active: DeviceId,
        /// Device the caller asked for.
        requested: DeviceId,
    },

    /// The command name is not understood by the bridge.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// The command payload is missing a required field.
    #[error("invalid command payload: {0}")]
    InvalidPayload(String),

    /// The platform refused the radio permissions.
    #[error("bluetooth permission denied")]
    PermissionDenied,

    /// The radio could not resolve the device.
    #[error("device not found: {0}")]
    DeviceNotFound(DeviceId),

    /// Writing the command characteristic failed.
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Any other radio failure.
    #[error("transport error: {0}")]
    Transport(String),
}
