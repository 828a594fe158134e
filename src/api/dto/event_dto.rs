//! Device event DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{DeviceEvent, EventType};
use crate::persistence::{Page, Paged, Stored};

/// Request body for `POST /devices/{id}/events`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    /// Event type wire name, e.g. `BUTTON_PRESSED`.
    pub event_type: Option<String>,
    /// Event body; must be an object when present.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A stored device event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventDto {
    /// Store-assigned id.
    pub id: u64,
    /// Reporting device.
    pub device_id: String,
    /// Event type.
    pub event_type: EventType,
    /// Event body.
    pub payload: serde_json::Value,
    /// Server receive time.
    pub created_at: DateTime<Utc>,
}

impl From<Stored<DeviceEvent>> for EventDto {
    fn from(stored: Stored<DeviceEvent>) -> Self {
        let Stored { id, record } = stored;
        Self {
            id,
            device_id: record.device_id.to_string(),
            event_type: record.event_type,
            payload: record.payload,
            created_at: record.created_at,
        }
    }
}

/// Response body for `GET /devices/{id}/events`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventListResponse {
    /// Events, newest first.
    pub events: Vec<EventDto>,
    /// Total events for the device.
    pub total: usize,
    /// Applied page size.
    pub limit: usize,
    /// Applied offset.
    pub offset: usize,
}

impl EventListResponse {
    /// Builds the response for one page.
    #[must_use]
    pub fn new(paged: Paged<DeviceEvent>, page: Page) -> Self {
        Self {
            events: paged.items.into_iter().map(EventDto::from).collect(),
            total: paged.total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}
