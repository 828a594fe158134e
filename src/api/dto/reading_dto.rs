//! Reading DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Reading;
use crate::persistence::{Page, Paged, Stored};

/// Request body for `POST /devices/{id}/readings`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateReadingRequest {
    /// Temperature, °C.
    pub temperature: Option<f64>,
    /// Relative humidity, %.
    pub humidity: Option<f64>,
}

/// A stored reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadingDto {
    /// Store-assigned id.
    pub id: u64,
    /// Reporting device.
    pub device_id: String,
    /// Temperature, °C.
    pub temperature: f64,
    /// Relative humidity, %.
    pub humidity: f64,
    /// Server receive time.
    pub created_at: DateTime<Utc>,
}

impl From<Stored<Reading>> for ReadingDto {
    fn from(stored: Stored<Reading>) -> Self {
        Self {
            id: stored.id,
            device_id: stored.record.device_id.to_string(),
            temperature: stored.record.temperature,
            humidity: stored.record.humidity,
            created_at: stored.record.created_at,
        }
    }
}

/// Response body for `GET /devices/{id}/readings`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadingListResponse {
    /// Readings, newest first.
    pub readings: Vec<ReadingDto>,
    /// Total readings for the device.
    pub total: usize,
    /// Applied page size.
    pub limit: usize,
    /// Applied offset.
    pub offset: usize,
}

impl ReadingListResponse {
    /// Builds the response for one page.
    #[must_use]
    pub fn new(paged: Paged<Reading>, page: Page) -> Self {
        Self {
            readings: paged.items.into_iter().map(ReadingDto::from).collect(),
            total: paged.total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}
