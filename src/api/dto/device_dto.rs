//! Device catalog DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Device;

/// Request body for `POST /devices`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeviceRequest {
    /// Display name. Required.
    pub name: Option<String>,
    /// Firmware version; `1.0.0` when omitted.
    pub firmware_version: Option<String>,
}

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDto {
    /// Device id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Reported firmware version.
    pub firmware_version: Option<String>,
    /// Last reading or event time.
    pub last_seen: Option<DateTime<Utc>>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl From<Device> for DeviceDto {
    fn from(device: Device) -> Self {
        Self {
            id: device.id.to_string(),
            name: device.name,
            firmware_version: device.firmware_version,
            last_seen: device.last_seen,
            created_at: device.created_at,
            updated_at: device.updated_at,
        }
    }
}

/// Response body for `GET /devices`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeviceListResponse {
    /// Registered devices, most recent first.
    pub devices: Vec<DeviceDto>,
}
