//! Registered devices known to the relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DeviceId;

/// Firmware version assumed when a device registers without one.
pub const DEFAULT_FIRMWARE: &str = "1.0.0";

/// A device in the relay's catalog.
///
/// Readings, events and commands are only accepted for registered devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// Catalog id (a UUID for devices registered over HTTP).
    pub id: DeviceId,
    /// Display name.
    pub name: String,
    /// Reported firmware version.
    pub firmware_version: Option<String>,
    /// Last time the device pushed a reading or event.
    pub last_seen: Option<DateTime<Utc>>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Device {
    /// Creates a device under a freshly generated UUID.
    #[must_use]
    pub fn register(name: impl Into<String>, firmware_version: Option<String>) -> Self {
        Self::with_id(
            DeviceId::new(uuid::Uuid::new_v4().to_string()),
            name,
            firmware_version,
        )
    }

    /// Creates a device under a known id.
    #[must_use]
    pub fn with_id(
        id: DeviceId,
        name: impl Into<String>,
        firmware_version: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            firmware_version: Some(
                firmware_version.unwrap_or_else(|| DEFAULT_FIRMWARE.to_string()),
            ),
            last_seen: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    /// Records activity from the device.
    pub fn touch(&mut self) {
        let now = Utc::now();
        self.last_seen = Some(now);
        self.updated_at = now;
    }
}
