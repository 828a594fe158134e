//! Values published by the device bridge.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::DeviceId;

/// Kind of the periodic telemetry notification.
pub const SENSOR_READING: &str = "sensor_reading";
/// Kind published after `SET_THRESHOLD`.
pub const THRESHOLD_CHANGED: &str = "THRESHOLD_CHANGED";

/// One device notification: `{"type": "...", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Notification kind, e.g. `sensor_reading` or `LED_STATE_CHANGED`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Kind-specific body.
    #[serde(default = "crate::domain::telemetry::empty_object")]
    pub payload: Value,
}

impl Notification {
    /// Creates a notification.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }

    /// Decodes a notification from the raw bytes of a characteristic.
    ///
    /// # Errors
    ///
    /// Returns the JSON error if the bytes are not a notification object.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// A device found while scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveredDevice {
    /// Radio address of the device.
    pub id: DeviceId,
    /// Advertised name.
    pub name: String,
    /// Received signal strength, dBm.
    pub rssi: i16,
}

/// Published whenever the active connection changes state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionChange {
    /// Device whose state changed.
    pub device_id: DeviceId,
    /// `true` once connected, `false` once gone.
    pub connected: bool,
}

/// Which transport variant backs a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Platform radio.
    Real,
    /// Synthetic devices.
    Simulated,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => f.write_str("real"),
            Self::Simulated => f.write_str("simulated"),
        }
    }
}

/// The bridge's single active (or pending) connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConnection {
    /// Device the connection is bound to.
    pub device_id: DeviceId,
    /// Transport carrying the connection.
    pub transport: TransportKind,
    /// `false` while the connect is still in flight.
    pub connected: bool,
}
