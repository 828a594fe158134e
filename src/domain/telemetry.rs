//! Telemetry records pushed by devices and relayed to observers.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::DeviceId;

/// A single temperature/humidity sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Device that produced the sample.
    pub device_id: DeviceId,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Time the sample was recorded.
    pub created_at: DateTime<Utc>,
}

impl Reading {
    /// Creates a reading stamped with the current time.
    #[must_use]
    pub fn now(device_id: DeviceId, temperature: f64, humidity: f64) -> Self {
        Self {
            device_id,
            temperature,
            humidity,
            created_at: Utc::now(),
        }
    }
}

/// Kinds of discrete events a device can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// Operating mode switched between AUTO and MANUAL.
    ModeChanged,
    /// Physical button on the device was pressed.
    ButtonPressed,
    /// LED turned on or off.
    LedStateChanged,
    /// A sensor value crossed the configured threshold.
    ThresholdExceeded,
    /// Device came online.
    DeviceConnected,
    /// Device went offline.
    DeviceDisconnected,
}

impl EventType {
    /// Every event type, in wire order.
    pub const ALL: [Self; 6] = [
        Self::ModeChanged,
        Self::ButtonPressed,
        Self::LedStateChanged,
        Self::ThresholdExceeded,
        Self::DeviceConnected,
        Self::DeviceDisconnected,
    ];

    /// Returns the wire name of the event type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ModeChanged => "MODE_CHANGED",
            Self::ButtonPressed => "BUTTON_PRESSED",
            Self::LedStateChanged => "LED_STATE_CHANGED",
            Self::ThresholdExceeded => "THRESHOLD_EXCEEDED",
            Self::DeviceConnected => "DEVICE_CONNECTED",
            Self::DeviceDisconnected => "DEVICE_DISCONNECTED",
        }
    }

    /// Comma-separated list of valid wire names.
    #[must_use]
    pub fn valid_names() -> String {
        Self::ALL.map(|t| t.as_str()).join(", ")
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown event type: {s}"))
    }
}

/// A discrete device event with an arbitrary JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceEvent {
    /// Device that raised the event.
    pub device_id: DeviceId,
    /// Event discriminator.
    pub event_type: EventType,
    /// Event-specific data (always a JSON object on the wire).
    #[serde(default = "empty_object")]
    pub payload: serde_json::Value,
    /// Time the event was recorded.
    pub created_at: DateTime<Utc>,
}

impl DeviceEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn now(device_id: DeviceId, event_type: EventType, payload: serde_json::Value) -> Self {
        Self {
            device_id,
            event_type,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Push-channel connection status reported to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Session is open and bound to a device.
    Connected,
    /// Session was lost or closed.
    Disconnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected => f.write_str("disconnected"),
        }
    }
}

/// Returns an empty JSON object, the default event payload.
pub(crate) fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn event_type_wire_names() {
        let json = serde_json::to_string(&EventType::LedStateChanged).unwrap_or_default();
        assert_eq!(json, "\"LED_STATE_CHANGED\"");
        assert_eq!(
            "THRESHOLD_EXCEEDED".parse::<EventType>(),
            Ok(EventType::ThresholdExceeded)
        );
        assert!("LED_EXPLODED".parse::<EventType>().is_err());
    }

    #[test]
    fn event_payload_defaults_to_object() {
        let json = r#"{"deviceId":"d","eventType":"BUTTON_PRESSED","createdAt":"2024-01-01T00:00:00Z"}"#;
        let Ok(event) = serde_json::from_str::<DeviceEvent>(json) else {
            panic!("event should parse");
        };
        assert!(event.payload.is_object());
    }

    #[test]
    fn reading_uses_camel_case() {
        let reading = Reading::now(DeviceId::from("d"), 21.5, 40.0);
        let json = serde_json::to_string(&reading).unwrap_or_default();
        assert!(json.contains("\"deviceId\""));
        assert!(json.contains("\"createdAt\""));
    }
}
