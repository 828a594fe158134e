//! Push-channel wire messages.
//!
//! Every frame exchanged over the WebSocket is one flat JSON object with a
//! `type` discriminator:
//!
//! ```json
//! {"type":"subscribe","deviceId":"dev-1"}
//! {"type":"reading","deviceId":"dev-1","temperature":24.1,"humidity":51.0,"createdAt":"2024-05-01T10:00:00Z"}
//! {"type":"device_event","deviceId":"dev-1","eventType":"MODE_CHANGED","payload":{"mode":"AUTO"},"createdAt":"..."}
//! {"type":"connection_status","status":"connected","deviceId":"dev-1"}
//! ```

use serde::{Deserialize, Serialize};

use super::{ConnectionStatus, DeviceEvent, DeviceId, Reading};
use crate::error::EnvelopeError;

/// One discriminated message unit on the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Envelope {
    /// Observer → server: bind the session to a device.
    Subscribe {
        /// Device to receive telemetry for.
        device_id: DeviceId,
    },
    /// Server → observer: a sensor sample.
    Reading(Reading),
    /// Server → observer: a discrete device event.
    DeviceEvent(DeviceEvent),
    /// Server → observer: session status, sent once after a subscribe.
    ConnectionStatus {
        /// Current status.
        status: ConnectionStatus,
        /// Device the session is bound to.
        device_id: DeviceId,
    },
}

impl Envelope {
    /// Wire tags this build understands.
    pub const TAGS: [&'static str; 4] = ["subscribe", "reading", "device_event", "connection_status"];

    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::UnknownType`] when the `type` tag is not one
    /// of [`Envelope::TAGS`], and [`EnvelopeError::Malformed`] for invalid
    /// JSON, a missing tag, or missing/ill-typed fields.
    pub fn decode(text: &str) -> Result<Self, EnvelopeError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(|e| EnvelopeError::Malformed(e.to_string()))?;

        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| EnvelopeError::Malformed("missing \"type\" field".to_string()))?;

        if !Self::TAGS.contains(&tag) {
            return Err(EnvelopeError::UnknownType(tag.to_string()));
        }

        serde_json::from_value(value).map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }

    /// Serializes the envelope to a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::Malformed`] if serialization fails (only
    /// possible for payloads containing non-string map keys).
    pub fn encode(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }

    /// Returns the device this envelope refers to.
    #[must_use]
    pub fn device_id(&self) -> &DeviceId {
        match self {
            Self::Subscribe { device_id } | Self::ConnectionStatus { device_id, .. } => device_id,
            Self::Reading(reading) => &reading.device_id,
            Self::DeviceEvent(event) => &event.device_id,
        }
    }

    /// Returns the wire tag as a static string slice.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Subscribe { .. } => "subscribe",
            Self::Reading(_) => "reading",
            Self::DeviceEvent(_) => "device_event",
            Self::ConnectionStatus { .. } => "connection_status",
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::EventType;

    #[test]
    fn subscribe_decodes() {
        let env = Envelope::decode(r#"{"type":"subscribe","deviceId":"dev-1"}"#);
        assert_eq!(
            env,
            Ok(Envelope::Subscribe {
                device_id: DeviceId::from("dev-1")
            })
        );
    }

    #[test]
    fn reading_is_flat() {
        let env = Envelope::Reading(Reading::now(DeviceId::from("dev-1"), 24.5, 50.0));
        let Ok(json) = env.encode() else {
            panic!("encode failed");
        };
        let value: serde_json::Value = serde_json::from_str(&json).unwrap_or_default();
        assert_eq!(value["type"], "reading");
        assert_eq!(value["deviceId"], "dev-1");
        assert_eq!(value["temperature"], 24.5);
        assert!(value["createdAt"].is_string());
        assert!(value.get("reading").is_none());
    }

    #[test]
    fn device_event_tag_and_fields() {
        let env = Envelope::DeviceEvent(DeviceEvent::now(
            DeviceId::from("dev-1"),
            EventType::ModeChanged,
            serde_json::json!({"mode": "AUTO"}),
        ));
        let json = env.encode().unwrap_or_default();
        assert!(json.contains(r#""type":"device_event""#));
        assert!(json.contains(r#""eventType":"MODE_CHANGED""#));
        assert_eq!(env.tag(), "device_event");
    }

    #[test]
    fn connection_status_wire_shape() {
        let env = Envelope::ConnectionStatus {
            status: ConnectionStatus::Connected,
            device_id: DeviceId::from("dev-1"),
        };
        let json = env.encode().unwrap_or_default();
        assert_eq!(
            json,
            r#"{"type":"connection_status","status":"connected","deviceId":"dev-1"}"#
        );
    }

    #[test]
    fn unknown_tag_is_distinguished() {
        let err = Envelope::decode(r#"{"type":"unsubscribe","deviceId":"dev-1"}"#);
        assert_eq!(err, Err(EnvelopeError::UnknownType("unsubscribe".to_string())));
    }

    #[test]
    fn malformed_inputs() {
        assert!(matches!(
            Envelope::decode("not json"),
            Err(EnvelopeError::Malformed(_))
        ));
        assert!(matches!(
            Envelope::decode(r#"{"deviceId":"dev-1"}"#),
            Err(EnvelopeError::Malformed(_))
        ));
        assert!(matches!(
            Envelope::decode(r#"{"type":"subscribe"}"#),
            Err(EnvelopeError::Malformed(_))
        ));
    }

    #[test]
    fn device_id_accessor() {
        let env = Envelope::Reading(Reading::now(DeviceId::from("dev-9"), 1.0, 2.0));
        assert_eq!(env.device_id().as_str(), "dev-9");
    }
}
