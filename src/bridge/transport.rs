//! The capability set every bridge transport implements.

use std::fmt;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::notification::TransportKind;
use crate::domain::{CommandType, DeviceId};
use crate::error::BridgeError;

/// One device transport.
///
/// Transports publish discoveries, notifications and unsolicited
/// connection loss through the [`BridgeHub`](super::BridgeHub) they were
/// built with. Connection bookkeeping (the single active slot) stays with
/// the bridge; a transport only drives the link.
#[async_trait]
pub trait DeviceTransport: Send + Sync + fmt::Debug {
    /// Variant tag.
    fn kind(&self) -> TransportKind;

    /// Starts emitting discovered devices.
    async fn start_scan(&self) -> Result<(), BridgeError>;

    /// Stops a running scan. Idempotent.
    async fn stop_scan(&self) -> Result<(), BridgeError>;

    /// Opens the link to `device_id`, resolving once it is usable.
    async fn connect(&self, device_id: &DeviceId) -> Result<(), BridgeError>;

    /// Closes the link and cancels every task tied to it. Idempotent.
    async fn disconnect(&self, device_id: &DeviceId) -> Result<(), BridgeError>;

    /// Delivers a validated command to the connected device.
    async fn send_command(
        &self,
        device_id: &DeviceId,
        command: CommandType,
        payload: &Value,
    ) -> Result<(), BridgeError>;
}

/// Checks the payload a command requires.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidPayload`] when `SET_THRESHOLD` lacks a
/// numeric `threshold`.
pub fn validate_command(command: CommandType, payload: &Value) -> Result<(), BridgeError> {
    if command == CommandType::SetThreshold
        && !payload.get("threshold").is_some_and(Value::is_number)
    {
        return Err(BridgeError::InvalidPayload(
            "SET_THRESHOLD requires a numeric `threshold`".to_string(),
        ));
    }
    Ok(())
}

/// Bytes written to the command characteristic:
/// `{"command": "...", "payload": ...}`.
#[must_use]
pub fn encode_command(command: CommandType, payload: &Value) -> Vec<u8> {
    json!({ "command": command.as_str(), "payload": payload })
        .to_string()
        .into_bytes()
}
