//! Operator commands sent toward devices and the command log record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::DeviceId;

/// Commands a device understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    /// Turn the LED on.
    LedOn,
    /// Turn the LED off.
    LedOff,
    /// Switch to automatic mode.
    ModeAuto,
    /// Switch to manual mode.
    ModeManual,
    /// Update the alarm threshold; payload carries `threshold`.
    SetThreshold,
    /// Halt all actuators.
    EmergencyStop,
}

impl CommandType {
    /// Every command type, in wire order.
    pub const ALL: [Self; 6] = [
        Self::LedOn,
        Self::LedOff,
        Self::ModeAuto,
        Self::ModeManual,
        Self::SetThreshold,
        Self::EmergencyStop,
    ];

    /// Returns the wire name of the command.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LedOn => "LED_ON",
            Self::LedOff => "LED_OFF",
            Self::ModeAuto => "MODE_AUTO",
            Self::ModeManual => "MODE_MANUAL",
            Self::SetThreshold => "SET_THRESHOLD",
            Self::EmergencyStop => "EMERGENCY_STOP",
        }
    }

    /// Comma-separated list of valid wire names, for error messages.
    #[must_use]
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(CommandType::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown command type: {s}"))
    }
}

/// Delivery status of a logged command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    /// Command was issued.
    Sent,
    /// Device confirmed the command.
    Acknowledged,
    /// Delivery failed.
    Failed,
}

/// Audit record of a command issued to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandLog {
    /// Target device.
    pub device_id: DeviceId,
    /// Command that was issued.
    pub command_type: CommandType,
    /// Command arguments.
    pub payload: serde_json::Value,
    /// Delivery status.
    pub status: CommandStatus,
    /// Time the command was logged.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_and_unknown() {
        assert_eq!("LED_ON".parse::<CommandType>(), Ok(CommandType::LedOn));
        assert_eq!(
            "EMERGENCY_STOP".parse::<CommandType>(),
            Ok(CommandType::EmergencyStop)
        );
        assert!("led_on".parse::<CommandType>().is_err());
    }

    #[test]
    fn valid_names_lists_all() {
        let names = CommandType::valid_names();
        assert!(names.starts_with("LED_ON, LED_OFF"));
        assert!(names.ends_with("EMERGENCY_STOP"));
    }
}
