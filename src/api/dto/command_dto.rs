//! Command log DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{CommandLog, CommandStatus, CommandType};
use crate::persistence::{Page, Paged, Stored};

/// Request body for `POST /devices/{id}/commands`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommandRequest {
    /// Command wire name, e.g. `LED_ON`.
    pub command_type: Option<String>,
    /// Command arguments; must be an object when present.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// A logged command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommandDto {
    /// Store-assigned id.
    pub id: u64,
    /// Target device.
    pub device_id: String,
    /// Command type.
    pub command_type: CommandType,
    /// Command arguments.
    pub payload: serde_json::Value,
    /// Delivery status.
    pub status: CommandStatus,
    /// Log time.
    pub created_at: DateTime<Utc>,
}

impl From<Stored<CommandLog>> for CommandDto {
    fn from(stored: Stored<CommandLog>) -> Self {
        let Stored { id, record } = stored;
        Self {
            id,
            device_id: record.device_id.to_string(),
            command_type: record.command_type,
            payload: record.payload,
            status: record.status,
            created_at: record.created_at,
        }
    }
}

/// Response body for `GET /devices/{id}/commands`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CommandListResponse {
    /// Commands, newest first.
    pub commands: Vec<CommandDto>,
    /// Total commands for the device.
    pub total: usize,
    /// Applied page size.
    pub limit: usize,
    /// Applied offset.
    pub offset: usize,
}

impl CommandListResponse {
    /// Builds the response for one page.
    #[must_use]
    pub fn new(paged: Paged<CommandLog>, page: Page) -> Self {
        Self {
            commands: paged.items.into_iter().map(CommandDto::from).collect(),
            total: paged.total,
            limit: page.limit,
            offset: page.offset,
        }
    }
}
