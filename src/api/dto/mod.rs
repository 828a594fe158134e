//! Data Transfer Objects for REST request/response serialization.
//!
//! Field names are camelCase on the wire, matching the push-channel
//! envelopes.

pub mod command_dto;
pub mod common_dto;
pub mod device_dto;
pub mod event_dto;
pub mod reading_dto;

pub use command_dto::*;
pub use common_dto::*;
pub use device_dto::*;
pub use event_dto::*;
pub use reading_dto::*;
