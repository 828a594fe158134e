//! Service layer: business logic orchestration.
//!
//! [`TelemetryService`] records device readings, events and commands
//! through the [`crate::persistence::RecordStore`] and relays them to
//! observers through the [`crate::ws::ConnectionRegistry`].

pub mod telemetry_service;

pub use telemetry_service::TelemetryService;
