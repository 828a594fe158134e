//! WebSocket layer: observer sessions, routed broadcast, liveness.
//!
//! The push-channel endpoint at `/ws` accepts observers, binds them to a
//! device on `subscribe`, and relays that device's telemetry to them.

pub mod connection;
pub mod handler;
pub mod registry;
pub mod sweeper;

pub use registry::{ConnectionRegistry, Outbound, SessionId, SweepReport};
pub use sweeper::{LivenessSweeper, SweeperHandle};
