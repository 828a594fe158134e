//! # smartlab-relay
//!
//! Real-time telemetry relay for SmartLab sensor devices, with a
//! reconnecting observer client and a device bridge.
//!
//! Devices (or the bridge on their behalf) post readings and events over
//! HTTP. The relay records them and pushes each one to the observers
//! subscribed to that device over a WebSocket push channel.
//!
//! ## Architecture
//!
//! ```text
//! Devices ──HTTP──▶ REST Handlers (api/)
//!                        │
//!                   TelemetryService (service/) ──▶ RecordStore (persistence/)
//!                        │
//!                   ConnectionRegistry (ws/) ◀── LivenessSweeper
//!                        │
//! Observers ◀──WS── one session per socket, bound to one device
//!
//! ObserverClient (client/)   reconnecting consumer of the push channel
//! DeviceBridge (bridge/)     real or simulated device link
//! ```

pub mod api;
pub mod app_state;
pub mod bridge;
pub mod client;
pub mod config;
pub mod domain;
pub mod error;
pub mod fanout;
pub mod persistence;
pub mod service;
pub mod ws;
