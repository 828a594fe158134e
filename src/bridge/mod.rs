//! Device bridge: one connection to a sensor device over either the
//! platform radio or a simulated transport.
//!
//! [`DeviceBridge`] is the entry point. Transports implement
//! [`DeviceTransport`] and publish through a shared [`BridgeHub`].

pub mod device_bridge;
pub mod hub;
pub mod notification;
pub mod real;
pub mod simulated;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_radio;

pub use device_bridge::DeviceBridge;
pub use hub::{BridgeHub, Claim};
pub use notification::{
    BridgeConnection, ConnectionChange, DiscoveredDevice, Notification, TransportKind,
};
pub use real::{Radio, RadioEvent, RealTransport};
pub use simulated::SimulatedTransport;
pub use transport::DeviceTransport;
