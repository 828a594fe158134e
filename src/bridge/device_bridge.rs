//! The device bridge facade.

use std::sync::Arc;

use serde_json::Value;

use super::hub::{BridgeHub, Claim};
use super::notification::{ConnectionChange, DiscoveredDevice, Notification, TransportKind};
use super::real::{Radio, RealTransport};
use super::simulated::SimulatedTransport;
use super::transport::{DeviceTransport, validate_command};
use crate::config::{BridgeConfig, BridgeMode, SimulationConfig};
use crate::domain::{CommandType, DeviceId};
use crate::error::BridgeError;
use crate::fanout::Subscription;

/// Releases a pending claim if `connect` is abandoned mid-flight.
struct PendingClaim<'a> {
    hub: &'a BridgeHub,
    device_id: &'a DeviceId,
    armed: bool,
}

impl Drop for PendingClaim<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.hub.release(self.device_id);
        }
    }
}

/// Scans for, connects to and commands one device at a time.
///
/// The transport variant is fixed at construction. Subscribers register
/// on the bridge and receive the same callbacks whichever variant is in
/// use.
#[derive(Debug)]
pub struct DeviceBridge {
    hub: Arc<BridgeHub>,
    transport: Arc<dyn DeviceTransport>,
}

impl DeviceBridge {
    /// Builds a bridge over the simulated transport.
    #[must_use]
    pub fn simulated(config: SimulationConfig) -> Self {
        let hub = Arc::new(BridgeHub::new(TransportKind::Simulated));
        let transport = Arc::new(SimulatedTransport::new(Arc::clone(&hub), config));
        Self { hub, transport }
    }

    /// Builds a bridge over the platform radio.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn real(radio: Arc<dyn Radio>) -> Self {
        let hub = Arc::new(BridgeHub::new(TransportKind::Real));
        let transport = Arc::new(RealTransport::new(Arc::clone(&hub), radio));
        Self { hub, transport }
    }

    /// Builds the variant `config` asks for.
    ///
    /// Real mode without a radio falls back to the simulated transport.
    #[must_use]
    pub fn from_config(config: &BridgeConfig, radio: Option<Arc<dyn Radio>>) -> Self {
        match (config.mode, radio) {
            (BridgeMode::Real, Some(radio)) => Self::real(radio),
            (BridgeMode::Real, None) => {
                tracing::warn!("radio unavailable; falling back to simulated transport");
                Self::simulated(config.simulation)
            }
            (BridgeMode::Simulated, _) => Self::simulated(config.simulation),
        }
    }

    /// Starts a scan; results go to discovery handlers.
    ///
    /// # Errors
    ///
    /// Returns the transport's error, e.g. [`BridgeError::PermissionDenied`].
    pub async fn scan(&self) -> Result<(), BridgeError> {
        self.transport.start_scan().await
    }

    /// Stops a running scan.
    ///
    /// # Errors
    ///
    /// Returns the transport's error.
    pub async fn stop_scan(&self) -> Result<(), BridgeError> {
        self.transport.stop_scan().await
    }

    /// Connects to `device_id`.
    ///
    /// Returns `Ok(true)` once connected, immediately if already connected
    /// to the same device. Returns `Ok(false)` if [`DeviceBridge::disconnect`]
    /// cancelled the attempt.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Busy`] if another device holds the bridge,
    /// or the transport's error if the link cannot be opened.
    pub async fn connect(&self, device_id: impl Into<DeviceId>) -> Result<bool, BridgeError> {
        let device_id = device_id.into();
        if self.hub.claim(&device_id)? == Claim::AlreadyConnected {
            tracing::debug!(%device_id, "already connected");
            return Ok(true);
        }

        let mut claim = PendingClaim {
            hub: &self.hub,
            device_id: &device_id,
            armed: true,
        };
        if let Err(e) = self.transport.connect(&device_id).await {
            tracing::warn!(%device_id, error = %e, "connect failed");
            return Err(e);
        }
        claim.armed = false;

        if self.hub.mark_connected(&device_id) {
            return Ok(true);
        }
        tracing::info!(%device_id, "connect cancelled by disconnect");
        if let Err(e) = self.transport.disconnect(&device_id).await {
            tracing::warn!(%device_id, error = %e, "failed to close cancelled link");
        }
        Ok(false)
    }

    /// Disconnects `device_id` and cancels every task tied to its link.
    ///
    /// A no-op unless `device_id` is the active or pending device.
    ///
    /// # Errors
    ///
    /// Returns the transport's error. The bridge is released either way.
    pub async fn disconnect(&self, device_id: impl Into<DeviceId>) -> Result<(), BridgeError> {
        let device_id = device_id.into();
        if !self.hub.holds(&device_id) {
            tracing::debug!(%device_id, "not connected; nothing to disconnect");
            return Ok(());
        }
        let result = self.transport.disconnect(&device_id).await;
        self.hub.release(&device_id);
        result
    }

    /// Sends `command` to the connected device.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotConnected`] with no active connection,
    /// [`BridgeError::InvalidPayload`] if the payload lacks a required
    /// field, or the transport's error.
    pub async fn send_command(
        &self,
        command: CommandType,
        payload: Value,
    ) -> Result<(), BridgeError> {
        let device_id = self
            .hub
            .connected_device()
            .ok_or(BridgeError::NotConnected)?;
        validate_command(command, &payload)?;
        self.transport.send_command(&device_id, command, &payload).await
    }

    /// Sends a command given by its wire name.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownCommand`] for a name the bridge does
    /// not understand, otherwise as [`DeviceBridge::send_command`].
    pub async fn send_raw_command(&self, command: &str, payload: Value) -> Result<(), BridgeError> {
        let parsed = command
            .parse::<CommandType>()
            .map_err(|_| BridgeError::UnknownCommand(command.to_string()))?;
        self.send_command(parsed, payload).await
    }

    /// Registers a discovery handler.
    pub fn on_device_discovered<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&DiscoveredDevice) + Send + Sync + 'static,
    {
        self.hub.on_device_discovered(handler)
    }

    /// Registers a notification handler.
    pub fn on_notification<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.hub.on_notification(handler)
    }

    /// Registers a connection-change handler.
    pub fn on_connection_state_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ConnectionChange) + Send + Sync + 'static,
    {
        self.hub.on_connection_state_changed(handler)
    }

    /// Returns `true` while a device is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.hub.connected_device().is_some()
    }

    /// The connected device, if any.
    #[must_use]
    pub fn connected_device(&self) -> Option<DeviceId> {
        self.hub.connected_device()
    }

    /// Transport variant in use.
    #[must_use]
    pub fn transport_kind(&self) -> TransportKind {
        self.transport.kind()
    }
}
