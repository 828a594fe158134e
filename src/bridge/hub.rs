//! Shared state behind a device bridge.
//!
//! The hub owns the three callback registries and the single
//! [`BridgeConnection`] slot. Both transports publish through it, so
//! subscribers see identical behaviour whichever variant is in use.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::notification::{
    BridgeConnection, ConnectionChange, DiscoveredDevice, Notification, TransportKind,
};
use crate::domain::DeviceId;
use crate::error::BridgeError;
use crate::fanout::{HandlerSet, Subscription};

/// Outcome of [`BridgeHub::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    /// The slot was free and is now reserved for the device.
    Claimed,
    /// The device is already connected; nothing to do.
    AlreadyConnected,
}

/// Callback registries and connection slot shared by bridge and transport.
#[derive(Debug)]
pub struct BridgeHub {
    kind: TransportKind,
    discovered: HandlerSet<DiscoveredDevice>,
    notifications: HandlerSet<Notification>,
    connection_changes: HandlerSet<ConnectionChange>,
    connection: Mutex<Option<BridgeConnection>>,
}

impl BridgeHub {
    /// Creates a hub for a bridge built on `kind`.
    #[must_use]
    pub fn new(kind: TransportKind) -> Self {
        Self {
            kind,
            discovered: HandlerSet::new(),
            notifications: HandlerSet::new(),
            connection_changes: HandlerSet::new(),
            connection: Mutex::new(None),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<BridgeConnection>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transport variant this hub serves.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Snapshot of the current connection slot.
    #[must_use]
    pub fn connection(&self) -> Option<BridgeConnection> {
        self.slot().clone()
    }

    /// Device of the established connection, if any.
    #[must_use]
    pub fn connected_device(&self) -> Option<DeviceId> {
        self.slot()
            .as_ref()
            .filter(|c| c.connected)
            .map(|c| c.device_id.clone())
    }

    /// Returns `true` if `device_id` holds the slot, connected or not.
    #[must_use]
    pub fn holds(&self, device_id: &DeviceId) -> bool {
        self.slot().as_ref().is_some_and(|c| &c.device_id == device_id)
    }

    /// Reserves the connection slot for `device_id`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Busy`] if the slot is held by another device,
    /// or by the same device whose connect is still in flight.
    pub fn claim(&self, device_id: &DeviceId) -> Result<Claim, BridgeError> {
        let mut slot = self.slot();
        match slot.as_ref() {
            None => {
                *slot = Some(BridgeConnection {
                    device_id: device_id.clone(),
                    transport: self.kind,
                    connected: false,
                });
                Ok(Claim::Claimed)
            }
            Some(active) if &active.device_id == device_id && active.connected => {
                Ok(Claim::AlreadyConnected)
            }
            Some(active) => Err(BridgeError::Busy {
                active: active.device_id.clone(),
                requested: device_id.clone(),
            }),
        }
    }

    /// Promotes a claimed slot to connected and notifies subscribers.
    ///
    /// Returns `false` if the claim was released in the meantime.
    pub fn mark_connected(&self, device_id: &DeviceId) -> bool {
        {
            let mut slot = self.slot();
            match slot.as_mut() {
                Some(active) if &active.device_id == device_id => {
                    if active.connected {
                        return true;
                    }
                    active.connected = true;
                }
                _ => return false,
            }
        }
        tracing::info!(%device_id, transport = %self.kind, "device connected");
        self.connection_changes.emit(&ConnectionChange {
            device_id: device_id.clone(),
            connected: true,
        });
        true
    }

    /// Frees the slot if `device_id` holds it.
    ///
    /// Subscribers are notified only if the device had been connected.
    /// Returns `true` if the slot was held by the device.
    pub fn release(&self, device_id: &DeviceId) -> bool {
        let was_connected = {
            let mut slot = self.slot();
            match slot.as_ref() {
                Some(active) if &active.device_id == device_id => {
                    let connected = active.connected;
                    *slot = None;
                    connected
                }
                _ => return false,
            }
        };
        if was_connected {
            tracing::info!(%device_id, transport = %self.kind, "device disconnected");
            self.connection_changes.emit(&ConnectionChange {
                device_id: device_id.clone(),
                connected: false,
            });
        }
        true
    }

    /// Delivers a scan result to every discovery handler.
    pub fn publish_discovered(&self, device: &DiscoveredDevice) -> usize {
        self.discovered.emit(device)
    }

    /// Delivers a notification to every notification handler.
    pub fn publish_notification(&self, notification: &Notification) -> usize {
        tracing::trace!(kind = %notification.kind, "device notification");
        self.notifications.emit(notification)
    }

    /// Registers a discovery handler.
    pub fn on_device_discovered<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&DiscoveredDevice) + Send + Sync + 'static,
    {
        self.discovered.register(handler)
    }

    /// Registers a notification handler.
    pub fn on_notification<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.notifications.register(handler)
    }

    /// Registers a connection-change handler.
    pub fn on_connection_state_changed<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ConnectionChange) + Send + Sync + 'static,
    {
        self.connection_changes.register(handler)
    }
}
