//! Transport backed by the platform radio.
//!
//! The platform wireless stack is reached through the [`Radio`] trait: a
//! handful of async operations plus a stream of hardware callbacks.
//! [`RealTransport`] turns those callbacks into hub publications and
//! resolves `connect` when the radio reports the link state.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::hub::BridgeHub;
use super::notification::{DiscoveredDevice, Notification, TransportKind};
use super::transport::{DeviceTransport, encode_command};
use crate::domain::{CommandType, DeviceId};
use crate::error::BridgeError;

/// How long `connect` waits for the radio to report the link state.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Hardware callback delivered by a [`Radio`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioEvent {
    /// A scan result.
    Discovered(DiscoveredDevice),
    /// The link to a device came up or went down.
    ConnectionState {
        /// Device concerned.
        device_id: DeviceId,
        /// New link state.
        connected: bool,
    },
    /// Raw bytes from the notify characteristic.
    Notification {
        /// Sending device.
        device_id: DeviceId,
        /// Characteristic value.
        data: Vec<u8>,
    },
}

/// Platform wireless API.
///
/// Operations return once the platform accepted the request; link state
/// changes arrive later on [`Radio::events`].
#[async_trait]
pub trait Radio: Send + Sync + fmt::Debug {
    /// Starts a scan.
    async fn start_scan(&self) -> Result<(), BridgeError>;
    /// Stops the scan.
    async fn stop_scan(&self) -> Result<(), BridgeError>;
    /// Initiates a link to `device_id`.
    async fn connect(&self, device_id: &DeviceId) -> Result<(), BridgeError>;
    /// Enables notifications on the device's notify characteristic.
    async fn subscribe(&self, device_id: &DeviceId) -> Result<(), BridgeError>;
    /// Tears the link down.
    async fn disconnect(&self, device_id: &DeviceId) -> Result<(), BridgeError>;
    /// Writes `data` to the command characteristic, resolving on write
    /// completion.
    async fn write(&self, device_id: &DeviceId, data: Vec<u8>) -> Result<(), BridgeError>;
    /// Hardware callbacks. Called once, when the transport is built.
    fn events(&self) -> BoxStream<'static, RadioEvent>;
}

type Waiter = Arc<Mutex<Option<(DeviceId, oneshot::Sender<bool>)>>>;

fn lock(waiter: &Waiter) -> MutexGuard<'_, Option<(DeviceId, oneshot::Sender<bool>)>> {
    waiter.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transport driving a [`Radio`].
#[derive(Debug)]
pub struct RealTransport {
    radio: Arc<dyn Radio>,
    waiter: Waiter,
    pump: JoinHandle<()>,
}

impl RealTransport {
    /// Wraps `radio` and starts consuming its events.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(hub: Arc<BridgeHub>, radio: Arc<dyn Radio>) -> Self {
        let waiter: Waiter = Arc::new(Mutex::new(None));
        let pump = tokio::spawn(pump_events(radio.events(), hub, Arc::clone(&waiter)));
        Self {
            radio,
            waiter,
            pump,
        }
    }

    fn clear_waiter(&self, device_id: &DeviceId) {
        let mut waiter = lock(&self.waiter);
        if waiter.as_ref().is_some_and(|(id, _)| id == device_id) {
            *waiter = None;
        }
    }
}

impl Drop for RealTransport {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn pump_events(
    mut events: BoxStream<'static, RadioEvent>,
    hub: Arc<BridgeHub>,
    waiter: Waiter,
) {
    while let Some(event) = events.next().await {
        match event {
            RadioEvent::Discovered(device) => {
                hub.publish_discovered(&device);
            }
            RadioEvent::ConnectionState {
                device_id,
                connected,
            } => {
                let pending = {
                    let mut slot = lock(&waiter);
                    if slot.as_ref().is_some_and(|(id, _)| id == &device_id) {
                        slot.take()
                    } else {
                        None
                    }
                };
                match pending {
                    Some((_, tx)) => {
                        let _ = tx.send(connected);
                    }
                    None if !connected => {
                        if hub.release(&device_id) {
                            tracing::warn!(%device_id, "radio link lost");
                        }
                    }
                    None => {}
                }
            }
            RadioEvent::Notification { device_id, data } => {
                if !hub.holds(&device_id) {
                    tracing::debug!(%device_id, "notification from inactive device");
                    continue;
                }
                match Notification::from_bytes(&data) {
                    Ok(notification) => {
                        hub.publish_notification(&notification);
                    }
                    Err(e) => {
                        tracing::warn!(%device_id, error = %e, bytes = data.len(), "dropping malformed notification");
                    }
                }
            }
        }
    }
    tracing::debug!("radio event stream ended");
}

#[async_trait]
impl DeviceTransport for RealTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Real
    }

    async fn start_scan(&self) -> Result<(), BridgeError> {
        self.radio.start_scan().await
    }

    async fn stop_scan(&self) -> Result<(), BridgeError> {
        self.radio.stop_scan().await
    }

    async fn connect(&self, device_id: &DeviceId) -> Result<(), BridgeError> {
        let (tx, rx) = oneshot::channel();
        *lock(&self.waiter) = Some((device_id.clone(), tx));

        if let Err(e) = self.radio.connect(device_id).await {
            self.clear_waiter(device_id);
            return Err(e);
        }

        let connected = match tokio::time::timeout(CONNECT_TIMEOUT, rx).await {
            Ok(Ok(connected)) => connected,
            // Waiter cleared by `disconnect`; the caller sees the slot
            // released and reports the attempt as cancelled.
            Ok(Err(_)) => {
                tracing::debug!(%device_id, "connect cancelled before link state");
                return Ok(());
            }
            Err(_) => {
                self.clear_waiter(device_id);
                let _ = self.radio.disconnect(device_id).await;
                return Err(BridgeError::Transport(format!(
                    "no link state from {device_id} within {}s",
                    CONNECT_TIMEOUT.as_secs()
                )));
            }
        };
        if !connected {
            return Err(BridgeError::Transport(format!(
                "{device_id} refused the connection"
            )));
        }

        if let Err(e) = self.radio.subscribe(device_id).await {
            let _ = self.radio.disconnect(device_id).await;
            return Err(e);
        }
        Ok(())
    }

    async fn disconnect(&self, device_id: &DeviceId) -> Result<(), BridgeError> {
        self.clear_waiter(device_id);
        self.radio.disconnect(device_id).await
    }

    async fn send_command(
        &self,
        device_id: &DeviceId,
        command: CommandType,
        payload: &Value,
    ) -> Result<(), BridgeError> {
        tracing::debug!(%device_id, %command, "writing command");
        self.radio
            .write(device_id, encode_command(command, payload))
            .await
    }
}
