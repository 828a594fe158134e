//! Scriptable [`Radio`] for tests.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use tokio::sync::mpsc;

use super::notification::DiscoveredDevice;
use super::real::{Radio, RadioEvent};
use crate::domain::DeviceId;
use crate::error::BridgeError;

#[derive(Debug, Default)]
struct Log {
    subscribed: Vec<DeviceId>,
    writes: Vec<(DeviceId, Vec<u8>)>,
    disconnects: usize,
}

/// Radio whose callbacks are driven by the test.
#[derive(Debug)]
pub(crate) struct FakeRadio {
    tx: mpsc::UnboundedSender<RadioEvent>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<RadioEvent>>>,
    answer: Option<bool>,
    fail_writes: bool,
    deny_scan: bool,
    log: Mutex<Log>,
}

impl FakeRadio {
    fn build(answer: Option<bool>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
            answer,
            fail_writes: false,
            deny_scan: false,
            log: Mutex::new(Log::default()),
        }
    }

    /// Reports `connected` as the link state after every connect.
    pub(crate) fn answering(connected: bool) -> Self {
        Self::build(Some(connected))
    }

    /// Never reports a link state.
    pub(crate) fn silent() -> Self {
        Self::build(None)
    }

    pub(crate) fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub(crate) fn denying_scan(mut self) -> Self {
        self.deny_scan = true;
        self
    }

    fn log(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: RadioEvent) {
        let _ = self.tx.send(event);
    }

    pub(crate) fn notify(&self, device_id: &DeviceId, data: &[u8]) {
        self.emit(RadioEvent::Notification {
            device_id: device_id.clone(),
            data: data.to_vec(),
        });
    }

    pub(crate) fn subscribed(&self) -> Vec<DeviceId> {
        self.log().subscribed.clone()
    }

    pub(crate) fn writes(&self) -> Vec<(DeviceId, Vec<u8>)> {
        self.log().writes.clone()
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.log().disconnects
    }
}

#[async_trait]
impl Radio for FakeRadio {
    async fn start_scan(&self) -> Result<(), BridgeError> {
        if self.deny_scan {
            return Err(BridgeError::PermissionDenied);
        }
        self.emit(RadioEvent::Discovered(DiscoveredDevice {
            id: DeviceId::from("AA:BB:CC:DD:EE:10"),
            name: "SmartLab-Bench".to_string(),
            rssi: -50,
        }));
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), BridgeError> {
        Ok(())
    }

    async fn connect(&self, device_id: &DeviceId) -> Result<(), BridgeError> {
        if let Some(connected) = self.answer {
            self.emit(RadioEvent::ConnectionState {
                device_id: device_id.clone(),
                connected,
            });
        }
        Ok(())
    }

    async fn subscribe(&self, device_id: &DeviceId) -> Result<(), BridgeError> {
        self.log().subscribed.push(device_id.clone());
        Ok(())
    }

    async fn disconnect(&self, _device_id: &DeviceId) -> Result<(), BridgeError> {
        self.log().disconnects += 1;
        Ok(())
    }

    async fn write(&self, device_id: &DeviceId, data: Vec<u8>) -> Result<(), BridgeError> {
        if self.fail_writes {
            return Err(BridgeError::WriteFailed("characteristic busy".to_string()));
        }
        self.log().writes.push((device_id.clone(), data));
        Ok(())
    }

    fn events(&self) -> BoxStream<'static, RadioEvent> {
        let rx = self.rx.lock().unwrap_or_else(PoisonError::into_inner).take();
        match rx {
            Some(rx) => stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|event| (event, rx))
            })
            .boxed(),
            None => stream::empty().boxed(),
        }
    }
}
