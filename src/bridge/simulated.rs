//! Synthetic transport for development and tests.
//!
//! Scanning walks a fixed roster, connecting succeeds after a fixed delay
//! and then a generator emits `sensor_reading` notifications on a steady
//! cadence. Commands produce the same state-change notifications a real
//! device would send. Every task belongs to the active link and is
//! aborted when the link goes away.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::hub::BridgeHub;
use super::notification::{
    DiscoveredDevice, Notification, SENSOR_READING, THRESHOLD_CHANGED, TransportKind,
};
use super::transport::DeviceTransport;
use crate::config::SimulationConfig;
use crate::domain::{CommandType, DeviceId, EventType};
use crate::error::BridgeError;

/// Devices reported by a simulated scan: `(address, name, base rssi)`.
pub const ROSTER: [(&str, &str, i16); 3] = [
    ("AA:BB:CC:DD:EE:01", "SmartLab-001", -45),
    ("AA:BB:CC:DD:EE:02", "SmartLab-002", -62),
    ("AA:BB:CC:DD:EE:03", "SmartLab-Sensor", -78),
];

/// Range of the synthetic temperature, °C.
pub const TEMPERATURE_RANGE: (f64, f64) = (22.0, 30.0);
/// Range of the synthetic relative humidity, %.
pub const HUMIDITY_RANGE: (f64, f64) = (40.0, 60.0);

/// Actuator state of one simulated device.
#[derive(Debug, Clone, Copy, PartialEq)]
struct DeviceState {
    led_on: bool,
    manual: bool,
    threshold: Option<f64>,
}

impl DeviceState {
    fn new() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            led_on: rng.gen_bool(0.5),
            manual: rng.gen_bool(0.5),
            threshold: None,
        }
    }

    fn apply(&mut self, command: CommandType, payload: &Value) {
        match command {
            CommandType::LedOn => self.led_on = true,
            CommandType::LedOff => self.led_on = false,
            CommandType::ModeAuto => self.manual = false,
            CommandType::ModeManual => self.manual = true,
            CommandType::SetThreshold => {
                self.threshold = payload.get("threshold").and_then(Value::as_f64);
            }
            CommandType::EmergencyStop => {}
        }
    }

    const fn mode(&self) -> &'static str {
        if self.manual { "MANUAL" } else { "AUTO" }
    }
}

#[derive(Debug)]
struct Link {
    device_id: DeviceId,
    state: Arc<Mutex<DeviceState>>,
    generator: JoinHandle<()>,
    pending: Vec<JoinHandle<()>>,
}

impl Link {
    fn abort(self) {
        self.generator.abort();
        for task in self.pending {
            task.abort();
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    scan: Option<JoinHandle<()>>,
    link: Option<Link>,
}

/// Transport that fabricates devices, links and notifications.
#[derive(Debug)]
pub struct SimulatedTransport {
    hub: Arc<BridgeHub>,
    config: SimulationConfig,
    state: Mutex<SimState>,
}

impl SimulatedTransport {
    /// Creates a transport publishing through `hub`.
    #[must_use]
    pub fn new(hub: Arc<BridgeHub>, config: SimulationConfig) -> Self {
        Self {
            hub,
            config: config.with_periods_clamped(),
            state: Mutex::new(SimState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for SimulatedTransport {
    fn drop(&mut self) {
        let state = std::mem::take(&mut *self.state());
        if let Some(scan) = state.scan {
            scan.abort();
        }
        if let Some(link) = state.link {
            link.abort();
        }
    }
}

/// The notification a device sends back after `command`, if any.
#[must_use]
pub fn synthesize_response(command: CommandType, payload: &Value) -> Option<Notification> {
    let (kind, body) = match command {
        CommandType::LedOn => (EventType::LedStateChanged.as_str(), json!({ "state": true })),
        CommandType::LedOff => (EventType::LedStateChanged.as_str(), json!({ "state": false })),
        CommandType::ModeAuto => (EventType::ModeChanged.as_str(), json!({ "mode": "AUTO" })),
        CommandType::ModeManual => (EventType::ModeChanged.as_str(), json!({ "mode": "MANUAL" })),
        CommandType::SetThreshold => (
            THRESHOLD_CHANGED,
            json!({ "threshold": payload.get("threshold").cloned().unwrap_or(Value::Null) }),
        ),
        CommandType::EmergencyStop => return None,
    };
    Some(Notification::new(kind, body))
}

fn sample_reading(state: &DeviceState) -> Notification {
    let mut rng = rand::thread_rng();
    let (t_lo, t_hi) = TEMPERATURE_RANGE;
    let (h_lo, h_hi) = HUMIDITY_RANGE;
    Notification::new(
        SENSOR_READING,
        json!({
            "temperature": rng.gen_range(t_lo..=t_hi),
            "humidity": rng.gen_range(h_lo..=h_hi),
            "ledState": state.led_on,
            "mode": state.mode(),
            "timestamp": Utc::now().to_rfc3339(),
        }),
    )
}

fn jittered(rssi: i16) -> i16 {
    rssi + rand::thread_rng().gen_range(-5..5)
}

#[async_trait]
impl DeviceTransport for SimulatedTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Simulated
    }

    async fn start_scan(&self) -> Result<(), BridgeError> {
        let hub = Arc::clone(&self.hub);
        let period = self.config.scan_interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            for (id, name, rssi) in ROSTER {
                ticker.tick().await;
                hub.publish_discovered(&DiscoveredDevice {
                    id: DeviceId::from(id),
                    name: name.to_string(),
                    rssi: jittered(rssi),
                });
            }
            tracing::debug!("simulated scan finished");
        });
        if let Some(previous) = self.state().scan.replace(task) {
            previous.abort();
        }
        tracing::info!("simulated scan started");
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), BridgeError> {
        if let Some(task) = self.state().scan.take() {
            task.abort();
            tracing::info!("simulated scan stopped");
        }
        Ok(())
    }

    async fn connect(&self, device_id: &DeviceId) -> Result<(), BridgeError> {
        tracing::debug!(
            %device_id,
            delay = ?self.config.connect_delay,
            "simulated connect"
        );
        tokio::time::sleep(self.config.connect_delay).await;

        let state = Arc::new(Mutex::new(DeviceState::new()));
        let hub = Arc::clone(&self.hub);
        let device = Arc::clone(&state);
        let period = self.config.notification_interval;
        let generator = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let snapshot = *device.lock().unwrap_or_else(PoisonError::into_inner);
                hub.publish_notification(&sample_reading(&snapshot));
            }
        });

        let link = Link {
            device_id: device_id.clone(),
            state,
            generator,
            pending: Vec::new(),
        };
        if let Some(previous) = self.state().link.replace(link) {
            previous.abort();
        }
        Ok(())
    }

    async fn disconnect(&self, device_id: &DeviceId) -> Result<(), BridgeError> {
        let link = {
            let mut state = self.state();
            match state.link.as_ref() {
                Some(link) if &link.device_id == device_id => state.link.take(),
                _ => None,
            }
        };
        if let Some(link) = link {
            link.abort();
            tracing::debug!(%device_id, "simulated link closed");
        }
        Ok(())
    }

    async fn send_command(
        &self,
        device_id: &DeviceId,
        command: CommandType,
        payload: &Value,
    ) -> Result<(), BridgeError> {
        let mut state = self.state();
        let Some(link) = state.link.as_mut().filter(|l| &l.device_id == device_id) else {
            return Err(BridgeError::NotConnected);
        };

        link.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(command, payload);
        tracing::debug!(%device_id, %command, "simulated command");

        if let Some(response) = synthesize_response(command, payload) {
            let hub = Arc::clone(&self.hub);
            let delay = self.config.command_delay;
            link.pending.retain(|task| !task.is_finished());
            link.pending.push(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                hub.publish_notification(&response);
            }));
        }
        Ok(())
    }
}
