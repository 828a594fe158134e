//! Telemetry service: records device traffic and fans it out to observers.

use std::sync::Arc;

use chrono::Utc;

use crate::domain::{
    CommandLog, CommandStatus, CommandType, Device, DeviceEvent, DeviceId, Envelope, EventType,
    Reading,
};
use crate::error::RelayError;
use crate::persistence::{Page, Paged, RecordStore, Stored};
use crate::ws::ConnectionRegistry;

/// Orchestration layer between the ingest routes, the record store and
/// the connection registry.
///
/// Every write follows the same pattern: validate → check the device is
/// registered → record → broadcast → return the stored record. Broadcast
/// happens only after the store accepted the record.
#[derive(Debug, Clone)]
pub struct TelemetryService {
    store: Arc<dyn RecordStore>,
    registry: Arc<ConnectionRegistry>,
}

impl TelemetryService {
    /// Creates a new `TelemetryService`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Returns the connection registry the service broadcasts through.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Adds a device to the catalog under a fresh UUID.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] for a blank name, or a store
    /// error.
    pub async fn register_device(
        &self,
        name: &str,
        firmware_version: Option<String>,
    ) -> Result<Device, RelayError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RelayError::InvalidRequest("device name is required".to_string()));
        }
        let device = self
            .store
            .create_device(Device::register(name, firmware_version))
            .await?;
        tracing::info!(device_id = %device.id, name = %device.name, "device registered");
        Ok(device)
    }

    /// Lists the catalog, most recently registered first.
    ///
    /// # Errors
    ///
    /// Propagates store errors.
    pub async fn devices(&self) -> Result<Vec<Device>, RelayError> {
        self.store.list_devices().await
    }

    /// Returns a registered device.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::DeviceNotFound`] for an unknown id.
    pub async fn device(&self, device_id: &DeviceId) -> Result<Device, RelayError> {
        self.store
            .get_device(device_id)
            .await?
            .ok_or_else(|| RelayError::DeviceNotFound(device_id.clone()))
    }

    /// Records a reading and relays it to the device's observers.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] for a blank device id or
    /// non-finite values, [`RelayError::DeviceNotFound`] for an unknown
    /// device, or a store error.
    pub async fn record_reading(
        &self,
        device_id: DeviceId,
        temperature: f64,
        humidity: f64,
    ) -> Result<Stored<Reading>, RelayError> {
        ensure_device(&device_id)?;
        if !temperature.is_finite() || !humidity.is_finite() {
            return Err(RelayError::InvalidRequest(
                "temperature and humidity must be finite numbers".to_string(),
            ));
        }
        self.device(&device_id).await?;

        let stored = self
            .store
            .create_reading(Reading::now(device_id.clone(), temperature, humidity))
            .await?;
        self.store.touch_device(&device_id).await?;

        let reached = self
            .registry
            .broadcast(&device_id, &Envelope::Reading(stored.record.clone()))
            .await;
        tracing::info!(%device_id, temperature, humidity, reached, "reading recorded");
        Ok(stored)
    }

    /// Records a device event and relays it to the device's observers.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] for a blank device id or a
    /// non-object payload, [`RelayError::DeviceNotFound`] for an unknown
    /// device, or a store error.
    pub async fn record_event(
        &self,
        device_id: DeviceId,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<Stored<DeviceEvent>, RelayError> {
        ensure_device(&device_id)?;
        let payload = normalize_payload(payload)?;
        self.device(&device_id).await?;

        let stored = self
            .store
            .create_event(DeviceEvent::now(device_id.clone(), event_type, payload))
            .await?;
        self.store.touch_device(&device_id).await?;

        let reached = self
            .registry
            .broadcast(&device_id, &Envelope::DeviceEvent(stored.record.clone()))
            .await;
        tracing::info!(%device_id, %event_type, reached, "device event recorded");
        Ok(stored)
    }

    /// Appends an operator command to the command log.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] for a blank device id or a
    /// non-object payload, [`RelayError::DeviceNotFound`] for an unknown
    /// device, or a store error.
    pub async fn log_command(
        &self,
        device_id: DeviceId,
        command_type: CommandType,
        payload: serde_json::Value,
    ) -> Result<Stored<CommandLog>, RelayError> {
        ensure_device(&device_id)?;
        let payload = normalize_payload(payload)?;
        self.device(&device_id).await?;

        let stored = self
            .store
            .create_command(CommandLog {
                device_id: device_id.clone(),
                command_type,
                payload,
                status: CommandStatus::Sent,
                created_at: Utc::now(),
            })
            .await?;
        tracing::info!(%device_id, %command_type, "command logged");
        Ok(stored)
    }

    /// Lists readings for a device, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::DeviceNotFound`] for an unknown device, or a
    /// store error.
    pub async fn readings(
        &self,
        device_id: &DeviceId,
        page: Page,
    ) -> Result<Paged<Reading>, RelayError> {
        self.device(device_id).await?;
        self.store.list_readings(device_id, page).await
    }

    /// Returns the latest reading for a device.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::DeviceNotFound`] for an unknown device, or
    /// [`RelayError::NoReadings`] if the device has none.
    pub async fn latest_reading(&self, device_id: &DeviceId) -> Result<Stored<Reading>, RelayError> {
        self.device(device_id).await?;
        self.store
            .latest_reading(device_id)
            .await?
            .ok_or_else(|| RelayError::NoReadings(device_id.clone()))
    }

    /// Lists events for a device, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::DeviceNotFound`] for an unknown device, or a
    /// store error.
    pub async fn events(
        &self,
        device_id: &DeviceId,
        page: Page,
    ) -> Result<Paged<DeviceEvent>, RelayError> {
        self.device(device_id).await?;
        self.store.list_events(device_id, page).await
    }

    /// Lists logged commands for a device, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::DeviceNotFound`] for an unknown device, or a
    /// store error.
    pub async fn commands(
        &self,
        device_id: &DeviceId,
        page: Page,
    ) -> Result<Paged<CommandLog>, RelayError> {
        self.device(device_id).await?;
        self.store.list_commands(device_id, page).await
    }
}

fn ensure_device(device_id: &DeviceId) -> Result<(), RelayError> {
    if device_id.is_blank() {
        return Err(RelayError::InvalidRequest("device id is required".to_string()));
    }
    Ok(())
}

/// `null` becomes `{}`; anything else must already be an object.
fn normalize_payload(payload: serde_json::Value) -> Result<serde_json::Value, RelayError> {
    match payload {
        serde_json::Value::Null => Ok(crate::domain::telemetry::empty_object()),
        serde_json::Value::Object(_) => Ok(payload),
        _ => Err(RelayError::InvalidRequest(
            "payload must be a JSON object".to_string(),
        )),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::{InMemoryStore, SEED_DEVICES};
    use crate::ws::Outbound;

    fn service() -> TelemetryService {
        TelemetryService::new(
            Arc::new(InMemoryStore::seeded()),
            Arc::new(ConnectionRegistry::new(8)),
        )
    }

    fn bench() -> DeviceId {
        let [(id, _, _), _] = SEED_DEVICES;
        DeviceId::from(id)
    }

    #[tokio::test]
    async fn reading_is_stored_then_broadcast() {
        let svc = service();
        let dev = bench();
        let (id, mut rx) = svc.registry().on_open().await;
        svc.registry()
            .on_message(id, &format!(r#"{{"type":"subscribe","deviceId":"{dev}"}}"#))
            .await;
        let _ack = rx.try_recv();

        let Ok(stored) = svc.record_reading(dev.clone(), 24.0, 48.0).await else {
            panic!("record failed");
        };
        assert_eq!(stored.record.temperature, 24.0);

        let Ok(Outbound::Text(json)) = rx.try_recv() else {
            panic!("subscriber should receive the reading");
        };
        assert!(json.contains(r#""type":"reading""#));
        assert!(json.contains(&format!(r#""deviceId":"{dev}""#)));
    }

    #[tokio::test]
    async fn non_finite_reading_rejected_without_broadcast() {
        let svc = service();
        let result = svc.record_reading(bench(), f64::NAN, 50.0).await;
        assert!(matches!(result, Err(RelayError::InvalidRequest(_))));
        assert!(matches!(
            svc.latest_reading(&bench()).await,
            Err(RelayError::NoReadings(_))
        ));
    }

    #[tokio::test]
    async fn event_payload_must_be_object() {
        let svc = service();
        let bad = svc
            .record_event(bench(), EventType::ModeChanged, serde_json::json!([1, 2]))
            .await;
        assert!(matches!(bad, Err(RelayError::InvalidRequest(_))));

        let Ok(ok) = svc
            .record_event(bench(), EventType::ButtonPressed, serde_json::Value::Null)
            .await
        else {
            panic!("null payload should be accepted");
        };
        assert!(ok.record.payload.is_object());
    }

    #[tokio::test]
    async fn command_log_defaults_to_sent() {
        let svc = service();
        let Ok(cmd) = svc
            .log_command(
                bench(),
                CommandType::SetThreshold,
                serde_json::json!({"threshold": 28}),
            )
            .await
        else {
            panic!("log failed");
        };
        assert_eq!(cmd.record.status, CommandStatus::Sent);
        let Ok(page) = svc.commands(&bench(), Page::default()).await else {
            panic!("list failed");
        };
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn blank_device_rejected() {
        let svc = service();
        let result = svc.record_reading(DeviceId::from(""), 1.0, 1.0).await;
        assert!(matches!(result, Err(RelayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn unknown_device_is_not_recorded_or_broadcast() {
        let svc = service();
        let ghost = DeviceId::from("ghost");
        let (id, mut rx) = svc.registry().on_open().await;
        svc.registry()
            .on_message(id, r#"{"type":"subscribe","deviceId":"ghost"}"#)
            .await;
        let _ack = rx.try_recv();

        let reading = svc.record_reading(ghost.clone(), 20.0, 40.0).await;
        assert!(matches!(reading, Err(RelayError::DeviceNotFound(_))));
        let event = svc
            .record_event(ghost.clone(), EventType::ButtonPressed, serde_json::Value::Null)
            .await;
        assert!(matches!(event, Err(RelayError::DeviceNotFound(_))));
        let command = svc
            .log_command(ghost.clone(), CommandType::LedOn, serde_json::Value::Null)
            .await;
        assert!(matches!(command, Err(RelayError::DeviceNotFound(_))));
        assert!(matches!(
            svc.readings(&ghost, Page::default()).await,
            Err(RelayError::DeviceNotFound(_))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn registered_device_accepts_telemetry() {
        let svc = service();
        assert!(matches!(
            svc.register_device("  ", None).await,
            Err(RelayError::InvalidRequest(_))
        ));

        let Ok(device) = svc.register_device("SmartLab-Sensor", None).await else {
            panic!("register failed");
        };
        let Ok(devices) = svc.devices().await else {
            panic!("list failed");
        };
        assert_eq!(devices.len(), 3);
        assert_eq!(devices.first().map(|d| &d.id), Some(&device.id));

        assert!(svc.record_reading(device.id.clone(), 21.0, 45.0).await.is_ok());
        let Ok(seen) = svc.device(&device.id).await else {
            panic!("device lookup failed");
        };
        assert!(seen.last_seen >= device.last_seen);
    }
}
