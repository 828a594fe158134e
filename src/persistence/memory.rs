//! In-memory record store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Page, Paged, RecordStore, Stored};
use crate::domain::{CommandLog, Device, DeviceEvent, DeviceId, Reading};
use crate::error::RelayError;

/// Devices present in a [`InMemoryStore::seeded`] catalog.
pub const SEED_DEVICES: [(&str, &str, &str); 2] = [
    ("550e8400-e29b-41d4-a716-446655440000", "SmartLab-001", "1.0.0"),
    ("550e8400-e29b-41d4-a716-446655440001", "SmartLab-002", "1.0.1"),
];

#[derive(Debug, Default)]
struct Tables {
    next_id: u64,
    devices: Vec<Device>,
    readings: Vec<Stored<Reading>>,
    events: Vec<Stored<DeviceEvent>>,
    commands: Vec<Stored<CommandLog>>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Process-local [`RecordStore`]; contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose catalog holds the two bench devices.
    #[must_use]
    pub fn seeded() -> Self {
        let devices = SEED_DEVICES
            .into_iter()
            .map(|(id, name, firmware)| {
                Device::with_id(DeviceId::from(id), name, Some(firmware.to_string()))
            })
            .collect();
        Self {
            tables: RwLock::new(Tables {
                devices,
                ..Tables::default()
            }),
        }
    }
}

/// Newest-first page over rows belonging to `device_id`.
fn page_of<T: Clone>(
    rows: &[Stored<T>],
    device_of: impl Fn(&T) -> &DeviceId,
    device_id: &DeviceId,
    page: Page,
) -> Paged<T> {
    let matching: Vec<&Stored<T>> = rows
        .iter()
        .rev()
        .filter(|row| device_of(&row.record) == device_id)
        .collect();
    let total = matching.len();
    let items = matching
        .into_iter()
        .skip(page.offset)
        .take(page.limit)
        .cloned()
        .collect();
    Paged { items, total }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn create_device(&self, device: Device) -> Result<Device, RelayError> {
        let mut tables = self.tables.write().await;
        if tables.devices.iter().any(|d| d.id == device.id) {
            return Err(RelayError::InvalidRequest(format!(
                "device {} already registered",
                device.id
            )));
        }
        tables.devices.push(device.clone());
        Ok(device)
    }

    async fn list_devices(&self) -> Result<Vec<Device>, RelayError> {
        let tables = self.tables.read().await;
        Ok(tables.devices.iter().rev().cloned().collect())
    }

    async fn get_device(&self, device_id: &DeviceId) -> Result<Option<Device>, RelayError> {
        let tables = self.tables.read().await;
        Ok(tables.devices.iter().find(|d| &d.id == device_id).cloned())
    }

    async fn touch_device(&self, device_id: &DeviceId) -> Result<(), RelayError> {
        let mut tables = self.tables.write().await;
        if let Some(device) = tables.devices.iter_mut().find(|d| &d.id == device_id) {
            device.touch();
        }
        Ok(())
    }

    async fn create_reading(&self, reading: Reading) -> Result<Stored<Reading>, RelayError> {
        let mut tables = self.tables.write().await;
        let stored = Stored {
            id: tables.next_id(),
            record: reading,
        };
        tables.readings.push(stored.clone());
        Ok(stored)
    }

    async fn list_readings(
        &self,
        device_id: &DeviceId,
        page: Page,
    ) -> Result<Paged<Reading>, RelayError> {
        let tables = self.tables.read().await;
        Ok(page_of(&tables.readings, |r| &r.device_id, device_id, page))
    }

    async fn latest_reading(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<Stored<Reading>>, RelayError> {
        let tables = self.tables.read().await;
        Ok(tables
            .readings
            .iter()
            .rev()
            .find(|row| &row.record.device_id == device_id)
            .cloned())
    }

    async fn create_event(&self, event: DeviceEvent) -> Result<Stored<DeviceEvent>, RelayError> {
        let mut tables = self.tables.write().await;
        let stored = Stored {
            id: tables.next_id(),
            record: event,
        };
        tables.events.push(stored.clone());
        Ok(stored)
    }

    async fn list_events(
        &self,
        device_id: &DeviceId,
        page: Page,
    ) -> Result<Paged<DeviceEvent>, RelayError> {
        let tables = self.tables.read().await;
        Ok(page_of(&tables.events, |e| &e.device_id, device_id, page))
    }

    async fn create_command(&self, command: CommandLog) -> Result<Stored<CommandLog>, RelayError> {
        let mut tables = self.tables.write().await;
        let stored = Stored {
            id: tables.next_id(),
            record: command,
        };
        tables.commands.push(stored.clone());
        Ok(stored)
    }

    async fn list_commands(
        &self,
        device_id: &DeviceId,
        page: Page,
    ) -> Result<Paged<CommandLog>, RelayError> {
        let tables = self.tables.read().await;
        Ok(page_of(&tables.commands, |c| &c.device_id, device_id, page))
    }
}
