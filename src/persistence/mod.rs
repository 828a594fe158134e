//! Record store collaborator.
//!
//! The relay only needs create/query operations on the device catalog,
//! readings, events and the command log. [`RecordStore`] is that seam; [`InMemoryStore`] is the
//! implementation the server runs with.

pub mod memory;
pub mod models;

use async_trait::async_trait;

use crate::domain::{CommandLog, Device, DeviceEvent, DeviceId, Reading};
use crate::error::RelayError;

pub use memory::{InMemoryStore, SEED_DEVICES};
pub use models::{Page, Paged, Stored};

/// Create/query access to telemetry records.
#[async_trait]
pub trait RecordStore: Send + Sync + std::fmt::Debug {
    /// Adds a device to the catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidRequest`] if the id is already taken,
    /// or [`RelayError::PersistenceError`] on storage failure.
    async fn create_device(&self, device: Device) -> Result<Device, RelayError>;

    /// Lists the catalog, most recently registered first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] on storage failure.
    async fn list_devices(&self) -> Result<Vec<Device>, RelayError>;

    /// Looks a device up by id.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] on storage failure.
    async fn get_device(&self, device_id: &DeviceId) -> Result<Option<Device>, RelayError>;

    /// Stamps the device's `last_seen`. Unknown ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] on storage failure.
    async fn touch_device(&self, device_id: &DeviceId) -> Result<(), RelayError>;

    /// Stores a reading and returns it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] on storage failure.
    async fn create_reading(&self, reading: Reading) -> Result<Stored<Reading>, RelayError>;

    /// Lists readings for a device, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] on storage failure.
    async fn list_readings(
        &self,
        device_id: &DeviceId,
        page: Page,
    ) -> Result<Paged<Reading>, RelayError>;

    /// Returns the most recent reading for a device, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] on storage failure.
    async fn latest_reading(
        &self,
        device_id: &DeviceId,
    ) -> Result<Option<Stored<Reading>>, RelayError>;

    /// Stores a device event.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] on storage failure.
    async fn create_event(&self, event: DeviceEvent) -> Result<Stored<DeviceEvent>, RelayError>;

    /// Lists events for a device, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] on storage failure.
    async fn list_events(
        &self,
        device_id: &DeviceId,
        page: Page,
    ) -> Result<Paged<DeviceEvent>, RelayError>;

    /// Appends to the command log.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] on storage failure.
    async fn create_command(&self, command: CommandLog) -> Result<Stored<CommandLog>, RelayError>;

    /// Lists logged commands for a device, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::PersistenceError`] on storage failure.
    async fn list_commands(
        &self,
        device_id: &DeviceId,
        page: Page,
    ) -> Result<Paged<CommandLog>, RelayError>;
}
