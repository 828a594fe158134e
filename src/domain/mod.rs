//! Domain layer: device identity, the device catalog, telemetry records,
//! commands and the push-channel envelope shared by the server, the
//! observer client and the device bridge.

pub mod command;
pub mod device;
pub mod device_id;
pub mod envelope;
pub mod telemetry;

pub use command::{CommandLog, CommandStatus, CommandType};
pub use device::Device;
pub use device_id::DeviceId;
pub use envelope::Envelope;
pub use telemetry::{ConnectionStatus, DeviceEvent, EventType, Reading};
