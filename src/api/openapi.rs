//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use crate::api::dto::{
    CommandDto, CommandListResponse, CreateCommandRequest, CreateDeviceRequest,
    CreateEventRequest, CreateReadingRequest, DeviceDto, DeviceListResponse, EventDto,
    EventListResponse, ReadingDto, ReadingListResponse,
};
use crate::api::handlers::{commands, devices, events, readings, system};
use crate::domain::{CommandStatus, CommandType, EventType};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI document.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "SmartLab relay",
        description = "Telemetry ingest and live push channel for SmartLab sensor devices."
    ),
    paths(
        devices::list_devices,
        devices::get_device,
        devices::create_device,
        readings::create_reading,
        readings::list_readings,
        readings::latest_reading,
        events::create_event,
        events::list_events,
        commands::create_command,
        commands::list_commands,
        system::health_handler,
        system::subscribers_handler,
    ),
    components(schemas(
        CreateDeviceRequest,
        DeviceDto,
        DeviceListResponse,
        CreateReadingRequest,
        ReadingDto,
        ReadingListResponse,
        CreateEventRequest,
        EventDto,
        EventListResponse,
        CreateCommandRequest,
        CommandDto,
        CommandListResponse,
        EventType,
        CommandType,
        CommandStatus,
        ErrorResponse,
        ErrorBody,
        system::HealthResponse,
        system::SubscribersResponse,
    )),
    tags(
        (name = "Devices", description = "Device catalog"),
        (name = "Readings", description = "Sensor samples"),
        (name = "Events", description = "Discrete device events"),
        (name = "Commands", description = "Operator command log"),
        (name = "System", description = "Health and push-channel occupancy"),
    )
)]
pub struct ApiDoc;
