//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::persistence::{InMemoryStore, RecordStore};
use crate::service::TelemetryService;
use crate::ws::ConnectionRegistry;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Record-then-relay telemetry service.
    pub telemetry: Arc<TelemetryService>,
    /// Push-channel session registry.
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Wires a service over `store` and `registry`.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, registry: Arc<ConnectionRegistry>) -> Self {
        let telemetry = Arc::new(TelemetryService::new(store, Arc::clone(&registry)));
        Self {
            telemetry,
            registry,
        }
    }

    /// State backed by an empty in-memory store.
    #[must_use]
    pub fn in_memory(session_buffer: usize) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(ConnectionRegistry::new(session_buffer)),
        )
    }
}
