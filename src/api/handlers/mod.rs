//! REST endpoint handlers organized by resource.

pub mod commands;
pub mod devices;
pub mod events;
pub mod readings;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all device resource routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(devices::routes())
        .merge(readings::routes())
        .merge(events::routes())
        .merge(commands::routes())
}
