//! Push-channel observer.
//!
//! Subscribes to one device on the relay (`OBSERVER_DEVICE_ID`) and logs
//! every reading, event and status change. With `BRIDGE_DEVICE_ID` set it
//! also opens a device bridge in the configured mode and logs the
//! device's notifications; `BRIDGE_COMMAND` sends one command once the
//! bridge is connected.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use smartlab_relay::bridge::DeviceBridge;
use smartlab_relay::client::ObserverClient;
use smartlab_relay::config::{BridgeConfig, ObserverConfig};

const DEFAULT_DEVICE_ID: &str = "550e8400-e29b-41d4-a716-446655440000";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ObserverConfig::from_env();
    let device_id =
        std::env::var("OBSERVER_DEVICE_ID").unwrap_or_else(|_| DEFAULT_DEVICE_ID.to_string());

    let client = ObserverClient::new(config);
    let _readings = client.on_reading(|r| {
        tracing::info!(
            device_id = %r.device_id,
            temperature = r.temperature,
            humidity = r.humidity,
            at = %r.created_at,
            "reading"
        );
    });
    let _events = client.on_event(|e| {
        tracing::info!(device_id = %e.device_id, event_type = %e.event_type, payload = %e.payload, "event");
    });
    let _status = client.on_status(|s| tracing::info!(status = %s, "relay connection"));
    client.connect(device_id);

    let bridge = match std::env::var("BRIDGE_DEVICE_ID") {
        Ok(bridge_device) => {
            let bridge_config = BridgeConfig::from_env()
                .map_err(|e| anyhow::anyhow!("{e}"))
                .context("invalid bridge configuration")?;
            let bridge = DeviceBridge::from_config(&bridge_config, None);
            let notifications = bridge.on_notification(|n| {
                tracing::info!(kind = %n.kind, payload = %n.payload, "device notification");
            });
            let changes = bridge.on_connection_state_changed(|c| {
                tracing::info!(device_id = %c.device_id, connected = c.connected, "device link");
            });

            bridge
                .connect(bridge_device.as_str())
                .await
                .context("bridge connect failed")?;
            if let Ok(command) = std::env::var("BRIDGE_COMMAND") {
                bridge
                    .send_raw_command(&command, serde_json::json!({}))
                    .await
                    .with_context(|| format!("bridge command {command} failed"))?;
            }
            Some((bridge, bridge_device, notifications, changes))
        }
        Err(_) => None,
    };

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");

    if let Some((bridge, bridge_device, _notifications, _changes)) = bridge {
        if let Err(e) = bridge.disconnect(bridge_device).await {
            tracing::warn!(error = %e, "bridge disconnect failed");
        }
    }
    client.disconnect();
    Ok(())
}
