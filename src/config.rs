//! Configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Every value has a default so each
//! binary starts with no configuration at all.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::client::ReconnectPolicy;
use crate::domain::DeviceId;

/// Relay server configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:4000`).
    pub listen_addr: SocketAddr,

    /// Period of the liveness sweep (`WS_HEARTBEAT_INTERVAL`, ms).
    pub heartbeat_interval: Duration,

    /// Outbound frames buffered per observer session.
    pub session_buffer: usize,

    /// Per-request timeout for the HTTP routes.
    pub request_timeout: Duration,
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:4000".to_string())
            .parse()?;

        Ok(Self {
            listen_addr,
            heartbeat_interval: non_zero(parse_env_ms(
                "WS_HEARTBEAT_INTERVAL",
                Duration::from_secs(30),
            )),
            session_buffer: parse_env("WS_SESSION_BUFFER", 64),
            request_timeout: Duration::from_secs(parse_env("REQUEST_TIMEOUT_SECS", 10)),
        })
    }
}

/// Observer client configuration.
#[derive(Debug, Clone)]
pub struct ObserverConfig {
    /// Push-channel URL of the relay (`RELAY_WS_URL`).
    pub ws_url: String,

    /// Backoff schedule applied after channel loss.
    pub reconnect: ReconnectPolicy,
}

impl ObserverConfig {
    /// Creates a config for `ws_url` with the default reconnect policy.
    #[must_use]
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Loads configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let ws_url =
            std::env::var("RELAY_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:4000/ws".to_string());
        let defaults = ReconnectPolicy::default();
        let reconnect = ReconnectPolicy {
            base_delay: parse_env_ms("RECONNECT_BASE_DELAY_MS", defaults.base_delay),
            max_attempts: parse_env("RECONNECT_MAX_ATTEMPTS", defaults.max_attempts),
        };

        Self { ws_url, reconnect }
    }
}

/// Which device transport the bridge is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BridgeMode {
    /// Platform radio.
    Real,
    /// Synthetic devices and notifications.
    #[default]
    Simulated,
}

impl FromStr for BridgeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "real" | "ble" | "hardware" => Ok(Self::Real),
            "simulated" | "sim" | "mock" => Ok(Self::Simulated),
            other => Err(format!("unknown bridge mode: {other}")),
        }
    }
}

/// Timing of the simulated transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulationConfig {
    /// Delay before a simulated connect succeeds.
    pub connect_delay: Duration,
    /// Period of the synthetic `sensor_reading` notifications.
    pub notification_interval: Duration,
    /// Gap between synthetic scan results.
    pub scan_interval: Duration,
    /// Delay before a command's synthetic response.
    pub command_delay: Duration,
}

impl SimulationConfig {
    /// Raises zero periods to [`MIN_PERIOD`]; tickers reject a zero period.
    #[must_use]
    pub fn with_periods_clamped(self) -> Self {
        Self {
            notification_interval: non_zero(self.notification_interval),
            scan_interval: non_zero(self.scan_interval),
            ..self
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            connect_delay: Duration::from_millis(1000),
            notification_interval: Duration::from_millis(2000),
            scan_interval: Duration::from_millis(600),
            command_delay: Duration::from_millis(100),
        }
    }
}

/// Device bridge configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct BridgeConfig {
    /// Transport variant, chosen once at construction.
    pub mode: BridgeMode,
    /// Simulated transport timing.
    pub simulation: SimulationConfig,
}

impl BridgeConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `BRIDGE_MODE` is set to an unknown value.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let mode = match std::env::var("BRIDGE_MODE") {
            Ok(raw) => raw.parse::<BridgeMode>()?,
            Err(_) => BridgeMode::default(),
        };
        let defaults = SimulationConfig::default();
        let simulation = SimulationConfig {
            connect_delay: parse_env_ms("BRIDGE_CONNECT_DELAY_MS", defaults.connect_delay),
            notification_interval: parse_env_ms(
                "BRIDGE_NOTIFY_INTERVAL_MS",
                defaults.notification_interval,
            ),
            scan_interval: parse_env_ms("BRIDGE_SCAN_INTERVAL_MS", defaults.scan_interval),
            command_delay: parse_env_ms("BRIDGE_COMMAND_DELAY_MS", defaults.command_delay),
        };

        Ok(Self {
            mode,
            simulation: simulation.with_periods_clamped(),
        })
    }
}

/// HTTP device simulator configuration.
#[derive(Debug, Clone)]
pub struct DeviceSimConfig {
    /// Base URL of the relay's HTTP API (`API_BASE`).
    pub api_base: String,
    /// Device the simulator reports as (`DEVICE_ID`).
    pub device_id: DeviceId,
    /// Period between readings (`INTERVAL_MS`).
    pub interval: Duration,
}

impl DeviceSimConfig {
    /// Loads configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            api_base: std::env::var("API_BASE")
                .unwrap_or_else(|_| "http://localhost:4000".to_string()),
            device_id: std::env::var("DEVICE_ID")
                .unwrap_or_else(|_| "550e8400-e29b-41d4-a716-446655440000".to_string())
                .into(),
            interval: parse_env_ms("INTERVAL_MS", Duration::from_millis(3000)),
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses a millisecond environment variable into a [`Duration`].
fn parse_env_ms(key: &str, default: Duration) -> Duration {
    let default_ms = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(parse_env(key, default_ms))
}

/// Shortest period handed to a periodic timer.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Returns `period`, or [`MIN_PERIOD`] if it is zero.
#[must_use]
pub fn non_zero(period: Duration) -> Duration {
    period.max(MIN_PERIOD)
}
