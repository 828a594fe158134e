//! HTTP device simulator.
//!
//! Posts a drifting temperature/humidity reading to the relay every
//! `INTERVAL_MS`, plus the events a real board would raise: a
//! `DEVICE_CONNECTED` on start, `THRESHOLD_EXCEEDED` above 30 °C, and an
//! occasional button press that flips the operating mode.

use anyhow::Context;
use chrono::Utc;
use rand::Rng;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

use smartlab_relay::config::DeviceSimConfig;
use smartlab_relay::domain::EventType;

const TEMPERATURE_LIMIT: f64 = 30.0;
const BUTTON_PROBABILITY: f64 = 0.05;

/// Slowly wandering sensor baseline.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Drift {
    base_temperature: f64,
    base_humidity: f64,
    manual: bool,
}

impl Drift {
    const fn new() -> Self {
        Self {
            base_temperature: 22.0,
            base_humidity: 45.0,
            manual: false,
        }
    }

    /// Advances the baseline and returns `(temperature, humidity)`,
    /// rounded to two decimals.
    fn sample<R: Rng>(&mut self, rng: &mut R) -> (f64, f64) {
        self.base_temperature =
            (self.base_temperature + rng.gen_range(-0.05..0.05)).clamp(15.0, 35.0);
        self.base_humidity = (self.base_humidity + rng.gen_range(-0.1..0.1)).clamp(30.0, 70.0);

        let temperature = self.base_temperature + rng.gen_range(-1.0..1.0);
        let humidity = self.base_humidity + rng.gen_range(-2.5..2.5);
        (round2(temperature), round2(humidity))
    }

    fn toggle_mode(&mut self) -> &'static str {
        self.manual = !self.manual;
        if self.manual { "MANUAL" } else { "AUTO" }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug)]
struct Device {
    http: reqwest::Client,
    config: DeviceSimConfig,
}

impl Device {
    fn url(&self, resource: &str) -> String {
        format!(
            "{}/devices/{}/{resource}",
            self.config.api_base.trim_end_matches('/'),
            self.config.device_id
        )
    }

    async fn post(&self, resource: &str, body: &Value) -> anyhow::Result<()> {
        self.http
            .post(self.url(resource))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {resource}"))?
            .error_for_status()
            .with_context(|| format!("POST {resource} rejected"))?;
        Ok(())
    }

    async fn send_event(&self, event_type: EventType, payload: Value) {
        let body = json!({ "eventType": event_type.as_str(), "payload": payload });
        match self.post("events", &body).await {
            Ok(()) => tracing::info!(%event_type, "sent event"),
            Err(e) => tracing::warn!(%event_type, error = format!("{e:#}"), "failed to send event"),
        }
    }

    async fn tick(&self, drift: &mut Drift) {
        let (temperature, humidity, pressed) = {
            let mut rng = rand::thread_rng();
            let (t, h) = drift.sample(&mut rng);
            (t, h, rng.gen_bool(BUTTON_PROBABILITY))
        };

        let body = json!({ "temperature": temperature, "humidity": humidity });
        match self.post("readings", &body).await {
            Ok(()) => {
                tracing::info!(temperature, humidity, "sent reading");
                if temperature > TEMPERATURE_LIMIT {
                    tracing::warn!(temperature, "temperature exceeds threshold");
                    self.send_event(
                        EventType::ThresholdExceeded,
                        json!({ "temperature": temperature }),
                    )
                    .await;
                }
            }
            Err(e) => tracing::warn!(error = format!("{e:#}"), "failed to send reading"),
        }

        if pressed {
            let mode = drift.toggle_mode();
            tracing::info!(mode, "button pressed");
            self.send_event(EventType::ModeChanged, json!({ "mode": mode })).await;
            self.send_event(
                EventType::ButtonPressed,
                json!({ "timestamp": Utc::now().to_rfc3339() }),
            )
            .await;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = DeviceSimConfig::from_env();
    tracing::info!(
        api_base = %config.api_base,
        device_id = %config.device_id,
        interval = ?config.interval,
        "starting device simulator"
    );

    let interval = config.interval;
    let device = Device {
        http: reqwest::Client::new(),
        config,
    };
    device
        .send_event(
            EventType::DeviceConnected,
            json!({ "firmwareVersion": "1.0.0", "timestamp": Utc::now().to_rfc3339() }),
        )
        .await;

    let mut drift = Drift::new();
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => device.tick(&mut drift).await,
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    tracing::info!("device simulator stopped");
    Ok(())
}
