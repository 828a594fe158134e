//! End-to-end tests: a relay on an ephemeral port, driven over HTTP and
//! observed over the push channel.

#![allow(clippy::panic)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use smartlab_relay::api;
use smartlab_relay::app_state::AppState;
use smartlab_relay::client::ObserverClient;
use smartlab_relay::config::ObserverConfig;
use smartlab_relay::domain::{ConnectionStatus, Envelope, EventType};

const WAIT: Duration = Duration::from_secs(3);

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_relay() -> (SocketAddr, AppState) {
    let state = AppState::in_memory(64);
    let app = api::build_router().with_state(state.clone());
    let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:0").await else {
        panic!("bind failed");
    };
    let Ok(addr) = listener.local_addr() else {
        panic!("no local addr");
    };
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (addr, state)
}

async fn subscribe(addr: SocketAddr, device_id: &str) -> Socket {
    let Ok((mut ws, _)) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws")).await else {
        panic!("ws connect failed");
    };
    let frame = json!({ "type": "subscribe", "deviceId": device_id }).to_string();
    let Ok(()) = ws.send(Message::text(frame)).await else {
        panic!("subscribe send failed");
    };
    let envelope = next_envelope(&mut ws).await;
    assert_eq!(
        envelope,
        Envelope::ConnectionStatus {
            status: ConnectionStatus::Connected,
            device_id: device_id.into(),
        }
    );
    ws
}

async fn next_envelope(ws: &mut Socket) -> Envelope {
    loop {
        let Ok(Some(Ok(message))) = timeout(WAIT, ws.next()).await else {
            panic!("expected a frame");
        };
        if let Message::Text(text) = message {
            let Ok(envelope) = Envelope::decode(text.as_str()) else {
                panic!("relay sent an undecodable frame: {text}");
            };
            return envelope;
        }
    }
}

async fn post(addr: SocketAddr, path: &str, body: Value) -> (u16, Value) {
    let Ok(response) = reqwest::Client::new()
        .post(format!("http://{addr}{path}"))
        .json(&body)
        .send()
        .await
    else {
        panic!("POST {path} failed");
    };
    let status = response.status().as_u16();
    (status, response.json().await.unwrap_or_default())
}

async fn register(addr: SocketAddr, name: &str) -> String {
    let (status, body) = post(addr, "/devices", json!({ "name": name })).await;
    assert_eq!(status, 201);
    let Some(id) = body["id"].as_str() else {
        panic!("registered device has no id");
    };
    id.to_string()
}

async fn get(addr: SocketAddr, path: &str) -> (u16, Value) {
    let Ok(response) = reqwest::get(format!("http://{addr}{path}")).await else {
        panic!("GET {path} failed");
    };
    let status = response.status().as_u16();
    (status, response.json().await.unwrap_or_default())
}

#[tokio::test]
async fn reading_reaches_only_its_device_observers() {
    let (addr, _state) = spawn_relay().await;
    let dev1 = register(addr, "SmartLab-001").await;
    let dev2 = register(addr, "SmartLab-002").await;
    let mut ws1 = subscribe(addr, &dev1).await;
    let mut ws2 = subscribe(addr, &dev2).await;

    let (status, body) = post(
        addr,
        &format!("/devices/{dev1}/readings"),
        json!({"temperature": 24.5, "humidity": 51.0}),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(body["deviceId"], dev1.as_str());

    let Envelope::Reading(reading) = next_envelope(&mut ws1).await else {
        panic!("expected a reading envelope");
    };
    assert_eq!(reading.device_id.as_str(), dev1);
    assert_eq!(reading.temperature, 24.5);
    assert_eq!(reading.humidity, 51.0);

    assert!(timeout(Duration::from_millis(200), ws2.next()).await.is_err());
}

#[tokio::test]
async fn malformed_frames_keep_the_session_open() {
    let (addr, _state) = spawn_relay().await;
    let dev = register(addr, "SmartLab-001").await;
    let mut ws = subscribe(addr, &dev).await;

    let _ = ws.send(Message::text("not json")).await;
    let _ = ws.send(Message::text(r#"{"type":"teleport"}"#)).await;

    let (status, _) = post(
        addr,
        &format!("/devices/{dev}/events"),
        json!({"eventType": "BUTTON_PRESSED", "payload": {"count": 1}}),
    )
    .await;
    assert_eq!(status, 201);

    let Envelope::DeviceEvent(event) = next_envelope(&mut ws).await else {
        panic!("expected a device_event envelope");
    };
    assert_eq!(event.event_type, EventType::ButtonPressed);
    assert_eq!(event.payload, json!({"count": 1}));
}

#[tokio::test]
async fn observer_client_receives_live_events() {
    let (addr, _state) = spawn_relay().await;
    let dev = register(addr, "SmartLab-009").await;
    let client = ObserverClient::new(ObserverConfig::new(format!("ws://{addr}/ws")));

    let (status_tx, mut status_rx) = mpsc::unbounded_channel();
    let _s = client.on_status(move |s| {
        let _ = status_tx.send(*s);
    });
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let _e = client.on_event(move |e| {
        let _ = event_tx.send(e.clone());
    });

    client.connect(dev.as_str());
    let Ok(Some(ConnectionStatus::Connected)) = timeout(WAIT, status_rx.recv()).await else {
        panic!("expected connected status");
    };

    let (status, _) = post(
        addr,
        &format!("/devices/{dev}/events"),
        json!({"eventType": "LED_STATE_CHANGED", "payload": {"state": true}}),
    )
    .await;
    assert_eq!(status, 201);

    let Ok(Some(event)) = timeout(WAIT, event_rx.recv()).await else {
        panic!("expected an event");
    };
    assert_eq!(event.event_type, EventType::LedStateChanged);

    client.disconnect();
    let Ok(Some(ConnectionStatus::Disconnected)) = timeout(WAIT, status_rx.recv()).await else {
        panic!("expected disconnected status");
    };
}

#[tokio::test]
async fn history_and_latest() {
    let (addr, _state) = spawn_relay().await;
    let dev1 = register(addr, "SmartLab-001").await;
    let dev2 = register(addr, "SmartLab-002").await;

    let (status, body) = get(addr, &format!("/devices/{dev1}/readings/latest")).await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], 2001);

    for t in [20.0, 21.0, 22.0] {
        let (status, _) = post(
            addr,
            &format!("/devices/{dev1}/readings"),
            json!({"temperature": t, "humidity": 40.0}),
        )
        .await;
        assert_eq!(status, 201);
    }

    let (status, body) = get(addr, &format!("/devices/{dev1}/readings?limit=2&offset=0")).await;
    assert_eq!(status, 200);
    assert_eq!(body["total"], 3);
    assert_eq!(body["limit"], 2);
    assert_eq!(body["readings"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["readings"][0]["temperature"], 22.0);

    let (status, body) = get(addr, &format!("/devices/{dev1}/readings/latest")).await;
    assert_eq!(status, 200);
    assert_eq!(body["temperature"], 22.0);

    let (_, body) = get(addr, &format!("/devices/{dev2}/readings")).await;
    assert_eq!(body["total"], 0);
    assert_eq!(body["limit"], 100);
}

#[tokio::test]
async fn device_catalog() {
    let (addr, _state) = spawn_relay().await;

    let (status, body) = get(addr, "/devices").await;
    assert_eq!(status, 200);
    assert_eq!(body["devices"].as_array().map(Vec::len), Some(0));

    let (status, body) = post(addr, "/devices", json!({"firmwareVersion": "2.0.0"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], 1001);

    let (status, created) = post(
        addr,
        "/devices",
        json!({"name": "SmartLab-Sensor", "firmwareVersion": "2.0.0"}),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(created["name"], "SmartLab-Sensor");
    assert_eq!(created["firmwareVersion"], "2.0.0");
    let Some(id) = created["id"].as_str() else {
        panic!("registered device has no id");
    };
    let other = register(addr, "SmartLab-Bench").await;

    let (status, body) = get(addr, &format!("/devices/{id}")).await;
    assert_eq!(status, 200);
    assert_eq!(body["id"], id);
    assert_eq!(body["firmwareVersion"], "2.0.0");

    let (_, body) = get(addr, "/devices").await;
    assert_eq!(body["devices"][0]["id"], other.as_str());
    assert_eq!(body["devices"][1]["id"], id);

    let (status, body) = get(addr, "/devices/ghost").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], 2002);
}

#[tokio::test]
async fn unknown_device_is_rejected_everywhere() {
    let (addr, _state) = spawn_relay().await;
    let mut ws = subscribe(addr, "ghost").await;

    for (path, body) in [
        ("/devices/ghost/readings", json!({"temperature": 20.0, "humidity": 40.0})),
        ("/devices/ghost/events", json!({"eventType": "BUTTON_PRESSED"})),
        ("/devices/ghost/commands", json!({"commandType": "LED_ON"})),
    ] {
        let (status, body) = post(addr, path, body).await;
        assert_eq!(status, 404, "POST {path}");
        assert_eq!(body["error"]["code"], 2002);
    }
    for path in [
        "/devices/ghost/readings",
        "/devices/ghost/readings/latest",
        "/devices/ghost/events",
        "/devices/ghost/commands",
    ] {
        let (status, body) = get(addr, path).await;
        assert_eq!(status, 404, "GET {path}");
        assert_eq!(body["error"]["code"], 2002);
    }

    assert!(timeout(Duration::from_millis(200), ws.next()).await.is_err());
}

#[tokio::test]
async fn ingest_stamps_last_seen() {
    let (addr, _state) = spawn_relay().await;
    let dev = register(addr, "SmartLab-001").await;
    let (_, before) = get(addr, &format!("/devices/{dev}")).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    let (status, _) = post(
        addr,
        &format!("/devices/{dev}/readings"),
        json!({"temperature": 21.0, "humidity": 44.0}),
    )
    .await;
    assert_eq!(status, 201);

    let (_, after) = get(addr, &format!("/devices/{dev}")).await;
    assert_ne!(after["lastSeen"], before["lastSeen"]);
    assert_eq!(after["createdAt"], before["createdAt"]);
}

#[tokio::test]
async fn validation_errors() {
    let (addr, _state) = spawn_relay().await;
    let dev = register(addr, "SmartLab-001").await;

    let (status, body) = post(
        addr,
        &format!("/devices/{dev}/readings"),
        json!({"temperature": 20.0}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], 1001);

    let (status, _) = post(
        addr,
        &format!("/devices/{dev}/events"),
        json!({"eventType": "SUNRISE"}),
    )
    .await;
    assert_eq!(status, 400);

    let (status, body) = post(
        addr,
        &format!("/devices/{dev}/commands"),
        json!({"commandType": "SELF_DESTRUCT"}),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], 1002);
}

#[tokio::test]
async fn commands_are_logged_as_sent() {
    let (addr, _state) = spawn_relay().await;
    let dev = register(addr, "SmartLab-001").await;

    let (status, body) = post(
        addr,
        &format!("/devices/{dev}/commands"),
        json!({"commandType": "SET_THRESHOLD", "payload": {"threshold": 28}}),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(body["status"], "sent");
    assert_eq!(body["commandType"], "SET_THRESHOLD");

    let (_, body) = get(addr, &format!("/devices/{dev}/commands")).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["commands"][0]["payload"]["threshold"], 28);
}

#[tokio::test]
async fn health_and_subscribers_track_sessions() {
    let (addr, state) = spawn_relay().await;
    let _a = subscribe(addr, "dev-1").await;
    let _b = subscribe(addr, "dev-1").await;
    let _c = subscribe(addr, "dev-2").await;

    let (status, body) = get(addr, "/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["wsClients"], 3);

    let (_, body) = get(addr, "/devices/dev-1/subscribers").await;
    assert_eq!(body["subscribers"], 2);

    state.registry.shutdown().await;
    let (_, body) = get(addr, "/health").await;
    assert_eq!(body["wsClients"], 0);
}
