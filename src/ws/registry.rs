//! Server-side registry of observer sessions.
//!
//! [`ConnectionRegistry`] owns every open push-channel session, its
//! optional device binding and its liveness flag. Per-connection tasks
//! mutate it through `on_open` / `on_message` / `on_pong` / `on_close`,
//! the ingest path calls [`ConnectionRegistry::broadcast`], and the
//! liveness sweeper calls [`ConnectionRegistry::sweep`].
//!
//! # Concurrency
//!
//! All session state lives in one `RwLock<HashMap<..>>`. Broadcast takes a
//! snapshot of the matching outbound queues under the read lock and sends
//! after releasing it, so removal during a broadcast is always safe. Sends
//! use `try_send`: a full or closed queue is skipped, never awaited.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};

use super::sweeper::{LivenessSweeper, SweeperHandle};
use crate::domain::{ConnectionStatus, DeviceId, Envelope};

/// Identifier of one observer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(uuid::Uuid);

impl SessionId {
    fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instruction queued for a session's socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Send a text frame.
    Text(String),
    /// Send a liveness ping (WebSocket ping).
    Ping,
    /// Send a close frame and end the session.
    Close,
    /// Drop the socket immediately without a close handshake.
    Terminate,
}

#[derive(Debug)]
struct Session {
    subscribed_device: Option<DeviceId>,
    alive: bool,
    outbound: mpsc::Sender<Outbound>,
}

/// Outcome of one liveness sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Sessions that were sent a ping.
    pub probed: usize,
    /// Sessions that were terminated for missing the previous ping.
    pub evicted: usize,
}

/// Registry of open observer sessions with device-routed broadcast.
#[derive(Debug)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<SessionId, Session>>,
    session_buffer: usize,
}

impl ConnectionRegistry {
    /// Creates an empty registry whose sessions buffer up to
    /// `session_buffer` outbound frames each.
    #[must_use]
    pub fn new(session_buffer: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            session_buffer: session_buffer.max(1),
        }
    }

    /// Registers a new session with no device binding.
    ///
    /// Returns the session id and the receiver the connection task drains
    /// into its socket.
    pub async fn on_open(&self) -> (SessionId, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(self.session_buffer);
        let id = SessionId::new();
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            id,
            Session {
                subscribed_device: None,
                alive: true,
                outbound: tx,
            },
        );
        tracing::info!(session_id = %id, total = sessions.len(), "observer connected");
        (id, rx)
    }

    /// Handles one inbound text frame from a session.
    ///
    /// Only `subscribe` is accepted. Anything else, including malformed
    /// JSON, is logged and dropped; the session stays open.
    pub async fn on_message(&self, id: SessionId, text: &str) {
        let envelope = match Envelope::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "dropping inbound frame");
                return;
            }
        };

        let device_id = match envelope {
            Envelope::Subscribe { device_id } => device_id,
            other => {
                tracing::warn!(
                    session_id = %id,
                    tag = other.tag(),
                    "unsupported inbound envelope"
                );
                return;
            }
        };

        if device_id.is_blank() {
            tracing::warn!(session_id = %id, "subscribe without device id");
            return;
        }

        let ack = Envelope::ConnectionStatus {
            status: ConnectionStatus::Connected,
            device_id: device_id.clone(),
        };
        let ack = match ack.encode() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(session_id = %id, error = %e, "failed to encode ack");
                return;
            }
        };

        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(&id) else {
            tracing::debug!(session_id = %id, "subscribe for closed session");
            return;
        };
        tracing::info!(session_id = %id, %device_id, "observer subscribed");
        session.subscribed_device = Some(device_id);
        if session.outbound.try_send(Outbound::Text(ack)).is_err() {
            tracing::debug!(session_id = %id, "ack dropped, session not writable");
        }
    }

    /// Marks a session alive after it answered a ping.
    pub async fn on_pong(&self, id: SessionId) {
        if let Some(session) = self.sessions.write().await.get_mut(&id) {
            session.alive = true;
        }
    }

    /// Removes a session. Returns `false` if it was already gone.
    pub async fn on_close(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.write().await;
        let removed = sessions.remove(&id).is_some();
        if removed {
            tracing::info!(session_id = %id, total = sessions.len(), "observer disconnected");
        }
        removed
    }

    /// Sends `envelope` to every session subscribed to `device_id`.
    ///
    /// Returns the number of sessions the frame was queued for. The count
    /// is informational only: sessions whose queue is full or closed are
    /// skipped and nothing is retried. An envelope that refers to a
    /// different device than `device_id` is refused.
    pub async fn broadcast(&self, device_id: &DeviceId, envelope: &Envelope) -> usize {
        if envelope.device_id() != device_id {
            tracing::warn!(
                %device_id,
                envelope_device = %envelope.device_id(),
                "refusing broadcast of envelope for another device"
            );
            return 0;
        }

        let json = match envelope.encode() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(%device_id, error = %e, "failed to encode envelope");
                return 0;
            }
        };

        let targets: Vec<mpsc::Sender<Outbound>> = {
            let sessions = self.sessions.read().await;
            sessions
                .values()
                .filter(|s| s.subscribed_device.as_ref() == Some(device_id))
                .map(|s| s.outbound.clone())
                .collect()
        };

        let reached = targets
            .iter()
            .filter(|tx| tx.try_send(Outbound::Text(json.clone())).is_ok())
            .count();

        tracing::debug!(
            %device_id,
            tag = envelope.tag(),
            reached,
            subscribers = targets.len(),
            "broadcast"
        );
        reached
    }

    /// Runs one liveness cycle.
    ///
    /// Sessions that did not answer the previous ping are terminated and
    /// removed. Every other session is sent a ping and marked not-alive once
    /// it is queued; a session whose queue is full is left for the next cycle.
    pub async fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let mut sessions = self.sessions.write().await;

        sessions.retain(|id, session| {
            if !session.alive {
                let _ = session.outbound.try_send(Outbound::Terminate);
                tracing::info!(session_id = %id, "evicting unresponsive observer");
                report.evicted += 1;
                return false;
            }
            match session.outbound.try_send(Outbound::Ping) {
                Ok(()) => {
                    session.alive = false;
                    report.probed += 1;
                }
                // A busy session keeps its flag until a ping fits.
                Err(TrySendError::Full(_)) => {
                    tracing::debug!(session_id = %id, "queue full, ping deferred");
                }
                Err(TrySendError::Closed(_)) => session.alive = false,
            }
            true
        });

        report
    }

    /// Starts the periodic liveness sweeper for this registry.
    #[must_use]
    pub fn start_liveness_sweeper(self: &Arc<Self>, period: Duration) -> SweeperHandle {
        LivenessSweeper::new(Arc::clone(self), period).spawn()
    }

    /// Asks every session to close and empties the registry.
    pub async fn shutdown(&self) {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values() {
            let _ = session.outbound.try_send(Outbound::Close);
        }
        tracing::info!(closed = sessions.len(), "closing all observer sessions");
        sessions.clear();
    }

    /// Number of open sessions.
    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Number of sessions subscribed to `device_id`.
    pub async fn count_for(&self, device_id: &DeviceId) -> usize {
        self.sessions
            .read()
            .await
            .values()
            .filter(|s| s.subscribed_device.as_ref() == Some(device_id))
            .count()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::Reading;

    fn reading(device: &str) -> Envelope {
        Envelope::Reading(Reading::now(DeviceId::from(device), 25.0, 50.0))
    }

    async fn subscribe(
        registry: &ConnectionRegistry,
        device: &str,
    ) -> (SessionId, mpsc::Receiver<Outbound>) {
        let (id, mut rx) = registry.on_open().await;
        registry
            .on_message(id, &format!(r#"{{"type":"subscribe","deviceId":"{device}"}}"#))
            .await;
        // Consume the subscribe acknowledgement.
        let Ok(Outbound::Text(_)) = rx.try_recv() else {
            panic!("expected connection_status ack");
        };
        (id, rx)
    }

    #[tokio::test]
    async fn open_and_close_track_count() {
        let registry = ConnectionRegistry::new(8);
        let (id, _rx) = registry.on_open().await;
        assert_eq!(registry.count().await, 1);
        assert!(registry.on_close(id).await);
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let registry = ConnectionRegistry::new(8);
        let (id, _rx) = registry.on_open().await;
        assert!(registry.on_close(id).await);
        assert!(!registry.on_close(id).await);
    }

    #[tokio::test]
    async fn subscribe_acks_only_the_subscriber() {
        let registry = ConnectionRegistry::new(8);
        let (a, mut rx_a) = registry.on_open().await;
        let (_b, mut rx_b) = registry.on_open().await;

        registry
            .on_message(a, r#"{"type":"subscribe","deviceId":"dev-1"}"#)
            .await;

        let Ok(Outbound::Text(json)) = rx_a.try_recv() else {
            panic!("subscriber should receive an ack");
        };
        assert_eq!(
            json,
            r#"{"type":"connection_status","status":"connected","deviceId":"dev-1"}"#
        );
        assert!(rx_a.try_recv().is_err(), "exactly one ack");
        assert!(rx_b.try_recv().is_err(), "no ack for other sessions");
    }

    #[tokio::test]
    async fn unbound_session_receives_no_broadcast() {
        let registry = ConnectionRegistry::new(8);
        let (_id, mut rx) = registry.on_open().await;
        let reached = registry
            .broadcast(&DeviceId::from("dev-1"), &reading("dev-1"))
            .await;
        assert_eq!(reached, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_routes_by_device() {
        let registry = ConnectionRegistry::new(8);
        let (_a, mut rx_a) = subscribe(&registry, "dev-1").await;
        let (_b, mut rx_b) = subscribe(&registry, "dev-1").await;
        let (_c, mut rx_c) = subscribe(&registry, "dev-2").await;

        let reached = registry
            .broadcast(&DeviceId::from("dev-1"), &reading("dev-1"))
            .await;
        assert_eq!(reached, 2);
        assert!(matches!(rx_a.try_recv(), Ok(Outbound::Text(_))));
        assert!(matches!(rx_b.try_recv(), Ok(Outbound::Text(_))));
        assert!(rx_c.try_recv().is_err());
        assert_eq!(registry.count_for(&DeviceId::from("dev-1")).await, 2);
        assert_eq!(registry.count_for(&DeviceId::from("dev-2")).await, 1);
    }

    #[tokio::test]
    async fn resubscribe_moves_binding() {
        let registry = ConnectionRegistry::new(8);
        let (id, mut rx) = subscribe(&registry, "dev-1").await;
        registry
            .on_message(id, r#"{"type":"subscribe","deviceId":"dev-2"}"#)
            .await;
        let _ = rx.try_recv();

        assert_eq!(
            registry
                .broadcast(&DeviceId::from("dev-1"), &reading("dev-1"))
                .await,
            0
        );
        assert_eq!(
            registry
                .broadcast(&DeviceId::from("dev-2"), &reading("dev-2"))
                .await,
            1
        );
    }

    #[tokio::test]
    async fn mismatched_envelope_is_refused() {
        let registry = ConnectionRegistry::new(8);
        let (_a, mut rx) = subscribe(&registry, "dev-1").await;
        let reached = registry
            .broadcast(&DeviceId::from("dev-1"), &reading("dev-2"))
            .await;
        assert_eq!(reached, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn unwritable_session_is_skipped() {
        let registry = ConnectionRegistry::new(8);
        let (_a, rx_a) = subscribe(&registry, "dev-1").await;
        let (_b, mut rx_b) = subscribe(&registry, "dev-1").await;
        drop(rx_a);

        let reached = registry
            .broadcast(&DeviceId::from("dev-1"), &reading("dev-1"))
            .await;
        assert_eq!(reached, 1);
        assert!(rx_b.try_recv().is_ok());
        assert_eq!(registry.count().await, 2, "broadcast never removes sessions");
    }

    #[tokio::test]
    async fn full_queue_does_not_block() {
        let registry = ConnectionRegistry::new(1);
        let (_a, mut rx) = subscribe(&registry, "dev-1").await;

        let first = registry
            .broadcast(&DeviceId::from("dev-1"), &reading("dev-1"))
            .await;
        let second = registry
            .broadcast(&DeviceId::from("dev-1"), &reading("dev-1"))
            .await;
        assert_eq!((first, second), (1, 0));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn invalid_frames_keep_session_open() {
        let registry = ConnectionRegistry::new(8);
        let (id, mut rx) = registry.on_open().await;

        registry.on_message(id, "{{{").await;
        registry
            .on_message(id, r#"{"type":"reading","deviceId":"x"}"#)
            .await;
        registry
            .on_message(id, r#"{"type":"teleport","deviceId":"x"}"#)
            .await;
        registry
            .on_message(id, r#"{"type":"subscribe","deviceId":" "}"#)
            .await;

        assert_eq!(registry.count().await, 1);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn sweep_pings_then_evicts_silent_session() {
        let registry = ConnectionRegistry::new(8);
        let (id, mut rx) = registry.on_open().await;

        let first = registry.sweep().await;
        assert_eq!(first, SweepReport { probed: 1, evicted: 0 });
        assert_eq!(rx.try_recv(), Ok(Outbound::Ping));

        let second = registry.sweep().await;
        assert_eq!(second, SweepReport { probed: 0, evicted: 1 });
        assert_eq!(rx.try_recv(), Ok(Outbound::Terminate));
        assert_eq!(registry.count().await, 0);
        assert!(!registry.on_close(id).await);
    }

    #[tokio::test]
    async fn busy_session_is_not_evicted_without_ping() {
        let registry = ConnectionRegistry::new(1);
        let (id, mut rx) = registry.on_open().await;
        registry
            .on_message(id, r#"{"type":"subscribe","deviceId":"dev-1"}"#)
            .await;

        // The ack fills the queue, so no ping fits.
        let first = registry.sweep().await;
        assert_eq!(first, SweepReport { probed: 0, evicted: 0 });
        let Ok(Outbound::Text(_)) = rx.try_recv() else {
            panic!("expected connection_status ack");
        };
        assert!(rx.try_recv().is_err());

        let second = registry.sweep().await;
        assert_eq!(second, SweepReport { probed: 1, evicted: 0 });
        assert_eq!(rx.try_recv(), Ok(Outbound::Ping));
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn pong_keeps_session_alive() {
        let registry = ConnectionRegistry::new(8);
        let (id, _rx) = registry.on_open().await;

        for _ in 0..3 {
            let report = registry.sweep().await;
            assert_eq!(report.evicted, 0);
            registry.on_pong(id).await;
        }
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn shutdown_closes_everyone() {
        let registry = ConnectionRegistry::new(8);
        let (_a, mut rx_a) = registry.on_open().await;
        let (_b, mut rx_b) = registry.on_open().await;

        registry.shutdown().await;
        assert_eq!(rx_a.try_recv(), Ok(Outbound::Close));
        assert_eq!(rx_b.try_recv(), Ok(Outbound::Close));
        assert_eq!(registry.count().await, 0);
    }
}
