//! Reconnecting observer client for the relay's push channel.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──open + subscribe──▶ Subscribed
//!      ▲                        ▲                                │
//!      │ exhausted              │ timer                          │ loss
//!      └──────────────── Reconnecting ◀──────────────────────────┘
//! ```
//!
//! One logical channel exists at a time. Every channel and retry timer is
//! stamped with a generation number; a task whose generation is no longer
//! current can never reopen a session, which is what keeps `connect` and
//! `disconnect` race-free against in-flight reconnects.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use super::ReconnectState;
use crate::config::ObserverConfig;
use crate::domain::{ConnectionStatus, DeviceEvent, DeviceId, Envelope, Reading};
use crate::fanout::{HandlerSet, Subscription};

/// Grace period for the close handshake on `disconnect`.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle phase of the observer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverPhase {
    /// No channel and no retry pending.
    Disconnected,
    /// Channel is being opened.
    Connecting,
    /// Channel is open and the subscribe frame was sent.
    Subscribed,
    /// Waiting for the backoff timer before the next attempt.
    Reconnecting,
}

#[derive(Debug)]
struct Channel {
    task: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Channel {
    /// Asks the channel task to send a close frame and exit.
    fn close(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        drop(self.task);
    }
}

#[derive(Debug)]
struct ChannelState {
    device_id: Option<DeviceId>,
    phase: ObserverPhase,
    reconnect: ReconnectState,
    generation: u64,
    channel: Option<Channel>,
    retry_timer: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct Inner {
    config: ObserverConfig,
    readings: HandlerSet<Reading>,
    events: HandlerSet<DeviceEvent>,
    statuses: HandlerSet<ConnectionStatus>,
    state: Mutex<ChannelState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_channel(self: &Arc<Self>, state: &mut ChannelState, device_id: DeviceId) {
        state.generation += 1;
        state.phase = ObserverPhase::Connecting;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(Arc::clone(self).run_channel(
            device_id,
            state.generation,
            shutdown_rx,
        ));
        state.channel = Some(Channel {
            task,
            shutdown: Some(shutdown_tx),
        });
    }

    async fn run_channel(
        self: Arc<Self>,
        device_id: DeviceId,
        generation: u64,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let url = self.config.ws_url.as_str();
        let opened = tokio::select! {
            result = connect_async(url) => result,
            _ = &mut shutdown => return,
        };
        let stream = match opened {
            Ok((stream, _response)) => stream,
            Err(e) => {
                tracing::warn!(url, %device_id, error = %e, "push channel open failed");
                self.channel_closed(generation);
                return;
            }
        };

        let (mut ws_tx, mut ws_rx) = stream.split();
        let subscribe = Envelope::Subscribe {
            device_id: device_id.clone(),
        };
        let sent = match subscribe.encode() {
            Ok(json) => ws_tx.send(Message::text(json)).await.is_ok(),
            Err(e) => {
                tracing::error!(%device_id, error = %e, "failed to encode subscribe");
                false
            }
        };
        if !sent {
            self.channel_closed(generation);
            return;
        }
        if !self.mark_subscribed(generation) {
            let _ = tokio::time::timeout(CLOSE_GRACE, ws_tx.send(Message::Close(None))).await;
            return;
        }

        loop {
            tokio::select! {
                frame = ws_rx.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.dispatch(text.as_str()),
                        Some(Ok(Message::Close(frame))) => {
                            tracing::debug!(%device_id, ?frame, "relay closed push channel");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!(%device_id, error = %e, "push channel error");
                            break;
                        }
                        None => break,
                    }
                }
                _ = &mut shutdown => {
                    let _ = tokio::time::timeout(CLOSE_GRACE, ws_tx.send(Message::Close(None))).await;
                    return;
                }
            }
        }

        self.channel_closed(generation);
    }

    /// Records a successful open. Returns `false` if the channel has been
    /// superseded in the meantime.
    fn mark_subscribed(&self, generation: u64) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.phase = ObserverPhase::Subscribed;
        state.reconnect.reset();
        tracing::info!(device_id = ?state.device_id, "push channel subscribed");
        true
    }

    fn dispatch(&self, text: &str) {
        match Envelope::decode(text) {
            Ok(Envelope::Reading(reading)) => {
                self.readings.emit(&reading);
            }
            Ok(Envelope::DeviceEvent(event)) => {
                self.events.emit(&event);
            }
            Ok(Envelope::ConnectionStatus { status, device_id }) => {
                tracing::debug!(%device_id, %status, "relay status");
                self.statuses.emit(&status);
            }
            Ok(other) => {
                tracing::warn!(tag = other.tag(), "ignoring unexpected envelope");
            }
            Err(e) => {
                tracing::warn!(error = %e, "dropping push frame");
            }
        }
    }

    fn channel_closed(self: &Arc<Self>, generation: u64) {
        {
            let mut state = self.lock();
            if state.generation != generation {
                return;
            }
            state.channel = None;
            state.phase = ObserverPhase::Disconnected;
        }
        tracing::info!("push channel closed");
        self.statuses.emit(&ConnectionStatus::Disconnected);
        self.schedule_reconnect(generation);
    }

    fn schedule_reconnect(self: &Arc<Self>, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation {
            return;
        }
        let Some(device_id) = state.device_id.clone() else {
            return;
        };

        let policy = self.config.reconnect;
        let Some((attempt, delay)) = state.reconnect.next_retry(&policy) else {
            state.phase = ObserverPhase::Disconnected;
            tracing::warn!(
                %device_id,
                max_attempts = policy.max_attempts,
                "reconnect attempts exhausted"
            );
            return;
        };

        state.phase = ObserverPhase::Reconnecting;
        tracing::info!(
            %device_id,
            attempt,
            delay = ?delay,
            "scheduling reconnect"
        );
        let inner = Arc::clone(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            inner.retry(generation);
        });
        if let Some(previous) = state.retry_timer.replace(timer) {
            previous.abort();
        }
    }

    fn retry(self: &Arc<Self>, generation: u64) {
        let mut state = self.lock();
        if state.generation != generation || state.phase != ObserverPhase::Reconnecting {
            return;
        }
        state.retry_timer = None;
        let Some(device_id) = state.device_id.clone() else {
            return;
        };
        tracing::debug!(%device_id, attempt = state.reconnect.attempts(), "reconnecting");
        self.open_channel(&mut state, device_id);
    }
}

/// Observer-side push-channel client with automatic reconnection.
///
/// Must be used from within a Tokio runtime. Dropping the client
/// disconnects it.
#[derive(Debug)]
pub struct ObserverClient {
    inner: Arc<Inner>,
}

impl ObserverClient {
    /// Creates a disconnected client.
    #[must_use]
    pub fn new(config: ObserverConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                readings: HandlerSet::new(),
                events: HandlerSet::new(),
                statuses: HandlerSet::new(),
                state: Mutex::new(ChannelState {
                    device_id: None,
                    phase: ObserverPhase::Disconnected,
                    reconnect: ReconnectState::default(),
                    generation: 0,
                    channel: None,
                    retry_timer: None,
                }),
            }),
        }
    }

    /// Opens a channel bound to `device_id`.
    ///
    /// A no-op while a channel for the same device is opening or open.
    /// Otherwise any pending retry and any existing channel are cancelled
    /// and the retry budget is restored before the new channel opens.
    pub fn connect(&self, device_id: impl Into<DeviceId>) {
        let device_id = device_id.into();
        let mut state = self.inner.lock();

        if state.device_id.as_ref() == Some(&device_id)
            && matches!(
                state.phase,
                ObserverPhase::Connecting | ObserverPhase::Subscribed
            )
        {
            tracing::debug!(%device_id, "already connected");
            return;
        }

        if let Some(timer) = state.retry_timer.take() {
            timer.abort();
        }
        if let Some(channel) = state.channel.take() {
            channel.close();
        }
        state.reconnect.reset();
        state.device_id = Some(device_id.clone());
        tracing::info!(%device_id, url = %self.inner.config.ws_url, "connecting push channel");
        self.inner.open_channel(&mut state, device_id);
    }

    /// Closes the channel, cancels any pending retry and clears the
    /// device binding.
    ///
    /// Safe to call in any phase and any number of times. Status handlers
    /// receive one `Disconnected` only if a channel was live.
    pub fn disconnect(&self) {
        let had_channel = {
            let mut state = self.inner.lock();
            if let Some(timer) = state.retry_timer.take() {
                timer.abort();
            }
            let had_channel = state.channel.take().map(Channel::close).is_some();
            state.generation += 1;
            state.device_id = None;
            state.reconnect.reset();
            state.phase = ObserverPhase::Disconnected;
            had_channel
        };

        if had_channel {
            tracing::info!("push channel disconnected by caller");
            self.inner.statuses.emit(&ConnectionStatus::Disconnected);
        }
    }

    /// Registers a handler for `reading` envelopes.
    pub fn on_reading<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&Reading) + Send + Sync + 'static,
    {
        self.inner.readings.register(handler)
    }

    /// Registers a handler for `device_event` envelopes.
    pub fn on_event<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&DeviceEvent) + Send + Sync + 'static,
    {
        self.inner.events.register(handler)
    }

    /// Registers a handler for connection status changes.
    pub fn on_status<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        self.inner.statuses.register(handler)
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> ObserverPhase {
        self.inner.lock().phase
    }

    /// Device the client is bound to, if any.
    #[must_use]
    pub fn device_id(&self) -> Option<DeviceId> {
        self.inner.lock().device_id.clone()
    }

    /// Returns `true` while the channel is open and subscribed.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.phase() == ObserverPhase::Subscribed
    }

    /// Reconnect attempts consumed since the last successful open.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.inner.lock().reconnect.attempts()
    }

    /// Returns `true` when the client gave up reconnecting and is waiting
    /// for an explicit [`ObserverClient::connect`].
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        let state = self.inner.lock();
        state.phase == ObserverPhase::Disconnected
            && state.device_id.is_some()
            && state.reconnect.is_exhausted(&self.inner.config.reconnect)
    }
}

impl Drop for ObserverClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}
