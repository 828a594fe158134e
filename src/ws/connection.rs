//! Per-connection read/write loop.
//!
//! Bridges one axum [`WebSocket`] to its session in the
//! [`ConnectionRegistry`]: inbound text frames and pongs go to the
//! registry, queued [`Outbound`] items go to the socket.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use super::{ConnectionRegistry, Outbound};

const PING_PAYLOAD: &[u8] = b"liveness";

/// Runs the read/write loop for a single observer connection.
///
/// The session is registered on entry and always removed on exit,
/// whatever ended the loop.
pub async fn run_connection(socket: WebSocket, registry: Arc<ConnectionRegistry>) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (session_id, mut outbound) = registry.on_open().await;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        registry.on_message(session_id, text.as_str()).await;
                    }
                    Some(Ok(Message::Pong(_))) => registry.on_pong(session_id).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(%session_id, error = %e, "ws read error");
                        break;
                    }
                }
            }
            item = outbound.recv() => {
                match item {
                    Some(Outbound::Text(json)) => {
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Ping) => {
                        let ping = Message::Ping(Bytes::from_static(PING_PAYLOAD));
                        if ws_tx.send(ping).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) => {
                        let _ = ws_tx.send(Message::Close(None)).await;
                        break;
                    }
                    Some(Outbound::Terminate) | None => break,
                }
            }
        }
    }

    registry.on_close(session_id).await;
    tracing::debug!(%session_id, "ws connection closed");
}
