// WebSocket handlers and stream logic

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use bytes::Bytes;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::coordinator::Published;
use crate::models::RepairEvent;

pub(super) const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends one JSON text frame; `Ok(false)` when the client is gone or too slow.
async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> anyhow::Result<bool> {
    let json = serde_json::to_string(value)?;
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
    Ok(matches!(r, Ok(Ok(()))))
}

async fn send_ping(socket: &mut WebSocket) -> bool {
    let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Ping(Bytes::new()))).await;
    matches!(r, Ok(Ok(())))
}

pub(super) async fn ws_state(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let rx = state.published_rx.clone();
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_state(socket, rx).await {
            tracing::info!("State stream error: {}", e);
        }
    })
}

/// Current published state first, then every change.
async fn stream_state(mut socket: WebSocket, mut rx: watch::Receiver<Published>) -> anyhow::Result<()> {
    tracing::info!("Client connected to state stream");
    let current = rx.borrow_and_update().clone();
    if !send_json(&mut socket, &current).await? {
        return Ok(());
    }

    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping_interval.tick().await;
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let published = rx.borrow_and_update().clone();
                if !send_json(&mut socket, &published).await? {
                    break;
                }
            }
            _ = ping_interval.tick() => {
                if !send_ping(&mut socket).await {
                    break;
                }
            }
        }
    }
    Ok(())
}

pub(super) async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let tx = state.events_tx.clone();
    ws.on_upgrade(move |socket| async move {
        let mut rx = tx.subscribe();
        if let Err(e) = stream_events(socket, &mut rx).await {
            tracing::info!("Repair event stream error: {}", e);
        }
    })
}

async fn stream_events(
    mut socket: WebSocket,
    rx: &mut broadcast::Receiver<RepairEvent>,
) -> anyhow::Result<()> {
    tracing::info!("Client connected to repair event stream");
    let mut ping_interval = tokio::time::interval(WS_PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    ping_interval.tick().await;
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        if !send_json(&mut socket, &event).await? {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("WebSocket /ws/events client lagged, skipped {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ping_interval.tick() => {
                if !send_ping(&mut socket).await {
                    break;
                }
            }
        }
    }
    Ok(())
}
