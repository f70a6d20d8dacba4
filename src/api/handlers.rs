use std::collections::HashMap;
use std::time::Duration;

use axum::{
    extract::{
        ws::{close_code, rejection::WebSocketUpgradeRejection, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::hub::{ConnectionId, Frame};
use crate::protocol::{self, ClientPacket, HandshakeError};

use super::error::ApiError;
use super::AppState;

/// Upper bound on a single websocket write before the client counts as hung.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocket, Message>;
type WsStream = SplitStream<WebSocket>;

pub(super) async fn status(State(state): State<AppState>) -> String {
    format!(
        "Desktop YouTube Controller Server running on {}:{}",
        state.settings.host, state.settings.port
    )
}

pub(super) async fn socket_io(
    State(state): State<AppState>,
    Query(query): Query<HashMap<String, String>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, ApiError> {
    protocol::validate_handshake(&query)?;
    if state.shutdown.is_shutting_down() {
        return Err(ApiError::ShuttingDown);
    }
    let ws = ws.map_err(|rejection| {
        tracing::debug!(%rejection, "socket.io request without a websocket upgrade");
        ApiError::Handshake(HandshakeError::BadRequest)
    })?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state)))
}

/// Why an OPEN connection ended.
#[derive(Debug, Clone, Copy)]
enum CloseReason {
    ClientClosed,
    ClientDisconnected,
    TransportError,
    PingTimeout,
    DroppedByHub,
    ServerShutdown,
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (_guard, mut shutdown_rx) = state.shutdown.register();
    if *shutdown_rx.borrow() {
        return;
    }
    let (mut ws_tx, mut ws_rx) = socket.split();

    let engine_sid = uuid::Uuid::new_v4().simple().to_string();
    if !send_text(&mut ws_tx, protocol::open_packet(&engine_sid, &state.heartbeat)).await {
        return;
    }

    let Some((sid, outbound)) =
        await_namespace_connect(&state, &mut ws_tx, &mut ws_rx, &mut shutdown_rx).await
    else {
        tracing::debug!(engine_sid = %engine_sid, "socket closed before joining a namespace");
        return;
    };

    let reason = serve_open(&state, &sid, outbound, &mut ws_tx, &mut ws_rx, &mut shutdown_rx).await;
    state.hub.disconnect(&sid);
    tracing::debug!(sid = %sid, ?reason, "socket closed");
}

/// CONNECTING: wait for the client to join the default namespace.
async fn await_namespace_connect(
    state: &AppState,
    ws_tx: &mut WsSink,
    ws_rx: &mut WsStream,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> Option<(ConnectionId, mpsc::Receiver<Frame>)> {
    let deadline = tokio::time::sleep(protocol::CONNECT_TIMEOUT);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return None,
                    Some(Ok(_)) => continue,
                };
                match protocol::parse_client_packet(text.as_str()) {
                    ClientPacket::Connect { namespace } if namespace == protocol::DEFAULT_NAMESPACE => {
                        let (sid, outbound) = state.hub.connect();
                        if !send_text(ws_tx, protocol::connect_ack(sid.as_str())).await {
                            state.hub.disconnect(&sid);
                            return None;
                        }
                        return Some((sid, outbound));
                    }
                    ClientPacket::Connect { namespace } => {
                        tracing::debug!(namespace = %namespace, "rejecting unknown namespace");
                        let frame = protocol::connect_error(&namespace, "Invalid namespace");
                        if !send_text(ws_tx, frame).await {
                            return None;
                        }
                    }
                    ClientPacket::Ping => {
                        if !send_text(ws_tx, protocol::PONG.to_string()).await {
                            return None;
                        }
                    }
                    ClientPacket::Close => return None,
                    _ => {}
                }
            }

            _ = &mut deadline => {
                tracing::debug!("no namespace connect before timeout");
                send_close(ws_tx, close_code::POLICY, "connect timeout").await;
                return None;
            }

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    send_close(ws_tx, close_code::NORMAL, "server shutting down").await;
                    return None;
                }
            }
        }
    }
}

/// OPEN: forward queued frames, keep the heartbeat going, ignore client events.
async fn serve_open(
    state: &AppState,
    sid: &ConnectionId,
    mut outbound: mpsc::Receiver<Frame>,
    ws_tx: &mut WsSink,
    ws_rx: &mut WsStream,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> CloseReason {
    let heartbeat = state.heartbeat;
    let mut ping = tokio::time::interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
    let mut pong_deadline: Option<Instant> = None;

    loop {
        let pong_wait = async move {
            match pong_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(frame) => {
                        if !send_text(ws_tx, frame.to_string()).await {
                            return CloseReason::TransportError;
                        }
                    }
                    None => {
                        send_close(ws_tx, close_code::POLICY, "client too slow").await;
                        return CloseReason::DroppedByHub;
                    }
                }
            }

            msg = ws_rx.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => return CloseReason::ClientClosed,
                    Some(Err(_)) => return CloseReason::TransportError,
                    Some(Ok(_)) => continue, // Ping/Pong frames handled by axum
                };
                match protocol::parse_client_packet(text.as_str()) {
                    ClientPacket::Pong => pong_deadline = None,
                    ClientPacket::Ping => {
                        if !send_text(ws_tx, protocol::PONG.to_string()).await {
                            return CloseReason::TransportError;
                        }
                    }
                    ClientPacket::Close => return CloseReason::ClientClosed,
                    ClientPacket::Disconnect { namespace } if namespace == protocol::DEFAULT_NAMESPACE => {
                        return CloseReason::ClientDisconnected;
                    }
                    other => tracing::trace!(sid = %sid, ?other, "ignoring client packet"),
                }
            }

            _ = ping.tick() => {
                if !send_text(ws_tx, protocol::PING.to_string()).await {
                    return CloseReason::TransportError;
                }
                if pong_deadline.is_none() {
                    pong_deadline = Some(Instant::now() + heartbeat.timeout);
                }
            }

            _ = pong_wait => {
                tracing::info!(sid = %sid, "browser client missed heartbeat");
                send_close(ws_tx, close_code::AWAY, "ping timeout").await;
                return CloseReason::PingTimeout;
            }

            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    send_close(ws_tx, close_code::NORMAL, "server shutting down").await;
                    return CloseReason::ServerShutdown;
                }
            }
        }
    }
}

/// Write one text frame. Returns false on error or timeout.
async fn send_text(ws_tx: &mut WsSink, text: String) -> bool {
    match tokio::time::timeout(SEND_TIMEOUT, ws_tx.send(Message::Text(text.into()))).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "websocket send failed");
            false
        }
        Err(_) => {
            tracing::warn!("websocket send timed out");
            false
        }
    }
}

async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &'static str) {
    let close_frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    let _ = tokio::time::timeout(SEND_TIMEOUT, async {
        let _ = ws_tx.send(Message::Close(Some(close_frame))).await;
        let _ = ws_tx.flush().await;
    })
    .await;
}
