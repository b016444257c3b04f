use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::time::{interval, timeout};

use crate::auth::jwt::Claims;
use crate::state::AppState;
use crate::ws::protocol;
use crate::ws::rooms::{RoomMember, OUTBOUND_QUEUE};

/// Ping interval: server sends WebSocket ping every 30 seconds.
/// Prevents connection leaks from abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if pong not received within 10 seconds after ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the actor-per-connection pattern for one strategic-map socket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, drains the connection's bounded outbound queue
/// - Reader task: processes incoming frames, dispatches to the relay
///
/// `identity` is None for connections that presented no valid credential;
/// they join the room and receive broadcasts but their own events are
/// dropped by the protocol layer.
pub async fn run_connection(
    socket: WebSocket,
    state: AppState,
    project_id: i64,
    identity: Option<Claims>,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::channel::<Message>(OUTBOUND_QUEUE);
    let kill = Arc::new(Notify::new());

    let conn_id = state.rooms.next_conn_id();
    let user_id = identity.as_ref().map(|c| c.sub);
    let username = identity.as_ref().map(|c| c.username.clone());

    state.rooms.join(
        project_id,
        RoomMember {
            conn_id,
            user_id,
            username: username.clone(),
            tx: tx.clone(),
            kill: kill.clone(),
        },
    );

    tracing::info!(
        project_id,
        conn_id,
        user_id = ?user_id,
        "Strategic map actor started"
    );

    // Spawn writer task: forwards queued messages to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            // Send ping
            if ping_tx
                .send(Message::Ping(vec![1, 2, 3, 4].into()))
                .await
                .is_err()
            {
                // Writer task has died — connection is gone
                break;
            }

            // Wait for pong within timeout
            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    // Pong timeout or channel closed — close connection
                    tracing::warn!(conn_id, "Pong timeout, closing connection");
                    let _ = ping_tx
                        .send(Message::Close(Some(CloseFrame {
                            code: 1001,
                            reason: "Pong timeout".into(),
                        })))
                        .await;
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket frames until the client goes
    // away or the registry kills a stalled connection.
    loop {
        tokio::select! {
            _ = kill.notified() => {
                tracing::warn!(conn_id, "Connection killed (outbound queue overflow)");
                break;
            }
            next = ws_receiver.next() => match next {
                Some(Ok(msg)) => match msg {
                    Message::Text(text) => {
                        protocol::handle_frame(text.as_str(), &state, project_id, user_id).await;
                    }
                    Message::Binary(_) => {
                        // The protocol is JSON text frames; binary is ignored
                        tracing::debug!(conn_id, "Ignoring binary frame");
                    }
                    Message::Pong(_) => {
                        // Pong received — notify the ping task
                        let _ = pong_tx.send(());
                    }
                    Message::Ping(data) => {
                        // Respond to client pings with pong
                        let _ = tx.try_send(Message::Pong(data));
                    }
                    Message::Close(frame) => {
                        tracing::info!(conn_id, reason = ?frame, "Client initiated close");
                        break;
                    }
                },
                Some(Err(e)) => {
                    tracing::warn!(conn_id, error = %e, "WebSocket receive error");
                    break;
                }
                None => {
                    // Stream ended — client disconnected
                    tracing::info!(conn_id, "WebSocket stream ended");
                    break;
                }
            }
        }
    }

    // Cleanup: abort writer and ping tasks; in-flight sends are abandoned
    writer_handle.abort();
    ping_handle.abort();

    state.rooms.leave(project_id, conn_id);

    tracing::info!(
        project_id,
        conn_id,
        user_id = ?user_id,
        "Strategic map actor stopped"
    );
}

/// Writer task: receives messages from the bounded queue and forwards them
/// to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
