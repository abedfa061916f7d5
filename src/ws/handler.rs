//! WebSocket upgrade and session handling

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::movement::{WORLD_H, WORLD_W};
use crate::game::{SessionEvent, SessionInput};
use crate::util::rate_limit::InputRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::latency::{delay_line, DelayedSender};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sink, ws_stream) = socket.split();
    let latency = state.config.latency;

    // Allocate a player slot before anything goes over the wire.
    let slot = match state.sessions.connect() {
        Err(e) => {
            info!(error = %e, "Connection rejected");
            // The rejection rides the same simulated wire as every other
            // outbound message.
            tokio::time::sleep(latency).await;
            let _ = send_msg(&mut ws_sink, &ServerMsg::Full).await;
            let _ = ws_sink.close().await;
            return;
        }
        Ok(slot) => slot,
    };

    let session_id = slot.session_id;
    info!(session_id = %session_id, slot = slot.slot, "New WebSocket connection");

    // Announce the player to the arena loop first so the earliest
    // snapshot the client can see already includes it.
    let joined = SessionInput {
        session_id,
        event: SessionEvent::Joined {
            spawn_x: slot.spawn_x,
            spawn_y: slot.spawn_y,
            color: slot.color.clone(),
        },
        received_at: unix_millis(),
    };
    if state.arena.input_tx.send(joined).await.is_err() {
        error!(session_id = %session_id, "Arena input channel closed");
        state.sessions.disconnect(session_id);
        return;
    }

    // Outbound path: messages enter a delay line; a writer task drains
    // delivered messages onto the socket.
    let (out_tx, mut out_rx) = delay_line::<ServerMsg>(latency, 128);

    let welcome = ServerMsg::Welcome {
        player_id: session_id,
        world_w: WORLD_W,
        world_h: WORLD_H,
        color: slot.color.clone(),
        round_secs: state.config.round_duration.as_secs(),
    };
    let welcome_sent = out_tx.send(welcome).await.is_ok();

    let writer_session_id = session_id;
    let mut writer_handle = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(session_id = %writer_session_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Broadcast pump: arena snapshots into the outbound delay line.
    let mut snapshot_rx = state.arena.subscribe();
    let pump_out_tx = out_tx.clone();
    let pump_session_id = session_id;
    let pump_handle = tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(msg) => {
                    if pump_out_tx.send(msg).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        session_id = %pump_session_id,
                        lagged_count = n,
                        "Client lagged, skipping {} snapshots", n
                    );
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Inbound path: parsed events pass through their own delay line
    // before they reach the arena queue.
    let (in_tx, mut in_rx) = delay_line::<SessionInput>(latency, 128);
    let arena_tx = state.arena.input_tx.clone();
    let inbound_handle = tokio::spawn(async move {
        while let Some(input) = in_rx.recv().await {
            if arena_tx.send(input).await.is_err() {
                break;
            }
        }
    });

    state.sessions.activate(session_id);

    if welcome_sent {
        // A write failure ends the writer task; treat that as a
        // disconnect rather than waiting for the reader to notice.
        tokio::select! {
            _ = read_loop(session_id, ws_stream, in_tx, state.config.idle_timeout) => {}
            _ = &mut writer_handle => {
                info!(session_id = %session_id, "Writer ended, tearing down session");
            }
        }
    } else {
        error!(session_id = %session_id, "Outbound relay closed before welcome");
    }

    // Teardown: kill the relay tasks (dropping anything still in
    // flight) and tell the arena directly so the slot frees promptly.
    writer_handle.abort();
    pump_handle.abort();
    inbound_handle.abort();

    let left = SessionInput {
        session_id,
        event: SessionEvent::Left,
        received_at: unix_millis(),
    };
    let _ = state.arena.input_tx.send(left).await;
    state.sessions.disconnect(session_id);

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Reader loop: socket frames to inbound delay line. Returns on close,
/// error, or idle timeout.
async fn read_loop(
    session_id: Uuid,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    in_tx: DelayedSender<SessionInput>,
    idle_timeout: Duration,
) {
    let rate_limiter = InputRateLimiter::default();

    loop {
        let frame = match tokio::time::timeout(idle_timeout, ws_stream.next()).await {
            Ok(frame) => frame,
            Err(_) => {
                info!(session_id = %session_id, "No frames within idle timeout, disconnecting");
                break;
            }
        };

        let Some(result) = frame else {
            break;
        };

        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check() {
                    warn!(session_id = %session_id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        let event = match msg {
                            ClientMsg::Input { seq, dx, dy } => SessionEvent::Input { seq, dx, dy },
                            ClientMsg::Ping { t } => SessionEvent::Ping { t },
                        };
                        let input = SessionInput {
                            session_id,
                            event,
                            received_at: unix_millis(),
                        };

                        if in_tx.send(input).await.is_err() {
                            debug!(session_id = %session_id, "Input relay closed");
                            break;
                        }
                    }
                    Err(e) => {
                        // Malformed input is dropped; the session stays up.
                        warn!(session_id = %session_id, error = %e, "Malformed client message dropped");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(session_id = %session_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(session_id = %session_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
