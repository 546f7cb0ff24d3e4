//! WebSocket handler: bidirectional frame relay between a socket and a room.
//!
//! DESIGN
//! ======
//! The password is checked before the upgrade, so a rejected join never
//! opens a socket. After the upgrade the connection task runs a `select!`
//! loop:
//! - inbound client frames -> decode -> forward to the room mailbox
//! - frames from the room (replies, patches, events) -> encode -> socket
//!
//! `clock:sync` is answered right here instead of going through the room
//! mailbox, so a command backlog never inflates the measured round trip.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade -> send `session:connected` with `clientId`
//! 2. Join the room (room sends `room:data`, `room:snapshot`, `music:start`)
//! 3. Relay until close
//! 4. Leave the room, which tears down seats and queue membership

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{Data, ErrorCode, Frame, FrameError, Status, now_ms};
use crate::room::dispatch::ROOM_PREFIXES;
use crate::room::{CLIENT_CHANNEL_CAPACITY, RoomError, RoomHandle};
use crate::routes::rooms::room_error_to_status;
use crate::state::AppState;

/// High-rate syscalls logged at debug instead of info.
const QUIET_SYSCALLS: [&str; 4] = ["player:action", "room:patch", "music:tick", "clock:sync"];

#[derive(Debug, Default, Deserialize)]
pub struct JoinParams {
    pub name: Option<String>,
    pub password: Option<String>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(params): Query<JoinParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(room) = state.registry.get(&room_id).await else {
        let err = RoomError::NotFound(room_id);
        return (room_error_to_status(&err), err.to_string()).into_response();
    };
    if let Err(e) = room.info.authorize(params.password.as_deref()) {
        warn!(%room_id, code = e.error_code(), "ws: join rejected");
        return (room_error_to_status(&e), e.to_string()).into_response();
    }

    let name = params.name.unwrap_or_default();
    ws.on_upgrade(move |socket| run_ws(socket, room, name))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, room: RoomHandle, name: String) {
    let client_id = Uuid::new_v4();
    let session_id = client_id.to_string();
    let room_id = room.info.id.clone();

    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(CLIENT_CHANNEL_CAPACITY);

    let welcome = Frame::request("session:connected", Data::new())
        .with_room_id(room_id.clone())
        .with_data("clientId", session_id.clone());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    if let Err(e) = room.join(session_id.clone(), name, client_tx).await {
        let _ = send_frame(&mut socket, &welcome.error_from(&e)).await;
        return;
    }
    info!(%room_id, %client_id, "ws: client connected");

    'conn: loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let parsed = match msg {
                    Message::Binary(bytes) => decode_binary(&bytes),
                    Message::Text(text) => decode_text(text.as_str()),
                    Message::Close(_) => break,
                    _ => continue,
                };
                for frame in process_inbound(&room, &session_id, parsed).await {
                    if send_frame(&mut socket, &frame).await.is_err() {
                        break 'conn;
                    }
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    room.leave(session_id).await;
    info!(%room_id, %client_id, "ws: client disconnected");
}

// =============================================================================
// INBOUND
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid frame: {0}")]
    Decode(#[from] frames::CodecError),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error("unknown syscall prefix: {0}")]
    UnknownPrefix(String),
}

impl ErrorCode for GatewayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Decode(_) | Self::Json(_) => "E_DECODE",
            Self::Frame(e) => e.error_code(),
            Self::UnknownPrefix(_) => "E_UNKNOWN_PREFIX",
        }
    }
}

fn decode_binary(bytes: &[u8]) -> Result<Frame, GatewayError> {
    Ok(Frame::try_from(frames::decode_frame(bytes)?)?)
}

fn decode_text(text: &str) -> Result<Frame, GatewayError> {
    let wire: frames::Frame = serde_json::from_str(text)?;
    Ok(Frame::try_from(wire)?)
}

/// Handle one decoded inbound frame and return frames for the sender only.
async fn process_inbound(room: &RoomHandle, session_id: &str, parsed: Result<Frame, GatewayError>) -> Vec<Frame> {
    let req = match parsed {
        Ok(req) => req,
        Err(e) => {
            warn!(%session_id, error = %e, "ws: invalid inbound frame");
            return vec![gateway_error(&e)];
        }
    };

    // The connection, not the client, decides who sent it and where.
    let req = req.with_from(session_id).with_room_id(room.info.id.clone());
    log_frame("recv", &req);

    if req.status != Status::Request {
        return Vec::new();
    }
    if req.prefix() == "clock" {
        return handle_clock_sync(&req).into_iter().collect();
    }
    if !ROOM_PREFIXES.contains(&req.prefix()) {
        return vec![req.error_from(&GatewayError::UnknownPrefix(req.prefix().to_owned()))];
    }
    match room.send(session_id.to_owned(), req.clone()).await {
        Ok(()) => Vec::new(),
        Err(e) => vec![req.error_from(&e)],
    }
}

fn gateway_error(err: &GatewayError) -> Frame {
    Frame::request("gateway:error", Data::new())
        .with_data("code", err.error_code())
        .with_data("message", err.to_string())
}

/// Reply `{clientSentAtMs, serverNowMs}`. Non-finite timestamps are dropped.
fn handle_clock_sync(req: &Frame) -> Option<Frame> {
    if req.syscall != "clock:sync" {
        return None;
    }
    let sent = req.get_f64("clientSentAtMs")?;
    let mut data = Data::new();
    data.insert("clientSentAtMs".into(), sent.into());
    data.insert("serverNowMs".into(), now_ms().into());
    Some(req.done_with(data))
}

// =============================================================================
// OUTBOUND
// =============================================================================

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), axum::Error> {
    log_frame("send", frame);
    let bytes = frames::encode_frame(&frames::Frame::from(frame));
    socket.send(Message::Binary(bytes.into())).await
}

fn log_frame(direction: &str, frame: &Frame) {
    if frame.status == Status::Error {
        let code = frame.data.get("code").and_then(|v| v.as_str()).unwrap_or("-");
        let message = frame.data.get("message").and_then(|v| v.as_str()).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: {direction} frame status=Error");
    } else if QUIET_SYSCALLS.contains(&frame.syscall.as_str()) {
        debug!(id = %frame.id, syscall = %frame.syscall, "ws: {direction} frame");
    } else {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: {direction} frame");
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
