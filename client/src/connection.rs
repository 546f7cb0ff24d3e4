//! WebSocket connection runner.
//!
//! Owns the socket and a [`SyncSession`]. One `select!` loop multiplexes
//! socket reads, a fixed poll interval for session timers, and commands from
//! the embedding application. The session itself never blocks on I/O.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use crate::ClientError;
use crate::player::MediaPlayer;
use crate::session::{SyncEvent, SyncSession};

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Command from the application to the runner.
#[derive(Debug, Clone)]
pub enum Command {
    Send { syscall: String, data: serde_json::Value },
    Resume,
    Close,
}

/// Build the join URL for a room from an http(s) base URL.
///
/// # Errors
///
/// Returns [`ClientError::InvalidUrl`] if the base does not parse or is not
/// http or https.
pub fn join_url(base_url: &str, room_id: &str, name: &str, password: Option<&str>) -> Result<String, ClientError> {
    let invalid = || ClientError::InvalidUrl(base_url.to_owned());
    let mut url = Url::parse(base_url).map_err(|_| invalid())?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        _ => return Err(invalid()),
    };
    url.set_scheme(scheme).map_err(|()| invalid())?;
    url.path_segments_mut()
        .map_err(|()| invalid())?
        .pop_if_empty()
        .extend(["api", "rooms", room_id, "ws"]);
    {
        let mut query = url.query_pairs_mut();
        query.clear().append_pair("name", name);
        if let Some(password) = password {
            query.append_pair("password", password);
        }
    }
    Ok(url.into())
}

/// Open the socket. A refused upgrade surfaces the server's reason.
///
/// # Errors
///
/// [`ClientError::Rejected`] for 403, [`ClientError::RoomNotFound`] for 404,
/// and [`ClientError::WebSocket`] for anything else.
pub async fn connect(url: &str) -> Result<Socket, ClientError> {
    match connect_async(url).await {
        Ok((socket, _)) => Ok(socket),
        Err(tungstenite::Error::Http(response)) => {
            let status = response.status().as_u16();
            let reason = response
                .body()
                .as_deref()
                .map(|body| String::from_utf8_lossy(body).into_owned())
                .unwrap_or_default();
            Err(match status {
                403 => ClientError::Rejected(reason),
                404 => ClientError::RoomNotFound,
                _ => ClientError::Http { status, reason },
            })
        }
        Err(e) => Err(ClientError::WebSocket(Box::new(e))),
    }
}

/// Drive `session` over `socket` until the server closes, the application
/// sends [`Command::Close`], or the command channel is dropped.
///
/// # Errors
///
/// Transport failures end the run with [`ClientError::WebSocket`].
pub async fn run<P: MediaPlayer>(
    mut socket: Socket,
    session: &mut SyncSession<P>,
    mut commands: mpsc::Receiver<Command>,
    events: mpsc::Sender<SyncEvent>,
) -> Result<(), ClientError> {
    let initial = session.connect(frames::now_ms());
    send_all(&mut socket, initial).await?;

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let result = loop {
        tokio::select! {
            msg = socket.next() => {
                let Some(msg) = msg else { break Ok(()) };
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => break Err(ClientError::WebSocket(Box::new(e))),
                };
                match msg {
                    Message::Binary(bytes) => match frames::decode_frame(&bytes) {
                        Ok(frame) => emit(&events, session.handle_frame(&frame, frames::now_ms())).await,
                        Err(e) => warn!(error = %e, "client: undecodable frame"),
                    },
                    Message::Close(_) => break Ok(()),
                    _ => {}
                }
            }
            _ = poll.tick() => {
                emit(&events, session.poll(frames::now_ms())).await;
            }
            cmd = commands.recv() => match cmd {
                Some(Command::Send { syscall, data }) => {
                    session.send(&syscall, data);
                }
                Some(Command::Resume) => session.resume(frames::now_ms()),
                Some(Command::Close) | None => {
                    let _ = socket.close(None).await;
                    break Ok(());
                }
            },
        }

        let outbox = session.take_outbox();
        if let Err(e) = send_all(&mut socket, outbox).await {
            break Err(e);
        }
    };

    session.teardown();
    info!("client: connection closed");
    result
}

async fn send_all(socket: &mut Socket, frames_out: Vec<frames::Frame>) -> Result<(), ClientError> {
    for frame in frames_out {
        debug!(syscall = %frame.syscall, id = %frame.id, "client: send frame");
        let bytes = frames::encode_frame(&frame);
        socket
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| ClientError::WebSocket(Box::new(e)))?;
    }
    Ok(())
}

async fn emit(events: &mpsc::Sender<SyncEvent>, batch: Vec<SyncEvent>) {
    for event in batch {
        // A dropped receiver only means nobody is listening.
        let _ = events.send(event).await;
    }
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
