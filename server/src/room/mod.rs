//! Room actor: one tokio task owns one room's state.
//!
//! ARCHITECTURE
//! ============
//! Connections talk to a room through a [`RoomHandle`], which wraps the
//! sender half of the room's mailbox. The actor loop pulls commands one at
//! a time, so handlers never race and need no locks:
//!
//! 1. snapshot `RoomState`
//! 2. run the handler or timer against a [`dispatch::Ctx`]
//! 3. diff old vs new, bump `version`, broadcast one `room:patch`
//! 4. turn recorded effects into frames and timers
//!
//! Timers (punch impact, knockback, track watchdog) are tasks in the room's
//! `JoinSet` that post back into the mailbox. The heartbeat is an interval
//! inside the loop.
//!
//! LIFECYCLE
//! =========
//! Private rooms stop when their last session leaves. The public room lives
//! until shutdown. Stopping aborts every timer; the registry drops the
//! handle once the task has finished.

pub mod dispatch;
pub mod handlers;
pub mod scheduler;

#[cfg(test)]
pub mod test_helpers;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use frames::{RoomData, RoomState, SessionId, diff};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::RoomConfig;
use crate::frame::{Data, ErrorCode, Frame, now_ms};
use crate::services::auth::{PasswordHash, check_password};
use dispatch::{Ctx, Dispatcher, Effect, Outcome, Runtime, Timer};
use handlers::{player, session};

/// Room id of the always-on public lobby.
pub const PUBLIC_ROOM_ID: &str = "public";

/// Background seed of the public lobby.
pub const PUBLIC_BACKGROUND_SEED: u32 = 3;

/// Outbound frames buffered per session before sends start failing.
pub const CLIENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("password required")]
    PasswordRequired,
    #[error("password incorrect")]
    PasswordIncorrect,
    #[error("room closed")]
    Closed,
    #[error("room not found: {0}")]
    NotFound(String),
    #[error("invalid room name")]
    InvalidName,
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] bcrypt::BcryptError),
}

impl ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::PasswordRequired => "E_PASSWORD_REQUIRED",
            Self::PasswordIncorrect => "E_PASSWORD_INCORRECT",
            Self::Closed => "E_ROOM_CLOSED",
            Self::NotFound(_) => "E_ROOM_NOT_FOUND",
            Self::InvalidName => "E_ROOM_NAME",
            Self::PasswordHash(_) => "E_PASSWORD_HASH",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Immutable facts about a room.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub background_seed: u32,
    pub is_public: bool,
    pub password: Option<PasswordHash>,
}

impl RoomInfo {
    /// Check a join password before the websocket upgrade.
    pub fn authorize(&self, password: Option<&str>) -> Result<(), RoomError> {
        check_password(self.password.as_ref(), password)
    }

    #[must_use]
    pub fn data(&self) -> RoomData {
        RoomData {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            background_seed: self.background_seed,
        }
    }
}

#[derive(Debug)]
pub enum RoomCommand {
    Join { session_id: SessionId, name: String, tx: mpsc::Sender<Frame>, reply: oneshot::Sender<()> },
    Leave { session_id: SessionId },
    Inbound { session_id: SessionId, frame: Frame },
    Timer(Timer),
    Shutdown,
}

/// Cheap, cloneable address of a running room.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    pub info: Arc<RoomInfo>,
    tx: mpsc::Sender<RoomCommand>,
    clients: Arc<AtomicUsize>,
}

impl RoomHandle {
    /// Register a session. Resolves once the joiner's welcome frames are
    /// queued on `tx`.
    pub async fn join(&self, session_id: SessionId, name: String, tx: mpsc::Sender<Frame>) -> Result<(), RoomError> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(RoomCommand::Join { session_id, name, tx, reply })
            .await
            .map_err(|_| RoomError::Closed)?;
        done.await.map_err(|_| RoomError::Closed)
    }

    pub async fn send(&self, session_id: SessionId, frame: Frame) -> Result<(), RoomError> {
        self.tx
            .send(RoomCommand::Inbound { session_id, frame })
            .await
            .map_err(|_| RoomError::Closed)
    }

    pub async fn leave(&self, session_id: SessionId) {
        let _ = self.tx.send(RoomCommand::Leave { session_id }).await;
    }

    pub async fn shutdown(&self) {
        let _ = self.tx.send(RoomCommand::Shutdown).await;
    }

    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Start a room task. The join handle completes once the room is disposed.
#[must_use]
pub fn spawn_room(info: RoomInfo, config: Arc<RoomConfig>) -> (RoomHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(config.mailbox_capacity);
    let info = Arc::new(info);
    let clients = Arc::new(AtomicUsize::new(0));
    let room = Room {
        state: RoomState::new(config.booth_count, config.booth_seats),
        info: info.clone(),
        config,
        runtime: Runtime::default(),
        dispatcher: Arc::new(Dispatcher::new()),
        clients: HashMap::new(),
        client_count: clients.clone(),
        timers: JoinSet::new(),
        watchdog: None,
        mailbox: tx.downgrade(),
    };
    let task = tokio::spawn(room.run(rx));
    (RoomHandle { info, tx, clients }, task)
}

// =============================================================================
// ACTOR
// =============================================================================

struct Room {
    info: Arc<RoomInfo>,
    config: Arc<RoomConfig>,
    state: RoomState,
    runtime: Runtime,
    dispatcher: Arc<Dispatcher>,
    clients: HashMap<SessionId, mpsc::Sender<Frame>>,
    client_count: Arc<AtomicUsize>,
    timers: JoinSet<()>,
    watchdog: Option<AbortHandle>,
    /// Weak so pending timers do not keep an abandoned room alive.
    mailbox: mpsc::WeakSender<RoomCommand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

impl Room {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        info!(room_id = %self.info.id, public = self.info.is_public, "room: started");
        let mut heartbeat = tokio::time::interval(self.config.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                maybe_cmd = rx.recv() => {
                    let Some(cmd) = maybe_cmd else { break };
                    if self.handle(cmd) == Flow::Stop {
                        break;
                    }
                }
                _ = heartbeat.tick() => self.heartbeat(),
                Some(_) = self.timers.join_next(), if !self.timers.is_empty() => {}
            }
        }

        self.dispose();
    }

    fn handle(&mut self, cmd: RoomCommand) -> Flow {
        match cmd {
            RoomCommand::Join { session_id, name, tx, reply } => {
                self.join(session_id, &name, tx);
                let _ = reply.send(());
            }
            RoomCommand::Leave { session_id } => {
                if self.clients.remove(&session_id).is_none() {
                    return Flow::Continue;
                }
                self.client_count.store(self.clients.len(), Ordering::Relaxed);
                self.run_cycle(None, |ctx| session::leave(ctx, &session_id));
                if self.clients.is_empty() && !self.info.is_public {
                    info!(room_id = %self.info.id, "room: last session left");
                    return Flow::Stop;
                }
            }
            RoomCommand::Inbound { session_id, frame } => self.inbound(&session_id, &frame),
            RoomCommand::Timer(timer) => self.fire(timer),
            RoomCommand::Shutdown => return Flow::Stop,
        }
        Flow::Continue
    }

    fn join(&mut self, session_id: SessionId, name: &str, tx: mpsc::Sender<Frame>) {
        // Everyone already present learns about the newcomer through a
        // patch; the newcomer gets a snapshot instead.
        self.run_cycle(None, |ctx| session::join(ctx, &session_id, name));

        self.send_to(&tx, "room:data", room_data(&self.info));
        self.send_to(&tx, "room:snapshot", session::snapshot_payload(&self.state));
        if self.state.music_stream.is_playing() {
            self.send_to(&tx, "music:start", scheduler::start_payload(&self.state.music_stream, now_ms()));
        }
        self.clients.insert(session_id, tx);
        self.client_count.store(self.clients.len(), Ordering::Relaxed);

        self.run_cycle(None, scheduler::ensure_ambient);
    }

    fn inbound(&mut self, session_id: &str, req: &Frame) {
        let Some(tx) = self.clients.get(session_id).cloned() else {
            return;
        };
        let dispatcher = Arc::clone(&self.dispatcher);
        // Only the mover's own echo is filtered; everything else goes to all.
        let mover = (req.syscall == "player:action").then_some(session_id);
        let outcome = self.run_cycle(mover, |ctx| dispatcher.dispatch(ctx, session_id, req));

        let reply = match outcome {
            Outcome::Ignored(reason) => {
                debug!(room_id = %self.info.id, %session_id, syscall = %req.syscall, reason, "room: command ignored");
                return;
            }
            Outcome::Applied => return,
            Outcome::Done => req.done(),
            Outcome::Reply(data) => req.done_with(data),
        };
        self.deliver(&tx, reply);
    }

    fn fire(&mut self, timer: Timer) {
        self.run_cycle(None, |ctx| match &timer {
            Timer::PunchImpact { target, anim, from } => player::punch_impact(ctx, target, anim, *from),
            Timer::Knockback { target, from } => player::knockback(ctx, target, *from),
            Timer::TrackEnded { stream_id } => scheduler::track_ended(ctx, *stream_id),
        });
    }

    fn heartbeat(&mut self) {
        if let Some(data) = scheduler::heartbeat(&self.state.music_stream, now_ms()) {
            self.broadcast("music:tick", &data);
        }
    }

    /// Run one atomic step: mutate, publish the patch, then the effects.
    fn run_cycle<R>(&mut self, mover: Option<&str>, step: impl FnOnce(&mut Ctx<'_>) -> R) -> R {
        let before = self.state.clone();
        let mut ctx = Ctx::new(&mut self.state, &self.info, &self.config, &mut self.runtime, now_ms());
        let result = step(&mut ctx);
        let effects = std::mem::take(&mut ctx.effects);

        if let Some(patch) = diff(&before, &self.state) {
            self.state.version = patch.to_version;
            let shared = patch_payload(&patch);
            for (id, tx) in &self.clients {
                let data = match mover {
                    Some(mover) if mover == id => patch_payload(&patch.for_recipient(id)),
                    _ => shared.clone(),
                };
                deliver(&self.info.id, tx, self.event("room:patch", data));
            }
        }

        for effect in effects {
            self.apply(effect);
        }
        result
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Broadcast { syscall, data } => self.broadcast(syscall, &data),
            Effect::BroadcastExcept { except, syscall, data } => {
                for (id, tx) in &self.clients {
                    if *id != except {
                        deliver(&self.info.id, tx, self.event(syscall, data.clone()));
                    }
                }
            }
            Effect::Send { to, syscall, data } => {
                if let Some(tx) = self.clients.get(&to) {
                    deliver(&self.info.id, tx, self.event(syscall, data));
                }
            }
            Effect::Schedule { after, timer } => {
                self.schedule(after, timer);
            }
            Effect::ArmWatchdog { stream_id, after } => {
                self.cancel_watchdog();
                debug!(room_id = %self.info.id, stream_id, after_ms = after.as_millis(), "scheduler: watchdog armed");
                self.watchdog = Some(self.schedule(after, Timer::TrackEnded { stream_id }));
            }
            Effect::CancelWatchdog => self.cancel_watchdog(),
        }
    }

    fn schedule(&mut self, after: Duration, timer: Timer) -> AbortHandle {
        let mailbox = self.mailbox.clone();
        self.timers.spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(tx) = mailbox.upgrade() {
                let _ = tx.send(RoomCommand::Timer(timer)).await;
            }
        })
    }

    fn cancel_watchdog(&mut self) {
        if let Some(handle) = self.watchdog.take() {
            handle.abort();
        }
    }

    fn event(&self, syscall: &str, data: Data) -> Frame {
        Frame::request(syscall, data).with_room_id(self.info.id.clone())
    }

    fn broadcast(&self, syscall: &str, data: &Data) {
        for tx in self.clients.values() {
            deliver(&self.info.id, tx, self.event(syscall, data.clone()));
        }
    }

    fn send_to(&self, tx: &mpsc::Sender<Frame>, syscall: &str, data: Data) {
        deliver(&self.info.id, tx, self.event(syscall, data));
    }

    fn deliver(&self, tx: &mpsc::Sender<Frame>, frame: Frame) {
        deliver(&self.info.id, tx, frame);
    }

    fn dispose(&mut self) {
        self.timers.abort_all();
        self.watchdog = None;
        self.clients.clear();
        self.client_count.store(0, Ordering::Relaxed);
        info!(room_id = %self.info.id, "room: disposed");
    }
}

/// Best-effort send. A full or closed client channel never stalls the room.
fn deliver(room_id: &str, tx: &mpsc::Sender<Frame>, frame: Frame) {
    if let Err(err) = tx.try_send(frame) {
        warn!(%room_id, error = %err, "room: client send failed");
    }
}

fn room_data(info: &RoomInfo) -> Data {
    match serde_json::to_value(info.data()) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => Data::new(),
    }
}

fn patch_payload(patch: &frames::Patch) -> Data {
    let mut data = Data::new();
    data.insert("patch".into(), serde_json::to_value(patch).unwrap_or(Value::Null));
    data
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
