//! Fixtures for driving handlers and the scheduler without a running actor.

use frames::{PlaylistItem, RoomState};
use serde_json::Value;

use super::RoomInfo;
use super::dispatch::{Ctx, Dispatcher, Effect, Outcome, Runtime};
use super::handlers::session;
use crate::config::RoomConfig;
use crate::frame::{Data, Frame};
use crate::services::auth::{self, PasswordHash};

pub const T0: i64 = 1_700_000_000_000;

#[must_use]
pub fn room_info(id: &str, is_public: bool) -> RoomInfo {
    RoomInfo {
        id: id.to_owned(),
        name: format!("{id} room"),
        description: String::new(),
        background_seed: 7,
        is_public,
        password: None,
    }
}

#[must_use]
pub fn protected_room_info(id: &str, password: &str) -> RoomInfo {
    let hash = PasswordHash::new(password, auth::MIN_COST).expect("hash password");
    RoomInfo { password: Some(hash), ..room_info(id, false) }
}

/// A room's state plus everything a `Ctx` borrows.
pub struct Fixture {
    pub state: RoomState,
    pub info: RoomInfo,
    pub config: RoomConfig,
    pub runtime: Runtime,
    pub now: i64,
    dispatcher: Dispatcher,
}

impl Fixture {
    #[must_use]
    pub fn public() -> Self {
        Self::with_info(room_info("public", true))
    }

    #[must_use]
    pub fn private() -> Self {
        Self::with_info(room_info("private", false))
    }

    #[must_use]
    pub fn with_info(info: RoomInfo) -> Self {
        let config = RoomConfig::default();
        Self {
            state: RoomState::new(config.booth_count, config.booth_seats),
            info,
            config,
            runtime: Runtime::default(),
            now: T0,
            dispatcher: Dispatcher::new(),
        }
    }

    /// Run a closure against a fresh `Ctx` and collect its effects.
    pub fn run<R>(&mut self, f: impl FnOnce(&mut Ctx<'_>) -> R) -> (R, Vec<Effect>) {
        let mut ctx = Ctx::new(&mut self.state, &self.info, &self.config, &mut self.runtime, self.now);
        let result = f(&mut ctx);
        (result, ctx.effects)
    }

    pub fn dispatch(&mut self, sender: &str, syscall: &str, data: Value) -> (Outcome, Vec<Effect>) {
        let req = request(syscall, data);
        let mut ctx = Ctx::new(&mut self.state, &self.info, &self.config, &mut self.runtime, self.now);
        let outcome = self.dispatcher.dispatch(&mut ctx, sender, &req);
        (outcome, ctx.effects)
    }

    pub fn join(&mut self, id: &str) -> Vec<Effect> {
        self.run(|ctx| session::join(ctx, id, id)).1
    }

    pub fn leave(&mut self, id: &str) -> Vec<Effect> {
        self.run(|ctx| session::leave(ctx, id)).1
    }

    pub fn advance_clock(&mut self, ms: i64) {
        self.now += ms;
    }

    /// Give a player a look-ahead of `(link, duration)` tracks.
    pub fn set_lookahead(&mut self, id: &str, tracks: &[(&str, f64)]) {
        let items = tracks
            .iter()
            .enumerate()
            .map(|(i, (link, duration))| PlaylistItem {
                id: format!("{id}-{i}-{link}"),
                title: (*link).to_owned(),
                link: (*link).to_owned(),
                duration: *duration,
                dj_id: id.to_owned(),
            })
            .collect();
        if let Some(player) = self.state.players.get_mut(id) {
            player.lookahead = items;
        }
    }

    #[must_use]
    pub fn link(&self) -> Option<&str> {
        self.state.music_stream.current_link.as_deref()
    }

    #[must_use]
    pub fn queue(&self) -> Vec<String> {
        self.state.dj_queue.iter().cloned().collect()
    }
}

#[must_use]
pub fn request(syscall: &str, data: Value) -> Frame {
    let data: Data = match data {
        Value::Object(map) => map.into_iter().collect(),
        _ => Data::new(),
    };
    Frame::request(syscall, data)
}

/// Syscalls of every broadcast effect, in order.
#[must_use]
pub fn broadcasts(effects: &[Effect]) -> Vec<&'static str> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Broadcast { syscall, .. } => Some(*syscall),
            _ => None,
        })
        .collect()
}
