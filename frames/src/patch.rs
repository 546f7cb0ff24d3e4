//! Versioned diff/patch over `RoomState`.
//!
//! DESIGN
//! ======
//! The server snapshots state before a command, runs it, and calls [`diff`]
//! to get the per-entity changes. Each patch moves the version forward by
//! exactly one, so a client that missed a patch detects the gap on
//! [`RoomState::apply`] and asks for a fresh snapshot instead of drifting.
//!
//! Players report a position-only change as `playerMoved` (the hot path at
//! movement rate); any other player field change ships the whole record.

use serde::{Deserialize, Serialize};

use crate::model::{ChatMessage, MusicBooth, MusicStream, Player, RoomPlaylistItem, RoomState, SessionId};
use crate::queue::DjQueue;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("patch starts at version {got}, local state is at {expected}")]
    VersionGap { expected: u64, got: u64 },
    #[error("patch references unknown player {0}")]
    UnknownPlayer(SessionId),
    #[error("patch references unknown booth {0}")]
    UnknownBooth(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Change {
    PlayerUpserted { player: Player },
    PlayerLeft { id: SessionId },
    PlayerMoved { id: SessionId, x: f64, y: f64, anim: String },
    BoothChanged { index: usize, booth: MusicBooth },
    DjQueueChanged { queue: DjQueue },
    RoomPlaylistChanged { items: Vec<RoomPlaylistItem> },
    MusicStreamChanged { stream: MusicStream },
    /// `retain` is the history length after the append.
    ChatAppended { message: ChatMessage, retain: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patch {
    pub from_version: u64,
    pub to_version: u64,
    pub changes: Vec<Change>,
}

impl Patch {
    /// Copy of this patch without the recipient's own movement echoes.
    /// The version still advances so the recipient stays contiguous.
    #[must_use]
    pub fn for_recipient(&self, id: &str) -> Patch {
        Patch {
            from_version: self.from_version,
            to_version: self.to_version,
            changes: self
                .changes
                .iter()
                .filter(|change| !matches!(change, Change::PlayerMoved { id: moved, .. } if moved == id))
                .cloned()
                .collect(),
        }
    }
}

/// Compute the patch that takes `old` to `new`, or `None` if nothing changed.
/// The `version` fields themselves are not compared.
#[must_use]
pub fn diff(old: &RoomState, new: &RoomState) -> Option<Patch> {
    let mut changes = Vec::new();

    for (id, player) in &new.players {
        match old.players.get(id) {
            Some(prev) if prev == player => {}
            Some(prev) if only_moved(prev, player) => changes.push(Change::PlayerMoved {
                id: id.clone(),
                x: player.x,
                y: player.y,
                anim: player.anim.clone(),
            }),
            _ => changes.push(Change::PlayerUpserted { player: player.clone() }),
        }
    }
    for id in old.players.keys() {
        if !new.players.contains_key(id) {
            changes.push(Change::PlayerLeft { id: id.clone() });
        }
    }

    for (index, booth) in new.booths.iter().enumerate() {
        if old.booths.get(index) != Some(booth) {
            changes.push(Change::BoothChanged { index, booth: booth.clone() });
        }
    }

    if old.dj_queue != new.dj_queue {
        changes.push(Change::DjQueueChanged { queue: new.dj_queue.clone() });
    }
    if old.room_playlist != new.room_playlist {
        changes.push(Change::RoomPlaylistChanged { items: new.room_playlist.clone() });
    }
    if old.music_stream != new.music_stream {
        changes.push(Change::MusicStreamChanged { stream: new.music_stream.clone() });
    }

    let last_seq = old.chat.back().map(|message| message.seq);
    for message in &new.chat {
        if last_seq.is_none_or(|seq| message.seq > seq) {
            changes.push(Change::ChatAppended { message: message.clone(), retain: new.chat.len() });
        }
    }

    if changes.is_empty() {
        return None;
    }
    Some(Patch { from_version: old.version, to_version: old.version + 1, changes })
}

fn only_moved(prev: &Player, next: &Player) -> bool {
    let moved = Player { x: next.x, y: next.y, anim: next.anim.clone(), ..prev.clone() };
    moved == *next
}

impl RoomState {
    /// Apply a patch produced by [`diff`]. All-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::VersionGap`] if the patch does not start at the
    /// local version, or an unknown-reference error if a change targets an
    /// entity the local state does not have. Local state is untouched on error.
    pub fn apply(&mut self, patch: &Patch) -> Result<(), PatchError> {
        if patch.from_version != self.version {
            return Err(PatchError::VersionGap { expected: self.version, got: patch.from_version });
        }

        let mut next = self.clone();
        for change in &patch.changes {
            next.apply_change(change)?;
        }
        next.version = patch.to_version;
        *self = next;
        Ok(())
    }

    fn apply_change(&mut self, change: &Change) -> Result<(), PatchError> {
        match change {
            Change::PlayerUpserted { player } => {
                self.players.insert(player.id.clone(), player.clone());
            }
            Change::PlayerLeft { id } => {
                self.players.remove(id);
            }
            Change::PlayerMoved { id, x, y, anim } => {
                let player = self
                    .players
                    .get_mut(id)
                    .ok_or_else(|| PatchError::UnknownPlayer(id.clone()))?;
                player.x = *x;
                player.y = *y;
                player.anim.clone_from(anim);
            }
            Change::BoothChanged { index, booth } => {
                let slot = self
                    .booths
                    .get_mut(*index)
                    .ok_or(PatchError::UnknownBooth(*index))?;
                *slot = booth.clone();
            }
            Change::DjQueueChanged { queue } => self.dj_queue = queue.clone(),
            Change::RoomPlaylistChanged { items } => self.room_playlist.clone_from(items),
            Change::MusicStreamChanged { stream } => self.music_stream = stream.clone(),
            Change::ChatAppended { message, retain } => {
                self.chat.push_back(message.clone());
                while self.chat.len() > *retain {
                    self.chat.pop_front();
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "patch_test.rs"]
mod tests;
