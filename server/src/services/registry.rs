//! Room registry: id to handle lookup, creation and listing.
//!
//! DESIGN
//! ======
//! The registry only maps ids to [`RoomHandle`]s; rooms share no mutable
//! state with each other. Every spawned room gets a reaper task that waits
//! for the room to finish and then removes its entry, so a disposed room can
//! never be found again.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::config::RoomConfig;
use crate::room::{PUBLIC_BACKGROUND_SEED, PUBLIC_ROOM_ID, RoomError, RoomHandle, RoomInfo, spawn_room};
use crate::services::auth::PasswordHash;

const MAX_ROOM_NAME_CHARS: usize = 64;
const MAX_DESCRIPTION_CHARS: usize = 280;

/// Body of `POST /api/rooms`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRoom {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Listing entry for `GET /api/rooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub has_password: bool,
    pub clients: usize,
    pub is_public: bool,
}

impl RoomSummary {
    pub(crate) fn of(handle: &RoomHandle) -> Self {
        let info = &handle.info;
        Self {
            id: info.id.clone(),
            name: info.name.clone(),
            description: info.description.clone(),
            has_password: info.password.is_some(),
            clients: handle.client_count(),
            is_public: info.is_public,
        }
    }
}

#[derive(Clone)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, RoomHandle>>>,
    config: Arc<RoomConfig>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(config: Arc<RoomConfig>) -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())), config }
    }

    /// Start the public lobby if it is not running yet.
    pub async fn ensure_public(&self) -> RoomHandle {
        if let Some(handle) = self.get(PUBLIC_ROOM_ID).await {
            return handle;
        }
        let info = RoomInfo {
            id: PUBLIC_ROOM_ID.to_owned(),
            name: self.config.public_room_name.clone(),
            description: String::new(),
            background_seed: PUBLIC_BACKGROUND_SEED,
            is_public: true,
            password: None,
        };
        self.spawn(info).await
    }

    /// Create a private room.
    pub async fn create(&self, req: CreateRoom) -> Result<RoomHandle, RoomError> {
        let name = req.name.trim();
        if name.is_empty() || name.chars().count() > MAX_ROOM_NAME_CHARS {
            return Err(RoomError::InvalidName);
        }
        let description = req
            .description
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .chars()
            .take(MAX_DESCRIPTION_CHARS)
            .collect();
        let password = req
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| PasswordHash::new(p, self.config.password_cost))
            .transpose()?;

        let info = RoomInfo {
            id: Uuid::new_v4().to_string(),
            name: name.to_owned(),
            description,
            background_seed: rand::rng().random_range(0..1_000),
            is_public: false,
            password,
        };
        Ok(self.spawn(info).await)
    }

    async fn spawn(&self, info: RoomInfo) -> RoomHandle {
        let id = info.id.clone();
        let (handle, task) = spawn_room(info, self.config.clone());
        self.rooms.write().await.insert(id.clone(), handle.clone());
        info!(room_id = %id, "registry: room created");

        let rooms = self.rooms.clone();
        tokio::spawn(async move {
            let _ = task.await;
            rooms.write().await.remove(&id);
            info!(room_id = %id, "registry: room removed");
        });
        handle
    }

    pub async fn get(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(id).filter(|handle| !handle.is_closed()).cloned()
    }

    /// Public room first, then by name.
    pub async fn list(&self) -> Vec<RoomSummary> {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .read()
            .await
            .values()
            .filter(|handle| !handle.is_closed())
            .map(RoomSummary::of)
            .collect();
        rooms.sort_by(|a, b| b.is_public.cmp(&a.is_public).then_with(|| a.name.cmp(&b.name)));
        rooms
    }

    /// Stop every room. Used on shutdown.
    pub async fn shutdown(&self) {
        let handles: Vec<RoomHandle> = self.rooms.read().await.values().cloned().collect();
        for handle in handles {
            handle.shutdown().await;
        }
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
