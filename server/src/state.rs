//! Shared application state handed to every axum handler.

use std::sync::Arc;

use crate::config::RoomConfig;
use crate::services::registry::RoomRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: RoomRegistry,
}

impl AppState {
    #[must_use]
    pub fn new(config: RoomConfig) -> Self {
        Self { registry: RoomRegistry::new(Arc::new(config)) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use std::time::Duration;

    use super::*;
    use crate::room::RoomHandle;
    use crate::services::registry::CreateRoom;

    /// App state with fast timers so tests do not wait on real track lengths.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(RoomConfig {
            heartbeat: Duration::from_millis(200),
            punch_delay: Duration::from_millis(10),
            knockback_delay: Duration::from_millis(10),
            password_cost: crate::services::auth::MIN_COST,
            ..RoomConfig::default()
        })
    }

    /// Create a private room, optionally password protected.
    pub async fn seed_room(state: &AppState, password: Option<&str>) -> RoomHandle {
        state
            .registry
            .create(CreateRoom { name: "test room".into(), description: None, password: password.map(Into::into) })
            .await
            .expect("seed room")
    }
}
