//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{Arena, ArenaHandle};
use crate::session::SessionRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<SessionRegistry>,
    pub arena: ArenaHandle,
}

impl AppState {
    /// Build the shared state. Returns the arena alongside it; the
    /// caller spawns the arena task (it is not `Clone`).
    pub fn new(config: Config, seed: u64) -> (Self, Arena) {
        let config = Arc::new(config);

        let sessions = Arc::new(SessionRegistry::new(config.max_players));

        let (arena, arena_handle) = Arena::new(config.round_duration, config.intermission, seed);

        (
            Self {
                config,
                sessions,
                arena: arena_handle,
            },
            arena,
        )
    }
}
