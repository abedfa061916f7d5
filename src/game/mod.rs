//! Game simulation modules

pub mod arena;
pub mod movement;
pub mod snapshot;
pub mod world;

pub use arena::{Arena, ArenaHandle};
pub use world::World;

use uuid::Uuid;

/// Event funneled from a session task into the arena loop. All world
/// mutation, including join and leave, goes through this queue so the
/// tick loop is the only writer.
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub session_id: Uuid,
    pub event: SessionEvent,
    pub received_at: u64,
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Session completed its handshake and owns a slot
    Joined {
        spawn_x: f32,
        spawn_y: f32,
        color: String,
    },

    /// Movement input
    Input { seq: u32, dx: f32, dy: f32 },

    /// Latency probe
    Ping { t: u64 },

    /// Session disconnected
    Left,
}
