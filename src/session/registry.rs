//! Session registry - capacity-bounded slot allocation
//!
//! Maps connection identities to player slots. Slot indices are reused
//! (lowest free slot first) so colors and spawn points stay stable for a
//! given seat at the table.

use std::sync::Mutex;

use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::game::movement::{WORLD_H, WORLD_W};
use crate::util::time::unix_millis;

/// Display colors, assigned per slot index
const PALETTE: [&str; 6] = [
    "#2b85f0", "#ff4d4f", "#2bbf57", "#f07f2b", "#a02bf0", "#f02b85",
];

/// Per-connection lifecycle. `Disconnected` is terminal: the slot entry
/// is removed from the registry when it is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Slot allocated, handshake still in flight
    Connecting,
    /// Handshake complete, session live
    Active,
}

/// An allocated player slot
#[derive(Debug, Clone)]
pub struct SessionSlot {
    pub session_id: Uuid,
    /// Seat index, reused after disconnects
    pub slot: usize,
    pub phase: SessionPhase,
    pub color: String,
    pub spawn_x: f32,
    pub spawn_y: f32,
    pub connected_at: u64,
}

/// Session errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("all player slots are taken")]
    CapacityExceeded,

    #[error("unknown session: {0}")]
    UnknownSession(Uuid),
}

/// Registry of live sessions
pub struct SessionRegistry {
    max_players: usize,
    /// Seat table; index = slot, entry = occupying session
    seats: Mutex<Vec<Option<Uuid>>>,
    sessions: DashMap<Uuid, SessionSlot>,
}

impl SessionRegistry {
    pub fn new(max_players: usize) -> Self {
        Self {
            max_players,
            seats: Mutex::new(vec![None; max_players]),
            sessions: DashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_players
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Allocate a slot for a new connection. Fails when every seat is
    /// taken; the caller is expected to send a `full` rejection and
    /// close.
    pub fn connect(&self) -> Result<SessionSlot, SessionError> {
        let session_id = Uuid::new_v4();

        let slot = {
            let mut seats = self.seats.lock().unwrap_or_else(|e| e.into_inner());
            let Some(slot) = seats.iter().position(|seat| seat.is_none()) else {
                return Err(SessionError::CapacityExceeded);
            };
            seats[slot] = Some(session_id);
            slot
        };

        let (spawn_x, spawn_y) = self.spawn_point(slot);
        let entry = SessionSlot {
            session_id,
            slot,
            phase: SessionPhase::Connecting,
            color: PALETTE[slot % PALETTE.len()].to_string(),
            spawn_x,
            spawn_y,
            connected_at: unix_millis(),
        };
        self.sessions.insert(session_id, entry.clone());

        info!(
            session_id = %session_id,
            slot,
            color = %entry.color,
            "Session slot allocated"
        );
        Ok(entry)
    }

    /// Mark a session's handshake complete
    pub fn activate(&self, session_id: Uuid) {
        if let Some(mut entry) = self.sessions.get_mut(&session_id) {
            entry.phase = SessionPhase::Active;
        }
    }

    /// Free a session's slot. Safe to call for ids that were never
    /// allocated or were already freed.
    pub fn disconnect(&self, session_id: Uuid) -> Option<SessionSlot> {
        let (_, entry) = self.sessions.remove(&session_id)?;

        let mut seats = self.seats.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(seat) = seats.iter_mut().find(|seat| **seat == Some(session_id)) {
            *seat = None;
        }

        info!(
            session_id = %session_id,
            slot = entry.slot,
            alive_ms = unix_millis().saturating_sub(entry.connected_at),
            "Session slot freed"
        );
        Some(entry)
    }

    /// Look up a live session
    pub fn resolve(&self, session_id: Uuid) -> Result<SessionSlot, SessionError> {
        self.sessions
            .get(&session_id)
            .map(|entry| entry.clone())
            .ok_or(SessionError::UnknownSession(session_id))
    }

    /// Deterministic spawn point for a seat: seats spread evenly along
    /// the horizontal midline.
    fn spawn_point(&self, slot: usize) -> (f32, f32) {
        let x = WORLD_W * (slot as f32 + 1.0) / (self.max_players as f32 + 1.0);
        (x, WORLD_H / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn third_connection_is_rejected_at_capacity_two() {
        let registry = SessionRegistry::new(2);
        let first = registry.connect().unwrap();
        let second = registry.connect().unwrap();
        assert_ne!(first.session_id, second.session_id);

        assert!(matches!(
            registry.connect(),
            Err(SessionError::CapacityExceeded)
        ));
    }

    #[test]
    fn disconnect_frees_the_seat_for_reuse() {
        let registry = SessionRegistry::new(2);
        let first = registry.connect().unwrap();
        let _second = registry.connect().unwrap();

        registry.disconnect(first.session_id);
        let replacement = registry.connect().unwrap();

        // The replacement takes the freed seat and inherits its color.
        assert_eq!(replacement.slot, first.slot);
        assert_eq!(replacement.color, first.color);
        assert_eq!(registry.active_sessions(), 2);
    }

    #[test]
    fn resolve_unknown_session_fails() {
        let registry = SessionRegistry::new(2);
        assert!(matches!(
            registry.resolve(Uuid::new_v4()),
            Err(SessionError::UnknownSession(_))
        ));
    }

    #[test]
    fn sessions_start_connecting_and_become_active() {
        let registry = SessionRegistry::new(2);
        let slot = registry.connect().unwrap();
        assert_eq!(slot.phase, SessionPhase::Connecting);

        registry.activate(slot.session_id);
        assert_eq!(
            registry.resolve(slot.session_id).unwrap().phase,
            SessionPhase::Active
        );
    }

    #[test]
    fn disconnecting_twice_is_harmless() {
        let registry = SessionRegistry::new(1);
        let slot = registry.connect().unwrap();
        assert!(registry.disconnect(slot.session_id).is_some());
        assert!(registry.disconnect(slot.session_id).is_none());
        assert!(registry.connect().is_ok());
    }

    #[test]
    fn seats_have_distinct_spawn_points_and_colors() {
        let registry = SessionRegistry::new(2);
        let first = registry.connect().unwrap();
        let second = registry.connect().unwrap();

        assert_ne!(first.color, second.color);
        assert_ne!(first.spawn_x, second.spawn_x);
        assert_eq!(first.spawn_y, second.spawn_y);
    }
}
