//! Time utilities for the simulation loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Server start time for uptime tracking
static SERVER_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize server start time (call once at startup)
pub fn init_server_time() {
    SERVER_START.get_or_init(Instant::now);
}

/// Get server uptime in seconds
pub fn uptime_secs() -> u64 {
    SERVER_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Authoritative tick rate. Every tick also broadcasts a snapshot.
pub const TICK_RATE: u32 = 20; // 20 ticks per second (50ms tick)
pub const TICK_DURATION_MICROS: u64 = 1_000_000 / TICK_RATE as u64;

/// Simulation step size in seconds
pub fn tick_delta() -> f32 {
    1.0 / TICK_RATE as f32
}

/// Convert a wall-clock duration to a whole number of ticks, rounding up
pub fn duration_to_ticks(duration: Duration) -> u64 {
    let micros = duration.as_micros() as u64;
    micros.div_ceil(TICK_DURATION_MICROS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_delta_matches_rate() {
        assert!((tick_delta() - 0.05).abs() < f32::EPSILON);
    }

    #[test]
    fn duration_to_ticks_rounds_up() {
        assert_eq!(duration_to_ticks(Duration::from_secs(1)), TICK_RATE as u64);
        assert_eq!(duration_to_ticks(Duration::from_millis(51)), 2);
        assert_eq!(duration_to_ticks(Duration::from_millis(0)), 0);
    }
}
