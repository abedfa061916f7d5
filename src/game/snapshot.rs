//! Snapshot building for broadcast

use tracing::error;
use uuid::Uuid;

use crate::ws::protocol::{CoinSnapshot, PlayerSnapshot, ServerMsg};

use super::world::World;

/// Builds the per-tick snapshot message. Tracks the last tick sent so a
/// regression in tick numbering is caught at the source.
pub struct SnapshotBuilder {
    last_tick: u64,
}

impl SnapshotBuilder {
    pub fn new() -> Self {
        Self { last_tick: 0 }
    }

    /// Build a snapshot of the whole world. Every connected player is
    /// included, idle or not; coins keep their collected flags.
    pub fn build(
        &mut self,
        tick: u64,
        world: &World,
        time_left_secs: u64,
        round_active: bool,
        last_winner: Option<Uuid>,
    ) -> ServerMsg {
        if tick <= self.last_tick {
            error!(tick, last_tick = self.last_tick, "Non-increasing snapshot tick");
        }
        self.last_tick = tick;

        let players: Vec<PlayerSnapshot> = world
            .players()
            .values()
            .map(|p| PlayerSnapshot {
                id: p.session_id,
                x: p.x,
                y: p.y,
                score: p.score,
                color: p.color.clone(),
            })
            .collect();

        let coins: Vec<CoinSnapshot> = world
            .coins()
            .iter()
            .map(|c| CoinSnapshot {
                id: c.id,
                x: c.x,
                y: c.y,
                collected: c.collected,
            })
            .collect();

        ServerMsg::Snapshot {
            tick,
            players,
            coins,
            time_left_secs,
            round_active,
            last_winner,
        }
    }
}

impl Default for SnapshotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_includes_idle_players() {
        let mut world = World::new(0);
        let mover = Uuid::new_v4();
        let idler = Uuid::new_v4();
        world.spawn_player(mover, 100.0, 100.0, "#2b85f0".into());
        world.spawn_player(idler, 300.0, 300.0, "#ff4d4f".into());
        world.steer(mover, 1, 1.0, 0.0);
        world.step_movement(0.05);

        let mut builder = SnapshotBuilder::new();
        let msg = builder.build(1, &world, 60, true, None);

        let ServerMsg::Snapshot { players, .. } = msg else {
            panic!("expected snapshot");
        };
        assert_eq!(players.len(), 2);
        assert!(players.iter().any(|p| p.id == idler));
    }

    #[test]
    fn collected_coins_keep_their_flag() {
        let mut world = World::new(0);
        world.scatter_coins();
        let target = world.coins()[0].id;
        let (cx, cy) = (world.coins()[0].x, world.coins()[0].y);

        // Spawn the player on top of a known coin and pick it up.
        let id = Uuid::new_v4();
        world.spawn_player(id, cx, cy, "#2b85f0".into());
        assert!(world.collect_coins(id).contains(&target));

        let mut builder = SnapshotBuilder::new();
        let ServerMsg::Snapshot { coins, .. } = builder.build(1, &world, 60, true, None) else {
            panic!("expected snapshot");
        };
        let flagged = coins.iter().find(|c| c.id == target).unwrap();
        assert!(flagged.collected);
    }

    #[test]
    fn ticks_are_passed_through_unchanged() {
        let world = World::new(0);
        let mut builder = SnapshotBuilder::new();
        for tick in 1..=5 {
            let ServerMsg::Snapshot { tick: sent, .. } =
                builder.build(tick, &world, 0, false, None)
            else {
                panic!("expected snapshot");
            };
            assert_eq!(sent, tick);
        }
    }
}
