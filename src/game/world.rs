//! Authoritative world state - players, coins, scores
//!
//! The `World` is owned and mutated exclusively by the arena tick loop;
//! nothing here is shared or locked.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};
use uuid::Uuid;

use super::movement::{MovementSystem, COIN_INSET, SPAWN_INSET, WORLD_H, WORLD_W};

/// Coins placed per layout
pub const COIN_COUNT: usize = 12;

/// Player state (authoritative)
#[derive(Debug, Clone)]
pub struct Player {
    pub session_id: Uuid,
    pub x: f32,
    pub y: f32,
    /// Held movement direction from the last applied input; persists
    /// until the next input arrives
    pub dir_x: f32,
    pub dir_y: f32,
    pub score: u32,
    pub last_input_seq: u32,
    pub color: String,
}

impl Player {
    pub fn new(session_id: Uuid, x: f32, y: f32, color: String) -> Self {
        Self {
            session_id,
            x,
            y,
            dir_x: 0.0,
            dir_y: 0.0,
            score: 0,
            last_input_seq: 0,
            color,
        }
    }
}

/// A coin on the field. Collected coins stay in the list (flagged) until
/// the next layout so clients can animate the pickup.
#[derive(Debug, Clone)]
pub struct Coin {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub collected: bool,
}

/// The authoritative world
pub struct World {
    players: BTreeMap<Uuid, Player>,
    coins: Vec<Coin>,
    rng: ChaCha8Rng,
}

impl World {
    pub fn new(seed: u64) -> Self {
        Self {
            players: BTreeMap::new(),
            coins: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Players in ascending session-id order
    pub fn players(&self) -> &BTreeMap<Uuid, Player> {
        &self.players
    }

    pub fn coins(&self) -> &[Coin] {
        &self.coins
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn uncollected_coins(&self) -> usize {
        self.coins.iter().filter(|c| !c.collected).count()
    }

    /// Add a player at the given spawn point
    pub fn spawn_player(&mut self, session_id: Uuid, x: f32, y: f32, color: String) {
        if self.players.contains_key(&session_id) {
            warn!(session_id = %session_id, "Player already in world");
            return;
        }
        self.players
            .insert(session_id, Player::new(session_id, x, y, color));
    }

    /// Remove a player. Returns false for unknown ids.
    pub fn remove_player(&mut self, session_id: Uuid) -> bool {
        self.players.remove(&session_id).is_some()
    }

    /// Apply a movement input: reject stale sequence numbers, then store
    /// the normalized heading. Unknown session ids are a logged no-op.
    pub fn steer(&mut self, session_id: Uuid, seq: u32, dx: f32, dy: f32) {
        let Some(player) = self.players.get_mut(&session_id) else {
            warn!(session_id = %session_id, "Input for unknown player ignored");
            return;
        };

        if seq <= player.last_input_seq {
            return;
        }
        player.last_input_seq = seq;

        let (dir_x, dir_y) = MovementSystem::normalize_heading(dx, dy);
        player.dir_x = dir_x;
        player.dir_y = dir_y;
    }

    /// Advance every player along its heading for one tick, clamped to
    /// world bounds. Iterates in session-id order.
    pub fn step_movement(&mut self, dt: f32) {
        for player in self.players.values_mut() {
            let (x, y) = MovementSystem::integrate(player.x, player.y, player.dir_x, player.dir_y, dt);
            player.x = x;
            player.y = y;
        }
    }

    /// Collect every uncollected coin overlapping the player's position.
    /// Marks them collected, bumps the player's score, and returns the
    /// picked-up coin ids. Already-collected coins never score again.
    /// Unknown session ids are a logged no-op.
    pub fn collect_coins(&mut self, session_id: Uuid) -> Vec<Uuid> {
        let Some(&Player { x, y, .. }) = self.players.get(&session_id) else {
            warn!(session_id = %session_id, "Coin check for unknown player ignored");
            return Vec::new();
        };

        let mut picked = Vec::new();
        for coin in self.coins.iter_mut() {
            if !coin.collected && MovementSystem::coin_overlap(x, y, coin.x, coin.y) {
                coin.collected = true;
                picked.push(coin.id);
            }
        }

        if !picked.is_empty() {
            if let Some(player) = self.players.get_mut(&session_id) {
                player.score += picked.len() as u32;
                info!(
                    session_id = %session_id,
                    coins = picked.len(),
                    score = player.score,
                    "Coins collected"
                );
            }
        }

        picked
    }

    /// Replace the field with a fresh layout of coins
    pub fn scatter_coins(&mut self) {
        self.coins = (0..COIN_COUNT)
            .map(|_| Coin {
                id: Uuid::new_v4(),
                x: self.rng.gen_range(COIN_INSET..WORLD_W - COIN_INSET),
                y: self.rng.gen_range(COIN_INSET..WORLD_H - COIN_INSET),
                collected: false,
            })
            .collect();
    }

    /// Remove all coins from the field (intermission)
    pub fn clear_coins(&mut self) {
        self.coins.clear();
    }

    /// Start-of-round reset: zero scores, stop and reposition every
    /// player, lay out fresh coins.
    pub fn reset_round(&mut self) {
        for player in self.players.values_mut() {
            player.score = 0;
            player.dir_x = 0.0;
            player.dir_y = 0.0;
            player.x = self.rng.gen_range(SPAWN_INSET..WORLD_W - SPAWN_INSET);
            player.y = self.rng.gen_range(SPAWN_INSET..WORLD_H - SPAWN_INSET);
        }
        self.scatter_coins();
    }

    /// Current leader: highest score, ties broken by lower session id.
    /// None when the world is empty.
    pub fn leader(&self) -> Option<Uuid> {
        let mut best: Option<(&Uuid, u32)> = None;
        for (id, player) in &self.players {
            match best {
                Some((_, score)) if player.score <= score => {}
                _ => best = Some((id, player.score)),
            }
        }
        best.map(|(id, _)| *id)
    }
}

#[cfg(test)]
impl World {
    pub(crate) fn place_coin_at(&mut self, x: f32, y: f32) -> Uuid {
        let id = Uuid::new_v4();
        self.coins.push(Coin {
            id,
            x,
            y,
            collected: false,
        });
        id
    }

    pub(crate) fn set_position(&mut self, session_id: Uuid, x: f32, y: f32) {
        if let Some(player) = self.players.get_mut(&session_id) {
            player.x = x;
            player.y = y;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::movement::{PLAYER_RADIUS, WORLD_H, WORLD_W};

    fn sorted_ids() -> (Uuid, Uuid) {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }

    fn place_coin(world: &mut World, x: f32, y: f32) -> Uuid {
        world.place_coin_at(x, y)
    }

    #[test]
    fn movement_stays_within_bounds() {
        let mut world = World::new(0);
        let id = Uuid::new_v4();
        world.spawn_player(id, 400.0, 250.0, "#2b85f0".into());

        // Hold down-right against the corner for a long time.
        world.steer(id, 1, 1.0, 1.0);
        for _ in 0..2000 {
            world.step_movement(0.05);
        }

        let player = &world.players()[&id];
        assert!(player.x >= PLAYER_RADIUS && player.x <= WORLD_W - PLAYER_RADIUS);
        assert!(player.y >= PLAYER_RADIUS && player.y <= WORLD_H - PLAYER_RADIUS);
    }

    #[test]
    fn stale_sequence_numbers_are_rejected() {
        let mut world = World::new(0);
        let id = Uuid::new_v4();
        world.spawn_player(id, 100.0, 100.0, "#2b85f0".into());

        world.steer(id, 5, 1.0, 0.0);
        world.steer(id, 3, -1.0, 0.0); // stale, must not override

        let player = &world.players()[&id];
        assert_eq!(player.dir_x, 1.0);
        assert_eq!(player.last_input_seq, 5);
    }

    #[test]
    fn coin_collection_is_idempotent() {
        let mut world = World::new(0);
        let id = Uuid::new_v4();
        world.spawn_player(id, 100.0, 100.0, "#2b85f0".into());
        place_coin(&mut world, 100.0, 100.0);

        assert_eq!(world.collect_coins(id).len(), 1);
        assert_eq!(world.collect_coins(id).len(), 0);
        assert_eq!(world.players()[&id].score, 1);
    }

    #[test]
    fn contested_coin_goes_to_first_caller() {
        let mut world = World::new(0);
        let (low, high) = sorted_ids();
        world.spawn_player(low, 100.0, 100.0, "#2b85f0".into());
        world.spawn_player(high, 105.0, 100.0, "#ff4d4f".into());
        let coin = place_coin(&mut world, 102.0, 100.0);

        // The arena checks players in ascending session-id order.
        let low_picked = world.collect_coins(low);
        let high_picked = world.collect_coins(high);

        assert_eq!(low_picked, vec![coin]);
        assert!(high_picked.is_empty());
        assert_eq!(world.players()[&low].score, 1);
        assert_eq!(world.players()[&high].score, 0);
    }

    #[test]
    fn unknown_player_is_a_no_op() {
        let mut world = World::new(0);
        place_coin(&mut world, 100.0, 100.0);

        world.steer(Uuid::new_v4(), 1, 1.0, 0.0);
        assert!(world.collect_coins(Uuid::new_v4()).is_empty());
        assert_eq!(world.uncollected_coins(), 1);
    }

    #[test]
    fn leader_breaks_ties_by_lower_session_id() {
        let mut world = World::new(0);
        let (low, high) = sorted_ids();
        world.spawn_player(low, 100.0, 100.0, "#2b85f0".into());
        world.spawn_player(high, 200.0, 200.0, "#ff4d4f".into());

        assert_eq!(world.leader(), Some(low));

        place_coin(&mut world, 200.0, 200.0);
        world.collect_coins(high);
        assert_eq!(world.leader(), Some(high));
    }

    #[test]
    fn reset_round_clears_scores_and_lays_out_coins() {
        let mut world = World::new(7);
        let id = Uuid::new_v4();
        world.spawn_player(id, 100.0, 100.0, "#2b85f0".into());
        place_coin(&mut world, 100.0, 100.0);
        world.collect_coins(id);

        world.reset_round();

        let player = &world.players()[&id];
        assert_eq!(player.score, 0);
        assert_eq!((player.dir_x, player.dir_y), (0.0, 0.0));
        assert_eq!(world.uncollected_coins(), COIN_COUNT);
        assert!(world
            .coins()
            .iter()
            .all(|c| c.x >= COIN_INSET && c.x <= WORLD_W - COIN_INSET));
    }
}
