//! Arena state and the authoritative tick loop
//!
//! A single tokio task owns the `World` and is the only writer to it.
//! Session tasks talk to it exclusively through the input queue; it talks
//! back through the snapshot broadcast.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::interval;
use tracing::{debug, info};
use uuid::Uuid;

use crate::util::time::{duration_to_ticks, tick_delta, TICK_DURATION_MICROS, TICK_RATE};
use crate::ws::protocol::ServerMsg;

use super::snapshot::SnapshotBuilder;
use super::world::World;
use super::{SessionEvent, SessionInput};

/// Arena phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaPhase {
    /// No round yet; waiting for the first player
    Waiting,
    /// Round in progress
    InProgress,
    /// Pause between rounds
    Intermission,
}

/// Arena state (owned by the arena task)
pub struct ArenaState {
    pub tick: u64,
    pub phase: ArenaPhase,
    /// Ticks left in the current round or intermission
    pub phase_ticks_left: u64,
    pub last_winner: Option<Uuid>,
    pub world: World,
}

/// Handle to the running arena
#[derive(Clone)]
pub struct ArenaHandle {
    pub input_tx: mpsc::Sender<SessionInput>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    player_count: Arc<AtomicUsize>,
}

impl ArenaHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshot_tx.subscribe()
    }

    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// The authoritative arena
pub struct Arena {
    state: ArenaState,
    round_ticks: u64,
    intermission_ticks: u64,
    input_rx: mpsc::Receiver<SessionInput>,
    snapshot_tx: broadcast::Sender<ServerMsg>,
    snapshot_builder: SnapshotBuilder,
    player_count: Arc<AtomicUsize>,
}

impl Arena {
    pub fn new(
        round_duration: Duration,
        intermission: Duration,
        seed: u64,
    ) -> (Self, ArenaHandle) {
        let (input_tx, input_rx) = mpsc::channel(256);
        let (snapshot_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = ArenaHandle {
            input_tx,
            snapshot_tx: snapshot_tx.clone(),
            player_count: player_count.clone(),
        };

        let arena = Self {
            state: ArenaState {
                tick: 0,
                phase: ArenaPhase::Waiting,
                phase_ticks_left: 0,
                last_winner: None,
                world: World::new(seed),
            },
            round_ticks: duration_to_ticks(round_duration),
            intermission_ticks: duration_to_ticks(intermission),
            input_rx,
            snapshot_tx,
            snapshot_builder: SnapshotBuilder::new(),
            player_count,
        };

        (arena, handle)
    }

    /// Run the authoritative tick loop for the lifetime of the server
    pub async fn run(mut self) {
        info!(tick_rate = TICK_RATE, "Arena loop started");

        let mut tick_interval = interval(Duration::from_micros(TICK_DURATION_MICROS));
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;
            self.tick_once();
        }
    }

    /// One full tick: drain events, simulate, broadcast
    pub(crate) fn tick_once(&mut self) {
        let headings = self.process_events();
        self.run_tick(headings);

        let snapshot = self.snapshot_builder.build(
            self.state.tick,
            &self.state.world,
            self.time_left_secs(),
            self.state.phase == ArenaPhase::InProgress,
            self.state.last_winner,
        );
        let _ = self.snapshot_tx.send(snapshot);
    }

    /// Drain the input queue. Join/leave/ping apply immediately; for
    /// movement only the freshest pending input per player is kept, so a
    /// backlog never replays stale headings.
    fn process_events(&mut self) -> BTreeMap<Uuid, (u32, f32, f32)> {
        let mut latest: BTreeMap<Uuid, (u32, f32, f32)> = BTreeMap::new();

        while let Ok(input) = self.input_rx.try_recv() {
            match input.event {
                SessionEvent::Joined {
                    spawn_x,
                    spawn_y,
                    color,
                } => {
                    self.state
                        .world
                        .spawn_player(input.session_id, spawn_x, spawn_y, color);
                    self.player_count
                        .store(self.state.world.player_count(), Ordering::Relaxed);
                    info!(
                        session_id = %input.session_id,
                        players = self.state.world.player_count(),
                        "Player joined arena"
                    );
                }
                SessionEvent::Input { seq, dx, dy } => {
                    latest
                        .entry(input.session_id)
                        .and_modify(|cur| {
                            if seq >= cur.0 {
                                *cur = (seq, dx, dy);
                            }
                        })
                        .or_insert((seq, dx, dy));
                }
                SessionEvent::Ping { t } => {
                    let _ = self.snapshot_tx.send(ServerMsg::Pong { t });
                }
                SessionEvent::Left => {
                    latest.remove(&input.session_id);
                    if self.state.world.remove_player(input.session_id) {
                        self.player_count
                            .store(self.state.world.player_count(), Ordering::Relaxed);
                        info!(
                            session_id = %input.session_id,
                            players = self.state.world.player_count(),
                            "Player left arena"
                        );
                    }
                }
            }
        }

        latest
    }

    /// Run a single simulation tick
    fn run_tick(&mut self, headings: BTreeMap<Uuid, (u32, f32, f32)>) {
        self.state.tick += 1;

        // Steering is accepted in any phase; BTreeMap iteration applies
        // it in ascending session-id order.
        for (session_id, (seq, dx, dy)) in headings {
            self.state.world.steer(session_id, seq, dx, dy);
        }

        match self.state.phase {
            ArenaPhase::Waiting => {
                if !self.state.world.is_empty() {
                    self.start_round();
                }
            }
            ArenaPhase::InProgress => {
                self.state.world.step_movement(tick_delta());

                // Coin checks in ascending session-id order: when two
                // players land on the same coin in one tick, the lower
                // session id scores and the coin is gone for the other.
                let ids: Vec<Uuid> = self.state.world.players().keys().copied().collect();
                for session_id in ids {
                    let picked = self.state.world.collect_coins(session_id);
                    if !picked.is_empty() {
                        debug!(session_id = %session_id, coins = picked.len(), "Pickup");
                    }
                }

                if self.state.world.uncollected_coins() == 0 {
                    info!("Field swept, scattering fresh coins");
                    self.state.world.scatter_coins();
                }

                self.state.phase_ticks_left = self.state.phase_ticks_left.saturating_sub(1);
                if self.state.phase_ticks_left == 0 {
                    self.end_round();
                }
            }
            ArenaPhase::Intermission => {
                self.state.phase_ticks_left = self.state.phase_ticks_left.saturating_sub(1);
                if self.state.phase_ticks_left == 0 {
                    if self.state.world.is_empty() {
                        self.state.phase = ArenaPhase::Waiting;
                    } else {
                        self.start_round();
                    }
                }
            }
        }
    }

    fn start_round(&mut self) {
        info!(
            round_ticks = self.round_ticks,
            players = self.state.world.player_count(),
            "Starting round"
        );
        self.state.world.reset_round();
        self.state.last_winner = None;
        self.state.phase = ArenaPhase::InProgress;
        self.state.phase_ticks_left = self.round_ticks;
    }

    fn end_round(&mut self) {
        self.state.last_winner = self.state.world.leader();
        self.state.world.clear_coins();
        self.state.phase = ArenaPhase::Intermission;
        self.state.phase_ticks_left = self.intermission_ticks;
        info!(winner = ?self.state.last_winner, "Round ended");
    }

    fn time_left_secs(&self) -> u64 {
        match self.state.phase {
            ArenaPhase::Waiting => 0,
            _ => self.state.phase_ticks_left.div_ceil(TICK_RATE as u64),
        }
    }
}
