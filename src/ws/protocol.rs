//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Movement input. `dx`/`dy` give the held movement direction; the
    /// server normalizes vectors longer than unit length.
    Input {
        /// Sequence number for stale-input rejection
        seq: u32,
        dx: f32,
        dy: f32,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// First message after a successful connection
    Welcome {
        player_id: Uuid,
        world_w: f32,
        world_h: f32,
        /// Stable display color for this player
        color: String,
        /// Round length in seconds
        round_secs: u64,
    },

    /// Rejection when all player slots are taken; the connection is
    /// closed right after this message
    Full,

    /// Authoritative world state, broadcast every tick
    Snapshot {
        /// Server tick number, strictly increasing
        tick: u64,
        players: Vec<PlayerSnapshot>,
        coins: Vec<CoinSnapshot>,
        /// Seconds left in the round, or in the intermission when no
        /// round is active
        time_left_secs: u64,
        round_active: bool,
        /// Winner of the previous round, shown during intermission
        last_winner: Option<Uuid>,
    },

    /// Pong response
    Pong {
        /// Echo of the client timestamp
        t: u64,
    },
}

/// Player state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub score: u32,
    pub color: String,
}

/// Coin state in a snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinSnapshot {
    pub id: Uuid,
    pub x: f32,
    pub y: f32,
    pub collected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_message_parses_from_wire_form() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"input","seq":3,"dx":1.0,"dy":-0.5}"#).unwrap();
        match msg {
            ClientMsg::Input { seq, dx, dy } => {
                assert_eq!(seq, 3);
                assert_eq!(dx, 1.0);
                assert_eq!(dy, -0.5);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport","x":0}"#).is_err());
    }

    #[test]
    fn full_rejection_serializes_with_type_tag_only() {
        let json = serde_json::to_string(&ServerMsg::Full).unwrap();
        assert_eq!(json, r#"{"type":"full"}"#);
    }

    #[test]
    fn snapshot_carries_type_tag() {
        let json = serde_json::to_string(&ServerMsg::Snapshot {
            tick: 7,
            players: vec![],
            coins: vec![],
            time_left_secs: 120,
            round_active: true,
            last_winner: None,
        })
        .unwrap();
        assert!(json.contains(r#""type":"snapshot""#));
        assert!(json.contains(r#""tick":7"#));
    }
}
