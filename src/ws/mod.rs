//! WebSocket transport - wire protocol, session handling, simulated latency

pub mod handler;
pub mod latency;
pub mod protocol;
