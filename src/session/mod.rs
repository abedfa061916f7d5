//! Session lifecycle and player slot allocation

pub mod registry;

pub use registry::{SessionError, SessionPhase, SessionRegistry, SessionSlot};
