//! The lighting-network side of the panel.
//!
//! A client decides which universes reach the event loop. Slot data itself
//! arrives as [`UniverseFrame`]s on a channel owned by the event loop, so
//! registering and receiving never contend for the same borrow.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to register universe {universe}: {reason}")]
    Register { universe: u16, reason: String },
}

/// Slot data received for one universe.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniverseFrame {
    pub universe: u16,
    pub data: Vec<u8>,
}

pub trait LightingClient: Send {
    fn register_universe(&mut self, universe: u16) -> Result<(), ClientError>;

    /// Unregistering a universe that isn't registered is a no-op.
    fn unregister_universe(&mut self, universe: u16);
}
