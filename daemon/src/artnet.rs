//! Art-Net (ArtDmx) receiver.
//!
//! Only ArtDmx packets are understood; polls and every other opcode are
//! dropped. Universes are 15-bit port addresses (Net, Sub-Net, Universe).

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use ledpanel::plan::MAX_UNIVERSE;
use log::{debug, error, info, trace};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::client::{ClientError, LightingClient, UniverseFrame};

pub const DEFAULT_PORT: u16 = 6454;

const ART_NET_ID: &[u8; 8] = b"Art-Net\0";
const OP_DMX: u16 = 0x5000;
const HEADER_LEN: usize = 18;
const MAX_PACKET: usize = 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArtNetError {
    #[error("packet too short ({0} bytes)")]
    TooShort(usize),
    #[error("not an Art-Net packet")]
    BadId,
    #[error("unsupported opcode 0x{0:04x}")]
    UnsupportedOpcode(u16),
    #[error("declared length {declared} exceeds the {available} bytes received")]
    Truncated { declared: usize, available: usize },
}

pub fn parse_art_dmx(packet: &[u8]) -> Result<UniverseFrame, ArtNetError> {
    if packet.len() < HEADER_LEN {
        return Err(ArtNetError::TooShort(packet.len()));
    }
    if &packet[..8] != ART_NET_ID {
        return Err(ArtNetError::BadId);
    }
    let opcode = u16::from_le_bytes([packet[8], packet[9]]);
    if opcode != OP_DMX {
        return Err(ArtNetError::UnsupportedOpcode(opcode));
    }

    // SubUni is the low byte, Net the high byte
    let universe = u16::from_le_bytes([packet[14], packet[15]]) & MAX_UNIVERSE;
    let declared = usize::from(u16::from_be_bytes([packet[16], packet[17]]));
    let data = packet
        .get(HEADER_LEN..HEADER_LEN + declared)
        .ok_or(ArtNetError::Truncated {
            declared,
            available: packet.len() - HEADER_LEN,
        })?;

    Ok(UniverseFrame {
        universe,
        data: data.to_vec(),
    })
}

/// Universes the receiver lets through, shared between the client and the
/// receive task.
#[derive(Clone, Debug, Default)]
pub struct Subscriptions(Arc<Mutex<HashSet<u16>>>);

impl Subscriptions {
    fn set(&self) -> std::sync::MutexGuard<'_, HashSet<u16>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contains(&self, universe: u16) -> bool {
        self.set().contains(&universe)
    }

    pub fn len(&self) -> usize {
        self.set().len()
    }

    pub fn is_empty(&self) -> bool {
        self.set().is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ArtNetClient {
    subscriptions: Subscriptions,
}

impl ArtNetClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriptions(&self) -> Subscriptions {
        self.subscriptions.clone()
    }
}

impl LightingClient for ArtNetClient {
    fn register_universe(&mut self, universe: u16) -> Result<(), ClientError> {
        if universe > MAX_UNIVERSE {
            return Err(ClientError::Register {
                universe,
                reason: "Art-Net port addresses are 15 bits".to_string(),
            });
        }
        debug!("listening to Art-Net universe {universe}");
        self.subscriptions.set().insert(universe);
        Ok(())
    }

    fn unregister_universe(&mut self, universe: u16) {
        if self.subscriptions.set().remove(&universe) {
            debug!("stopped listening to Art-Net universe {universe}");
        }
    }
}

/// Receives ArtDmx packets on `socket` and forwards subscribed universes to
/// the event loop until shutdown.
pub fn run_receiver(
    task_tracker: &TaskTracker,
    socket: UdpSocket,
    subscriptions: Subscriptions,
    frames: mpsc::Sender<UniverseFrame>,
    shutdown_token: CancellationToken,
) {
    task_tracker.spawn(async move {
        if let Ok(local) = socket.local_addr() {
            info!("Art-Net receiver listening on {local}");
        }
        let mut buf = [0u8; MAX_PACKET];

        loop {
            let received = tokio::select! {
                _ = shutdown_token.cancelled() => break,
                received = socket.recv_from(&mut buf) => received,
            };
            let (len, peer) = match received {
                Ok(received) => received,
                Err(e) => {
                    error!("Art-Net receive failed: {e}");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };

            let frame = match parse_art_dmx(&buf[..len]) {
                Ok(frame) => frame,
                Err(e) => {
                    trace!("ignoring packet from {peer}: {e}");
                    continue;
                }
            };
            if !subscriptions.contains(frame.universe) {
                continue;
            }
            if frames.send(frame).await.is_err() {
                info!("event loop has stopped, closing Art-Net receiver");
                break;
            }
        }
    });
}
