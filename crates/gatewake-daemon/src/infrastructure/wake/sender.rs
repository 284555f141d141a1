//! UDP broadcast transmitter for Wake-on-LAN magic packets.
//!
//! Delivery is deliberately redundant: the packet goes to **every**
//! (destination, port) combination rather than one "best" pick.  Wake-on-LAN
//! is unacknowledged, switches differ on whether they forward the limited
//! broadcast, and some NICs only listen on port 7 — spraying all the
//! combinations costs a few datagrams and maximizes the odds one of them
//! lands.  A send failure on one combination never aborts the others.
//!
//! Candidate destinations, in order:
//! 1. an explicitly configured broadcast address, when set; otherwise the
//!    target's /24 subnet broadcast, when the target address is known;
//! 2. the limited broadcast `255.255.255.255`, always.
//!
//! Candidate ports: the configured primary (default 9, "discard") and the
//! well-known alternate 7 ("echo").

use std::net::{Ipv4Addr, SocketAddrV4, UdpSocket};

use async_trait::async_trait;
use gatewake_core::{MacAddr, MagicPacket};
use tracing::{debug, info, warn};

use crate::application::dispatch_event::{WakeError, WakeTransmitter};

/// The well-known alternate Wake-on-LAN port.
const ALTERNATE_WOL_PORT: u16 = 7;

/// Broadcast-based magic packet sender.
///
/// Stateless between calls: a fresh socket is opened per wake and nothing
/// is retained afterwards.
pub struct WolSender {
    /// Primary UDP port (default 9).
    port: u16,
    /// Explicit broadcast destination overriding subnet derivation.
    broadcast: Option<Ipv4Addr>,
}

impl WolSender {
    pub fn new(port: u16, broadcast: Option<Ipv4Addr>) -> Self {
        Self { port, broadcast }
    }

    /// Validates `mac`, builds the payload, and sends it to every candidate
    /// (destination, port) combination.
    ///
    /// # Errors
    ///
    /// [`WakeError::InvalidAddress`] when `mac` does not parse (no packet is
    /// sent), or [`WakeError::Socket`] when the broadcast socket itself
    /// cannot be created.  Per-combination send failures are logged and
    /// absorbed; the call returns `Ok(false)` only when every send failed.
    pub fn send(&self, mac: &str, target: Option<Ipv4Addr>) -> Result<bool, WakeError> {
        // Validate before touching the network.
        let mac: MacAddr = mac.parse()?;
        let packet = MagicPacket::new(mac);

        let destinations = self.broadcast_candidates(target);
        let ports = self.port_candidates();

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_broadcast(true)?;

        let mut sent = 0usize;
        for &destination in &destinations {
            for &port in &ports {
                let addr = SocketAddrV4::new(destination, port);
                match socket.send_to(packet.as_bytes(), addr) {
                    Ok(_) => {
                        debug!(%mac, %addr, "magic packet sent");
                        sent += 1;
                    }
                    // One dead combination must not stop the rest.
                    Err(e) => warn!(%mac, %addr, "magic packet send failed: {e}"),
                }
            }
        }

        if sent > 0 {
            info!(%mac, combinations = sent, "wake broadcast complete");
        }
        Ok(sent > 0)
    }

    /// Ordered, deduplicated broadcast destinations.
    fn broadcast_candidates(&self, target: Option<Ipv4Addr>) -> Vec<Ipv4Addr> {
        let mut candidates = Vec::with_capacity(2);
        if let Some(explicit) = self.broadcast {
            candidates.push(explicit);
        } else if let Some(address) = target {
            candidates.push(subnet_broadcast(address));
        }
        candidates.push(Ipv4Addr::BROADCAST);
        dedup_preserving_order(candidates)
    }

    /// Ordered, deduplicated ports: configured primary, then the alternate.
    fn port_candidates(&self) -> Vec<u16> {
        dedup_preserving_order(vec![self.port, ALTERNATE_WOL_PORT])
    }
}

#[async_trait]
impl WakeTransmitter for WolSender {
    async fn wake(&self, mac: &str, target: Option<Ipv4Addr>) -> Result<bool, WakeError> {
        // UDP sends never block meaningfully; no off-loading needed.
        self.send(mac, target)
    }
}

/// The /24 subnet broadcast for `address` (last octet 255).
fn subnet_broadcast(address: Ipv4Addr) -> Ipv4Addr {
    let [a, b, c, _] = address.octets();
    Ipv4Addr::new(a, b, c, 255)
}

fn dedup_preserving_order<T: PartialEq + Copy>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
