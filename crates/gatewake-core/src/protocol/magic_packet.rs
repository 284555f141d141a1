//! The Wake-on-LAN magic packet payload.
//!
//! Wire format:
//! ```text
//! [0xFF × 6][MAC × 16]
//! ```
//! Total payload size: 102 bytes.  The packet is carried in a single UDP
//! datagram broadcast to the target's subnet, conventionally on port 9
//! ("discard") or port 7 ("echo").
//!
//! # How Wake-on-LAN works (for beginners)
//!
//! A WoL-capable network interface keeps listening while the rest of the
//! machine is powered down.  It scans every frame it sees for the
//! synchronization stream (six `0xFF` bytes) followed by its own hardware
//! address repeated 16 times.  When it spots that pattern anywhere in a
//! frame's payload, it signals the motherboard to power the host on.  The
//! NIC does not parse IP or UDP at all — which is why the packet must be
//! *broadcast*: a sleeping host has no IP address to route to.

use crate::protocol::mac::MacAddr;

/// Total magic packet payload size in bytes: 6 sync bytes + 16 × 6-byte MAC.
pub const MAGIC_PACKET_LEN: usize = 102;

/// Number of times the hardware address is repeated after the sync stream.
const MAC_REPETITIONS: usize = 16;

/// A fully assembled magic packet payload.
///
/// Pure value type: constructed per send and discarded.  Two packets built
/// from the same hardware address are byte-identical regardless of which
/// textual encoding the address was parsed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagicPacket {
    bytes: [u8; MAGIC_PACKET_LEN],
}

impl MagicPacket {
    /// Builds the payload for `mac`.
    pub fn new(mac: MacAddr) -> Self {
        let octets = mac.octets();
        let mut bytes = [0xFFu8; MAGIC_PACKET_LEN];
        for rep in 0..MAC_REPETITIONS {
            let start = 6 + rep * 6;
            bytes[start..start + 6].copy_from_slice(&octets);
        }
        Self { bytes }
    }

    /// Returns the raw payload, ready for `send_to`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
