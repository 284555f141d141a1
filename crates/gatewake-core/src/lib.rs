//! # gatewake-core
//!
//! Shared library for Gatewake containing the Wake-on-LAN wire format and the
//! domain entities the orchestrator operates on.
//!
//! This crate is used by the daemon and by any future front-end process.
//! It has zero dependencies on OS APIs, network sockets, or the MQTT client.
//!
//! # Architecture overview (for beginners)
//!
//! Gatewake reacts to physical access events: when a person badges through a
//! gate, the workstation bound to their credential is powered on; when they
//! badge out, it is powered off again.  The daemon subscribes to the gate's
//! event bus, resolves the credential to a device record, and then either
//! broadcasts a Wake-on-LAN magic packet or runs a remote shutdown.
//!
//! This crate (`gatewake-core`) is the shared foundation.  It defines:
//!
//! - **`protocol`** – The Wake-on-LAN wire format.  A hardware address is
//!   parsed from any of its textual encodings into 6 raw bytes, and the
//!   102-byte magic packet payload is assembled from it.
//!
//! - **`domain`** – Pure business data with no OS dependencies: the device
//!   registry record, the credential bundle, the OS class of a target host,
//!   and the access event as it arrives from the bus.

// Declare the two top-level modules.  Rust will look for each in a
// subdirectory with the same name (e.g., src/protocol/mod.rs).
pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `gatewake_core::MacAddr` instead of `gatewake_core::protocol::mac::MacAddr`.
pub use domain::device::{Credentials, DeviceRecord, OsClass, PlatformError};
pub use domain::event::{AccessEvent, AccessKind, BusMessage, BusMessageError};
pub use protocol::mac::{MacAddr, MacParseError};
pub use protocol::magic_packet::{MagicPacket, MAGIC_PACKET_LEN};
