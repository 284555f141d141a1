//! Protocol module containing the hardware-address parser and the
//! Wake-on-LAN magic packet layout.

pub mod mac;
pub mod magic_packet;

pub use mac::{MacAddr, MacParseError};
pub use magic_packet::{MagicPacket, MAGIC_PACKET_LEN};
