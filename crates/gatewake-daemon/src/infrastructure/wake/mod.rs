//! Wake-on-LAN transmission and post-wake liveness probing.

pub mod prober;
pub mod sender;

pub use prober::{NetworkProber, ProbeConfig};
pub use sender::WolSender;
