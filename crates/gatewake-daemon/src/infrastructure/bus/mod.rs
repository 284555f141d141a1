//! Gate event bus subscription.

pub mod mqtt;

pub use mqtt::{start_bus_subscriber, BusConfig};
