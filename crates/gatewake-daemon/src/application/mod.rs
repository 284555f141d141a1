//! Application layer: the event-dispatch use case, its ports, the
//! deduplication cache, and the partitioned worker pool.

pub mod dedup;
pub mod dispatch_event;
pub mod worker;

pub use dedup::DedupCache;
pub use dispatch_event::{
    AuditError, AuditLog, DeviceRegistry, DispatchEventUseCase, DispatchOutcome, LivenessProber,
    RegistryError, ShutdownError, ShutdownExecutor, WakeError, WakeTransmitter,
};
pub use worker::DispatchPool;
