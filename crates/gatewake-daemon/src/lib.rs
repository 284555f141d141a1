//! # gatewake-daemon
//!
//! The Gatewake orchestrator: subscribes to the gate controller's MQTT event
//! bus and powers bound workstations on (Wake-on-LAN) or off (a chain of
//! remote-execution strategies) as people badge in and out.
//!
//! # Architecture
//!
//! ```text
//! MQTT broker
//!      │  {"identity": "...", "type": "entry"|"exit"}
//!      ▼
//! infrastructure/bus        decode, warn-and-drop malformed payloads
//!      │  AccessEvent (mpsc)
//!      ▼
//! application/worker        partitioned pool — per-identity ordering
//!      ▼
//! application/dispatch_event
//!   ├─ DeviceRegistry       identity → DeviceRecord   (infrastructure/registry)
//!   ├─ DedupCache           suppression window        (application/dedup)
//!   ├─ AuditLog             record intent             (infrastructure/audit)
//!   ├─ entry: WakeTransmitter → LivenessProber        (infrastructure/wake)
//!   └─ exit:  ShutdownExecutor strategy chain         (infrastructure/shutdown)
//! ```
//!
//! The application layer owns the use case and its ports (traits); the
//! infrastructure layer provides the network-, subprocess- and file-backed
//! implementations.  Everything is injected — no global singletons — so the
//! dispatcher is fully testable with recording fakes.

pub mod application;
pub mod infrastructure;
