//! Access events as they arrive from the gate's message bus.
//!
//! The gate controller publishes one JSON object per badge swipe:
//!
//! ```json
//! {"identity": "TAG-0042", "type": "entry", "gate_id": "north-1"}
//! ```
//!
//! Older gate firmware published the credential under `rfid` (and, for one
//! revision, `user_id`); both are accepted as aliases of `identity`.
//!
//! A [`BusMessage`] is the raw wire shape.  The daemon stamps it with a
//! correlation id and an arrival time to form an [`AccessEvent`], which is
//! what flows through the dispatcher.  Events are transient: they live for
//! one dispatch cycle and are never persisted by the core.

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors produced when decoding a bus payload.
///
/// A malformed payload is logged and dropped by the subscriber — it never
/// propagates past the bus boundary.
#[derive(Debug, Error)]
pub enum BusMessageError {
    /// The payload is not valid JSON or is missing a required field.
    #[error("malformed bus payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The identity field decoded to an empty string.
    #[error("bus payload has empty identity")]
    EmptyIdentity,
}

/// The direction of a gate passage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    /// Person entered — wake the bound workstation.
    Entry,
    /// Person left — shut the bound workstation down.
    Exit,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Entry => write!(f, "entry"),
            AccessKind::Exit => write!(f, "exit"),
        }
    }
}

/// The raw JSON message published by the gate controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusMessage {
    /// Opaque credential key.  `rfid` and `user_id` are legacy field names
    /// still emitted by older gate firmware.
    #[serde(alias = "rfid", alias = "user_id")]
    pub identity: String,
    /// `"entry"` or `"exit"`.
    #[serde(rename = "type")]
    pub kind: AccessKind,
    /// Which gate produced the event, when the site has more than one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_id: Option<String>,
}

impl BusMessage {
    /// Decodes a message from raw payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`BusMessageError`] when the JSON is malformed, a required
    /// field is missing, or the identity is empty.
    pub fn decode(payload: &[u8]) -> Result<Self, BusMessageError> {
        let msg: BusMessage = serde_json::from_slice(payload)?;
        if msg.identity.is_empty() {
            return Err(BusMessageError::EmptyIdentity);
        }
        Ok(msg)
    }
}

/// One access event flowing through the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessEvent {
    /// Correlation id stamped at ingest; every log line of this event's
    /// dispatch cycle carries it.
    pub event_id: Uuid,
    /// Opaque credential key.
    pub identity: String,
    /// Passage direction.
    pub kind: AccessKind,
    /// Source gate, if the controller reported one.
    pub gate_id: Option<String>,
    /// Wall-clock arrival time, recorded for the audit trail.
    pub received_at: SystemTime,
}

impl AccessEvent {
    /// Stamps a decoded bus message into a dispatchable event.
    pub fn from_bus(msg: BusMessage) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            identity: msg.identity,
            kind: msg.kind,
            gate_id: msg.gate_id,
            received_at: SystemTime::now(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
