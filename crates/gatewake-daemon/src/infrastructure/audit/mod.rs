//! Audit log adapter.
//!
//! The canonical audit store is an external concern; the daemon's duty is
//! only to hand every accepted event over *before* acting on it.  This
//! adapter appends one JSON line per event to a local file:
//!
//! ```text
//! {"event_id":"…","identity":"TAG-0042","kind":"entry","gate_id":"north-1","recorded_at_unix":1754500000}
//! ```
//!
//! JSON-lines keeps the file greppable and trivially ingestable by whatever
//! central system the site runs.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use gatewake_core::AccessEvent;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::info;

use crate::application::dispatch_event::{AuditError, AuditLog};

/// One serialized audit line.
#[derive(Serialize)]
struct AuditRecord<'a> {
    event_id: String,
    identity: &'a str,
    kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    gate_id: Option<&'a str>,
    recorded_at_unix: u64,
}

/// Append-only JSON-lines audit writer.
pub struct JsonlAuditLog {
    path: PathBuf,
    // One writer at a time so concurrent workers cannot interleave lines.
    file: Mutex<File>,
}

impl JsonlAuditLog {
    /// Opens (or creates) the audit file in append mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "audit log opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Location of the audit file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditLog for JsonlAuditLog {
    async fn record_event(&self, event: &AccessEvent) -> Result<(), AuditError> {
        let record = AuditRecord {
            event_id: event.event_id.to_string(),
            identity: &event.identity,
            kind: event.kind.to_string(),
            gate_id: event.gate_id.as_deref(),
            recorded_at_unix: event
                .received_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        let line = serde_json::to_string(&record).map_err(std::io::Error::other)?;

        let mut file = self.file.lock().await;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
