//! DispatchEventUseCase: turns one access event into one power action.
//!
//! This use case sits at the application layer and talks only to trait
//! objects; the network-, subprocess- and file-backed implementations live
//! in the infrastructure layer and are injected at wiring time.
//!
//! # Dispatch steps
//!
//! 1. Resolve identity → [`DeviceRecord`] via the registry.  An unknown
//!    identity is a logged no-op, not an error — visitors badge through the
//!    same gate as staff.
//! 2. Ask the [`DedupCache`] whether this (identity, action) pair was
//!    already acted on inside the suppression window.  If so, short-circuit
//!    without refreshing the window.
//! 3. Record the event in the audit log **before** the power action, so the
//!    trail shows intent even when the action later fails.
//! 4. `entry`: broadcast the wake packet, then probe until the host answers
//!    or the probe budget runs out.  A host still booting is a pending
//!    outcome, not a failure.
//! 5. `exit`: run the remote shutdown chain.  A failed shutdown is logged
//!    and reported; the audit record from step 3 stands regardless, because
//!    the passage through the gate is a fact independent of the hardware
//!    action's success.
//!
//! A failure on one device never takes the daemon down: every outcome is a
//! value, and the only panics possible here are bugs.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gatewake_core::{AccessEvent, AccessKind, Credentials, DeviceRecord, MacParseError, PlatformError};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::application::dedup::DedupCache;

// ── Port errors ───────────────────────────────────────────────────────────────

/// Error type for device registry lookups.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The backing store could not be queried.
    #[error("registry lookup failed: {0}")]
    Lookup(String),
}

/// Error type for audit log writes.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The audit record could not be written.
    #[error("audit write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Error type for wake transmissions.
#[derive(Debug, Error)]
pub enum WakeError {
    /// The hardware address did not parse; no packet was sent.
    #[error("invalid hardware address: {0}")]
    InvalidAddress(#[from] MacParseError),

    /// The broadcast socket could not be created; no packet was sent.
    #[error("wake socket error: {0}")]
    Socket(#[from] std::io::Error),
}

/// Error type for the shutdown executor.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The device's OS class has no strategy chain; nothing was attempted.
    #[error(transparent)]
    UnsupportedPlatform(#[from] PlatformError),
}

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Identity → device lookup, owned by the external registry.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Returns the device bound to `identity`, or `None` when the identity
    /// is unknown.
    async fn device_by_identity(&self, identity: &str)
        -> Result<Option<DeviceRecord>, RegistryError>;
}

/// Append-only audit trail, owned by the external log store.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Persists one access event.
    async fn record_event(&self, event: &AccessEvent) -> Result<(), AuditError>;
}

/// Magic-packet transmitter.
#[async_trait]
pub trait WakeTransmitter: Send + Sync {
    /// Broadcasts a wake packet for `mac`.  Returns `Ok(true)` when at
    /// least one send completed, `Ok(false)` when every send failed.
    ///
    /// `target` lets the sender derive a subnet broadcast address.
    async fn wake(&self, mac: &str, target: Option<Ipv4Addr>) -> Result<bool, WakeError>;
}

/// Post-wake readiness probe.
#[async_trait]
pub trait LivenessProber: Send + Sync {
    /// Polls `address` until it answers or the configured budget elapses.
    /// Best-effort: `false` means "not seen yet", never an error.
    async fn is_online(&self, address: Ipv4Addr) -> bool;
}

/// OS-dispatched remote shutdown.
#[async_trait]
pub trait ShutdownExecutor: Send + Sync {
    /// Runs the strategy chain for `os` against `address`.  `Ok(false)`
    /// means every strategy failed; `Err` means no chain exists for `os`.
    async fn shutdown(
        &self,
        address: Ipv4Addr,
        os: &str,
        credentials: Option<&Credentials>,
    ) -> Result<bool, ShutdownError>;
}

// ── Outcome ───────────────────────────────────────────────────────────────────

/// Caller-visible result of one dispatch cycle.
///
/// Only `WakeFailed` and `ShutdownFailed` represent a power action that was
/// attempted and did not happen; everything else is an expected no-op or a
/// success shade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No device is bound to the identity — logged and dropped.
    DeviceNotFound,
    /// Same action inside the suppression window — already handled.
    Duplicate,
    /// The wake broadcast itself failed; the probe was skipped.
    WakeFailed,
    /// Wake sent and the host answered a probe.
    WokenOnline,
    /// Wake sent; the host had not answered when the probe budget ran out.
    /// Not a failure — the host is likely still booting.
    WakePending,
    /// A shutdown strategy succeeded.
    ShutdownCompleted,
    /// Every applicable shutdown strategy failed, or the OS is unsupported.
    ShutdownFailed,
}

// ── Use case ──────────────────────────────────────────────────────────────────

/// The Event Dispatcher.
///
/// All collaborators are injected as `Arc<dyn …>` so tests can substitute
/// recording fakes and the daemon can wire the real network-backed
/// implementations.
pub struct DispatchEventUseCase {
    registry: Arc<dyn DeviceRegistry>,
    audit: Arc<dyn AuditLog>,
    transmitter: Arc<dyn WakeTransmitter>,
    prober: Arc<dyn LivenessProber>,
    executor: Arc<dyn ShutdownExecutor>,
    dedup: Arc<DedupCache>,
    dedup_window: Duration,
}

impl DispatchEventUseCase {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        audit: Arc<dyn AuditLog>,
        transmitter: Arc<dyn WakeTransmitter>,
        prober: Arc<dyn LivenessProber>,
        executor: Arc<dyn ShutdownExecutor>,
        dedup: Arc<DedupCache>,
        dedup_window: Duration,
    ) -> Self {
        Self {
            registry,
            audit,
            transmitter,
            prober,
            executor,
            dedup,
            dedup_window,
        }
    }

    /// Processes one access event to completion.
    pub async fn dispatch(&self, event: &AccessEvent) -> DispatchOutcome {
        let event_id = event.event_id;

        // Step 1: resolve the identity.
        let device = match self.registry.device_by_identity(&event.identity).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                info!(%event_id, identity = %event.identity, "no device bound to identity; dropping event");
                return DispatchOutcome::DeviceNotFound;
            }
            Err(e) => {
                error!(%event_id, identity = %event.identity, "registry lookup failed: {e}");
                return DispatchOutcome::DeviceNotFound;
            }
        };

        // Step 2: suppression window.  A suppressed duplicate must not
        // refresh the window, so `record` is only called below.
        if self
            .dedup
            .has_recent(&event.identity, event.kind, self.dedup_window)
        {
            info!(
                %event_id,
                identity = %event.identity,
                kind = %event.kind,
                "duplicate inside suppression window; already handled"
            );
            return DispatchOutcome::Duplicate;
        }
        self.dedup.record(&event.identity, event.kind);

        // Step 3: audit before the power action, so the trail records
        // intent even when the action fails.  A failed write is logged but
        // does not block the action — the hardware outcome matters more
        // than the log line.
        if let Err(e) = self.audit.record_event(event).await {
            warn!(%event_id, "audit record failed: {e}");
        }

        // Steps 4/5: the power action.
        match event.kind {
            AccessKind::Entry => self.handle_entry(event, &device).await,
            AccessKind::Exit => self.handle_exit(event, &device).await,
        }
    }

    /// Entry: wake the device, then wait for it to come up.
    async fn handle_entry(&self, event: &AccessEvent, device: &DeviceRecord) -> DispatchOutcome {
        let event_id = event.event_id;

        match self
            .transmitter
            .wake(&device.mac, Some(device.address))
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(%event_id, hostname = %device.hostname, "every wake send failed");
                return DispatchOutcome::WakeFailed;
            }
            Err(e) => {
                warn!(%event_id, hostname = %device.hostname, "wake failed: {e}");
                return DispatchOutcome::WakeFailed;
            }
        }

        if self.prober.is_online(device.address).await {
            info!(%event_id, hostname = %device.hostname, "wake completed; host confirmed online");
            DispatchOutcome::WokenOnline
        } else {
            info!(
                %event_id,
                hostname = %device.hostname,
                "wake accepted; host still coming online"
            );
            DispatchOutcome::WakePending
        }
    }

    /// Exit: run the shutdown chain.
    async fn handle_exit(&self, event: &AccessEvent, device: &DeviceRecord) -> DispatchOutcome {
        let event_id = event.event_id;

        match self
            .executor
            .shutdown(device.address, &device.os, device.credentials.as_ref())
            .await
        {
            Ok(true) => {
                info!(%event_id, hostname = %device.hostname, "shutdown completed");
                DispatchOutcome::ShutdownCompleted
            }
            Ok(false) => {
                warn!(%event_id, hostname = %device.hostname, "every shutdown strategy failed");
                DispatchOutcome::ShutdownFailed
            }
            Err(e) => {
                warn!(%event_id, hostname = %device.hostname, "shutdown not attempted: {e}");
                DispatchOutcome::ShutdownFailed
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
