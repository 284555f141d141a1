//! Device registry adapter.
//!
//! The full registry (people, devices, bindings) lives in an external
//! system; the daemon only needs identity → device lookups.  This adapter
//! serves them from the `[[devices]]` tables of the daemon's own config
//! file — enough for a site of workstations, and trivially swappable for a
//! database-backed implementation behind the same port.

use std::collections::HashMap;

use async_trait::async_trait;
use gatewake_core::DeviceRecord;
use tracing::warn;

use crate::application::dispatch_event::{DeviceRegistry, RegistryError};

/// Config-file-backed, read-only device registry.
pub struct StaticDeviceRegistry {
    devices: HashMap<String, DeviceRecord>,
}

impl StaticDeviceRegistry {
    /// Indexes `devices` by identity.  On duplicate identities the first
    /// record wins and the collision is logged.
    pub fn new(devices: Vec<DeviceRecord>) -> Self {
        let mut index = HashMap::with_capacity(devices.len());
        for device in devices {
            if index.contains_key(&device.identity) {
                warn!(
                    identity = %device.identity,
                    hostname = %device.hostname,
                    "duplicate identity in device registry; keeping the first record"
                );
                continue;
            }
            index.insert(device.identity.clone(), device);
        }
        Self { devices: index }
    }

    /// Number of registered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True when no devices are registered.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[async_trait]
impl DeviceRegistry for StaticDeviceRegistry {
    async fn device_by_identity(
        &self,
        identity: &str,
    ) -> Result<Option<DeviceRecord>, RegistryError> {
        Ok(self.devices.get(identity).cloned())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
