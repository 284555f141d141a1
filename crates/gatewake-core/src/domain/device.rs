//! Device registry records and target-host classification.
//!
//! A [`DeviceRecord`] binds one physical access credential (an opaque
//! identity string, typically an RFID tag id) to one workstation.  Records
//! are owned by the external registry; the orchestrator only ever reads
//! them.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised when a device's OS string names a platform the shutdown
/// executor has no strategy chain for.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unsupported target platform: '{0}' (expected 'windows' or 'linux')")]
pub struct PlatformError(pub String);

/// The OS class of a target host, driving shutdown strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsClass {
    Windows,
    Linux,
}

impl FromStr for OsClass {
    type Err = PlatformError;

    /// Parses the registry's textual OS class, case-insensitively.
    ///
    /// Registry data is external input, so an unknown value is an
    /// [`PlatformError`], not a panic.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "windows" => Ok(OsClass::Windows),
            "linux" => Ok(OsClass::Linux),
            other => Err(PlatformError(other.to_string())),
        }
    }
}

impl fmt::Display for OsClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OsClass::Windows => write!(f, "windows"),
            OsClass::Linux => write!(f, "linux"),
        }
    }
}

/// Credential bundle for remote shutdown.
///
/// Windows targets use `username` + `password`.  Linux targets use
/// `username` + either `password` or `key_path`; when both are present the
/// key takes precedence.  All fields are optional because the native
/// Windows shutdown path can run without credentials when the daemon's own
/// account has rights on the target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Path to an SSH private key (Linux targets only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_path: Option<PathBuf>,
}

impl Credentials {
    /// True when both a username and a password are present — the minimum
    /// the credentialed Windows strategies need.
    pub fn has_user_and_password(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// One registered workstation, bound to one access identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Opaque unique key correlating a physical access credential to this
    /// device (e.g. an RFID tag id).
    pub identity: String,
    /// Host name, used only for logging.
    pub hostname: String,
    /// IPv4 address of the workstation on the LAN.
    pub address: Ipv4Addr,
    /// Hardware address in any of its textual encodings.  Kept as the
    /// registry's raw string; the wake transmitter validates it at send
    /// time, so a bad registry row surfaces as a per-device failure rather
    /// than a load-time crash.
    pub mac: String,
    /// Textual OS class (`"windows"` or `"linux"`).  Raw for the same
    /// reason; the shutdown executor validates it at dispatch time.
    pub os: String,
    /// Remote-shutdown credentials, absent when the device is wake-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
