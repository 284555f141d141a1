//! TOML-based configuration for the daemon.
//!
//! Reads `AppConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\Gatewake\config.toml`
//! - Linux:    `~/.config/gatewake/config.toml`
//! - macOS:    `~/Library/Application Support/Gatewake/config.toml`
//!
//! Example:
//!
//! ```toml
//! [mqtt]
//! host = "10.0.0.2"
//! topic = "gate/access"
//!
//! [wake]
//! port = 9
//! probe_ports = [445, 3389, 135]
//!
//! [[devices]]
//! identity = "TAG-0042"
//! hostname = "ws-lab-07"
//! address = "192.168.1.57"
//! mac = "AA:BB:CC:DD:EE:FF"
//! os = "windows"
//! credentials = { username = "admin", password = "hunter2" }
//! ```
//!
//! Every field has a serde default, so a missing file, an empty file, and a
//! partially filled file all produce a working configuration — first runs
//! and upgrades from older config files behave identically.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use gatewake_core::DeviceRecord;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::bus::BusConfig;
use crate::infrastructure::shutdown::ShutdownConfig as StrategyConfig;
use crate::infrastructure::wake::ProbeConfig;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level daemon configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
    #[serde(default)]
    pub wake: WakeConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    /// The device registry: one table per bound workstation.
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
}

/// General daemon behaviour settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
    /// Dispatch worker count.  Identities are partitioned across workers,
    /// so this bounds cross-identity concurrency.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Suppression window for repeated identical actions, in seconds.
    #[serde(default = "default_dedup_window_secs")]
    pub dedup_window_secs: u64,
    /// Dedup cache size that triggers pruning.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Audit file location; defaults to `audit.jsonl` next to the config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_log: Option<PathBuf>,
}

/// Gate event bus (MQTT broker) settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
    /// Topic the gate controller publishes access events on.
    #[serde(default = "default_mqtt_topic")]
    pub topic: String,
    #[serde(default = "default_mqtt_client_id")]
    pub client_id: String,
}

/// Wake-on-LAN and liveness probe settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WakeConfig {
    /// Primary UDP port for the magic packet (port 7 is always tried too).
    #[serde(default = "default_wol_port")]
    pub port: u16,
    /// Explicit broadcast address; when absent the target's /24 subnet
    /// broadcast is derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast: Option<Ipv4Addr>,
    /// TCP ports that count as "host is up" after a wake.
    #[serde(default = "default_probe_ports")]
    pub probe_ports: Vec<u16>,
    /// Total probe budget, in seconds.
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    /// Pause between probe rounds, in seconds.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    /// Whether to attempt ICMP echo probes.
    #[serde(default = "default_true")]
    pub ping: bool,
}

/// Remote shutdown settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShutdownConfig {
    /// Per-strategy timeout, in seconds.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub timeout_secs: u64,
    /// SSH port for Linux targets.
    #[serde(default = "default_ssh_port")]
    pub ssh_port: u16,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_workers() -> usize {
    4
}
fn default_dedup_window_secs() -> u64 {
    3
}
fn default_dedup_capacity() -> usize {
    1024
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_mqtt_host() -> String {
    "localhost".to_string()
}
fn default_mqtt_port() -> u16 {
    1883
}
fn default_mqtt_topic() -> String {
    "gate/access".to_string()
}
fn default_mqtt_client_id() -> String {
    "gatewake-daemon".to_string()
}
fn default_wol_port() -> u16 {
    9
}
fn default_probe_ports() -> Vec<u16> {
    vec![445, 3389, 135]
}
fn default_probe_timeout_secs() -> u64 {
    10
}
fn default_probe_interval_secs() -> u64 {
    1
}
fn default_true() -> bool {
    true
}
fn default_shutdown_timeout_secs() -> u64 {
    30
}
fn default_ssh_port() -> u16 {
    22
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            dedup_window_secs: default_dedup_window_secs(),
            dedup_capacity: default_dedup_capacity(),
            log_level: default_log_level(),
            audit_log: None,
        }
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            topic: default_mqtt_topic(),
            client_id: default_mqtt_client_id(),
        }
    }
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            port: default_wol_port(),
            broadcast: None,
            probe_ports: default_probe_ports(),
            probe_timeout_secs: default_probe_timeout_secs(),
            probe_interval_secs: default_probe_interval_secs(),
            ping: default_true(),
        }
    }
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_shutdown_timeout_secs(),
            ssh_port: default_ssh_port(),
        }
    }
}

// ── Component config conversions ──────────────────────────────────────────────

impl AppConfig {
    /// Bus settings for the MQTT subscriber.
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            host: self.mqtt.host.clone(),
            port: self.mqtt.port,
            topic: self.mqtt.topic.clone(),
            client_id: self.mqtt.client_id.clone(),
        }
    }

    /// Probe tuning for the liveness prober.
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            ports: self.wake.probe_ports.clone(),
            timeout: Duration::from_secs(self.wake.probe_timeout_secs),
            interval: Duration::from_secs(self.wake.probe_interval_secs.max(1)),
            ping: self.wake.ping,
        }
    }

    /// Chain tuning for the shutdown executor.
    pub fn strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            timeout: Duration::from_secs(self.shutdown.timeout_secs),
            ssh_port: self.shutdown.ssh_port,
        }
    }

    /// Suppression window for the dedup cache.
    pub fn dedup_window(&self) -> Duration {
        Duration::from_secs(self.daemon.dedup_window_secs)
    }

    /// Audit file location: the configured one, or `audit.jsonl` in the
    /// platform config directory.
    pub fn audit_log_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.daemon.audit_log {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("audit.jsonl")),
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config
/// base directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads `AppConfig` from `path` when given, or from the platform config
/// file otherwise.  A missing default-location file yields
/// `AppConfig::default()`; an explicitly named file must exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors and
/// [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            Ok(toml::from_str(&content)?)
        }
        None => {
            let path = config_dir()?.join("config.toml");
            match std::fs::read_to_string(&path) {
                Ok(content) => Ok(toml::from_str(&content)?),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
                Err(source) => Err(ConfigError::Io { path, source }),
            }
        }
    }
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // %APPDATA% e.g. C:\Users\<user>\AppData\Roaming
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Gatewake"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("gatewake"))
    }

    #[cfg(target_os = "macos")]
    {
        // ~/Library/Application Support/Gatewake
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Gatewake")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
