//! Gatewake daemon — entry point.
//!
//! Wires the infrastructure adapters into the dispatch use case and runs
//! the bus → worker-pool pump until Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! gatewake-daemon [OPTIONS]
//!
//! Options:
//!   --config    <PATH>  Config file [default: platform config dir]
//!   --mqtt-host <HOST>  Override the broker host from the config
//!   --mqtt-port <PORT>  Override the broker port from the config
//!   --mqtt-topic <T>    Override the access-event topic from the config
//!   --workers   <N>     Override the dispatch worker count
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable              | Description                       |
//! |-----------------------|-----------------------------------|
//! | `GATEWAKE_CONFIG`     | Config file path                  |
//! | `GATEWAKE_MQTT_HOST`  | Broker hostname or IP             |
//! | `GATEWAKE_MQTT_PORT`  | Broker port                       |
//! | `GATEWAKE_MQTT_TOPIC` | Access-event topic                |
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()               -- TOML + CLI/env overrides
//!  └─ build components            -- registry, audit, sender, prober, executor
//!  └─ DispatchPool::spawn()       -- partitioned workers (Tokio tasks)
//!  └─ start_bus_subscriber()      -- MQTT poll loop (Tokio task)
//!  └─ pump: bus events → pool     -- until Ctrl-C
//! ```

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use gatewake_daemon::application::{DedupCache, DispatchEventUseCase, DispatchPool};
use gatewake_daemon::infrastructure::audit::JsonlAuditLog;
use gatewake_daemon::infrastructure::bus::start_bus_subscriber;
use gatewake_daemon::infrastructure::registry::StaticDeviceRegistry;
use gatewake_daemon::infrastructure::shutdown::{RemoteShutdown, SystemCommandRunner};
use gatewake_daemon::infrastructure::storage::load_config;
use gatewake_daemon::infrastructure::wake::{NetworkProber, WolSender};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Gatewake orchestrator daemon.
///
/// Subscribes to the gate controller's event bus and powers bound
/// workstations on or off as people badge in and out.
#[derive(Debug, Parser)]
#[command(
    name = "gatewake-daemon",
    about = "Gate access events in, workstation power actions out",
    version
)]
struct Cli {
    /// Path to the TOML config file.
    ///
    /// When omitted, the platform config file is used if it exists and
    /// built-in defaults otherwise.
    #[arg(long, env = "GATEWAKE_CONFIG")]
    config: Option<PathBuf>,

    /// MQTT broker hostname or IP, overriding the config file.
    #[arg(long, env = "GATEWAKE_MQTT_HOST")]
    mqtt_host: Option<String>,

    /// MQTT broker port, overriding the config file.
    #[arg(long, env = "GATEWAKE_MQTT_PORT")]
    mqtt_port: Option<u16>,

    /// Access-event topic, overriding the config file.
    #[arg(long, env = "GATEWAKE_MQTT_TOPIC")]
    mqtt_topic: Option<String>,

    /// Dispatch worker count, overriding the config file.
    #[arg(long)]
    workers: Option<usize>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load config first so its log level can seed the filter; `RUST_LOG`
    // still wins when set.
    let mut config = load_config(cli.config.as_deref()).context("loading configuration")?;
    if let Some(host) = cli.mqtt_host {
        config.mqtt.host = host;
    }
    if let Some(port) = cli.mqtt_port {
        config.mqtt.port = port;
    }
    if let Some(topic) = cli.mqtt_topic {
        config.mqtt.topic = topic;
    }
    if let Some(workers) = cli.workers {
        config.daemon.workers = workers;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.daemon.log_level.clone())),
        )
        .init();

    info!("Gatewake daemon starting");
    if config.devices.is_empty() {
        warn!("no devices configured; every access event will be dropped");
    }

    // ── Component wiring ──────────────────────────────────────────────────────
    let registry = Arc::new(StaticDeviceRegistry::new(config.devices.clone()));
    info!(devices = registry.len(), "device registry loaded");

    let audit_path = config.audit_log_path().context("resolving audit log path")?;
    let audit = Arc::new(JsonlAuditLog::open(&audit_path).context("opening audit log")?);

    let transmitter = Arc::new(WolSender::new(config.wake.port, config.wake.broadcast));
    let prober = Arc::new(NetworkProber::new(config.probe_config()));
    let executor = Arc::new(RemoteShutdown::new(
        config.strategy_config(),
        Arc::new(SystemCommandRunner),
    ));
    let dedup = Arc::new(DedupCache::new(config.daemon.dedup_capacity));

    let use_case = Arc::new(DispatchEventUseCase::new(
        registry,
        audit,
        transmitter,
        prober,
        executor,
        dedup,
        config.dedup_window(),
    ));

    let pool = DispatchPool::spawn(config.daemon.workers, use_case);

    // ── Shutdown flag and bus subscription ────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));

    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    let mut events = start_bus_subscriber(config.bus_config(), Arc::clone(&running));

    info!("Gatewake daemon ready.  Press Ctrl-C to exit.");

    // ── Pump loop ─────────────────────────────────────────────────────────────
    loop {
        tokio::select! {
            maybe_event = events.recv() => match maybe_event {
                Some(event) => {
                    if !pool.submit(event).await {
                        break;
                    }
                }
                // Subscriber closed its channel — shutting down.
                None => break,
            },
            () = tokio::time::sleep(Duration::from_millis(200)) => {
                if !running.load(Ordering::Relaxed) {
                    break;
                }
            }
        }
    }

    // Drain in-flight dispatches before exiting.
    pool.close().await;
    info!("Gatewake daemon stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
