//! Post-wake liveness probing.
//!
//! A magic packet is fire-and-forget, so after sending one the daemon polls
//! the target until it looks alive or a wall-clock budget runs out.  Each
//! round tries an ICMP echo first (one `ping` subprocess — raw ICMP sockets
//! need privileges the daemon should not have), then a TCP connect to each
//! candidate port.  The default ports are services a freshly booted Windows
//! host opens early: SMB (445), RDP (3389) and RPC (135).
//!
//! "Offline" answers — refused, timed out, unreachable — are all just "not
//! yet"; no probe failure is ever an error.  A `false` result is a
//! best-effort readiness signal, not proof the host failed to boot.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;
use tracing::{debug, trace};

use crate::application::dispatch_event::LivenessProber;

/// Per-probe attempts are capped at this, or the round interval if shorter.
const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Tuning for the polling loop.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// TCP ports that count as "host is up".
    pub ports: Vec<u16>,
    /// Total wall-clock budget.
    pub timeout: Duration,
    /// Pause between rounds.
    pub interval: Duration,
    /// Whether to attempt the ICMP echo step.  Containers often lack a
    /// `ping` binary or the rights to use it; TCP probing still works there.
    pub ping: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            ports: vec![445, 3389, 135],
            timeout: Duration::from_secs(10),
            interval: Duration::from_secs(1),
            ping: true,
        }
    }
}

/// Ping + TCP-connect prober.
pub struct NetworkProber {
    config: ProbeConfig,
}

impl NetworkProber {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Polls `address` with an explicit budget, independent of the
    /// constructor config.
    pub async fn probe(
        address: Ipv4Addr,
        ports: &[u16],
        timeout: Duration,
        interval: Duration,
        ping: bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        let probe_timeout = MAX_PROBE_TIMEOUT.min(interval);

        while Instant::now() < deadline {
            if ping && ping_once(address, probe_timeout).await {
                debug!(%address, "liveness confirmed by ICMP echo");
                return true;
            }
            for &port in ports {
                if tcp_connect(address, port, probe_timeout).await {
                    debug!(%address, port, "liveness confirmed by TCP connect");
                    return true;
                }
            }
            tokio::time::sleep(interval).await;
        }

        debug!(%address, "liveness probe budget elapsed");
        false
    }
}

#[async_trait]
impl LivenessProber for NetworkProber {
    async fn is_online(&self, address: Ipv4Addr) -> bool {
        Self::probe(
            address,
            &self.config.ports,
            self.config.timeout,
            self.config.interval,
            self.config.ping,
        )
        .await
    }
}

/// One ICMP echo via the platform `ping` binary.  Any failure — non-zero
/// exit, spawn error, timeout — is "not online".
async fn ping_once(address: Ipv4Addr, probe_timeout: Duration) -> bool {
    let timeout_ms = probe_timeout.as_millis().max(100).to_string();
    let timeout_s = probe_timeout.as_secs().max(1).to_string();
    let target = address.to_string();

    let mut command = Command::new("ping");
    if cfg!(target_os = "windows") {
        // -n count, -w timeout in milliseconds
        command.args(["-n", "1", "-w", &timeout_ms, &target]);
    } else {
        // -c count, -W timeout in seconds
        command.args(["-c", "1", "-W", &timeout_s, &target]);
    }
    command
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true);

    // Belt over the ping binary's own timeout flag.
    match tokio::time::timeout(probe_timeout + Duration::from_secs(1), async {
        command.status().await
    })
    .await
    {
        Ok(Ok(status)) => status.success(),
        Ok(Err(e)) => {
            trace!(%address, "ping spawn failed: {e}");
            false
        }
        Err(_) => false,
    }
}

/// One bounded TCP connect attempt.
async fn tcp_connect(address: Ipv4Addr, port: u16, probe_timeout: Duration) -> bool {
    let addr = SocketAddrV4::new(address, port);
    matches!(
        tokio::time::timeout(probe_timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
