//! Remote shutdown via an ordered chain of per-OS strategies.
//!
//! There is no single reliable way to power a remote workstation off: the
//! privileged-exec tool may not be installed, the native remote shutdown
//! needs an authenticated session, WinRM may be disabled, sudo may prompt.
//! So each OS gets an ordered list of [`ShutdownStrategy`] objects, tried
//! strictly one after another until one succeeds.  Sequential on purpose —
//! racing two administrative sessions against the same target is how you
//! get half-mapped shares and locked-out accounts.
//!
//! Every attempt is bounded by its own timeout; a hung transport is that
//! strategy's failure, never the daemon's.  Only exhaustion of the whole
//! chain surfaces as an overall failure, and even that is a value, not a
//! panic.

pub mod linux;
pub mod windows;

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gatewake_core::{Credentials, OsClass};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::application::dispatch_event::{ShutdownError, ShutdownExecutor};

use linux::SshShutdownStrategy;
use windows::{NativeShutdownStrategy, PsExecStrategy, WinRmStrategy};

// ── Subprocess seam ───────────────────────────────────────────────────────────

/// Result of one bounded subprocess invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process ran to completion.
    Exit {
        success: bool,
        stdout: String,
        stderr: String,
    },
    /// The process outlived its timeout and was killed.
    TimedOut,
    /// The process could not be started (binary missing, permissions).
    SpawnFailed(String),
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, RunOutcome::Exit { success: true, .. })
    }
}

/// Bounded external-command execution.
///
/// The Windows strategies shell out to `psexec`, `net`, `shutdown`, `winrm`
/// and `powershell`; putting the invocation behind a trait lets tests script
/// every transport without any of those binaries installed.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> RunOutcome;
}

/// The production runner: `tokio::process` with a hard timeout.
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, program: &str, args: &[String], timeout: Duration) -> RunOutcome {
        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return RunOutcome::SpawnFailed(e.to_string()),
            // kill_on_drop reaps the straggler when the future is dropped.
            Err(_) => return RunOutcome::TimedOut,
        };

        RunOutcome::Exit {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

// ── Strategy contract ─────────────────────────────────────────────────────────

/// What one strategy attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The target accepted the shutdown.
    Success,
    /// The transport ran but the target refused or errored.
    Failed(String),
    /// The transport hit its timeout.
    TimedOut,
    /// The target rejected the supplied credentials.
    AuthFailed(String),
}

/// The host a chain is being run against.
#[derive(Debug, Clone)]
pub struct ShutdownTarget {
    pub address: Ipv4Addr,
    pub credentials: Credentials,
}

/// One remote-execution mechanism in a chain.
#[async_trait]
pub trait ShutdownStrategy: Send + Sync {
    /// Transport name for logs and attempt results.
    fn name(&self) -> &'static str;

    /// Tries to shut `target` down.  Must be internally bounded — a hang in
    /// one strategy must not block the rest of the chain.
    async fn attempt(&self, target: &ShutdownTarget) -> AttemptOutcome;
}

/// Record of one attempt, kept for logging and fallback decisions only.
#[derive(Debug, Clone)]
pub struct ShutdownAttemptResult {
    pub strategy: &'static str,
    pub success: bool,
    pub detail: String,
}

/// Runs `chain` in order until a strategy succeeds.
///
/// Returns the overall verdict and the per-strategy trail.
pub async fn run_chain(
    chain: &[Box<dyn ShutdownStrategy>],
    target: &ShutdownTarget,
) -> (bool, Vec<ShutdownAttemptResult>) {
    let mut results = Vec::with_capacity(chain.len());

    for strategy in chain {
        debug!(strategy = strategy.name(), address = %target.address, "attempting shutdown strategy");
        let outcome = strategy.attempt(target).await;

        let (success, detail) = match &outcome {
            AttemptOutcome::Success => (true, "ok".to_string()),
            AttemptOutcome::Failed(detail) => (false, detail.clone()),
            AttemptOutcome::TimedOut => (false, "transport timeout".to_string()),
            AttemptOutcome::AuthFailed(detail) => (false, format!("authentication: {detail}")),
        };
        results.push(ShutdownAttemptResult {
            strategy: strategy.name(),
            success,
            detail: detail.clone(),
        });

        if success {
            info!(strategy = strategy.name(), address = %target.address, "shutdown strategy succeeded");
            return (true, results);
        }
        warn!(
            strategy = strategy.name(),
            address = %target.address,
            detail = %detail,
            "shutdown strategy failed; falling through"
        );
    }

    (false, results)
}

// ── Executor ──────────────────────────────────────────────────────────────────

/// Chain tuning shared by all strategies.
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Per-strategy timeout.
    pub timeout: Duration,
    /// SSH port for the Linux strategy.
    pub ssh_port: u16,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            ssh_port: 22,
        }
    }
}

/// The per-OS dispatching executor.
pub struct RemoteShutdown {
    config: ShutdownConfig,
    runner: Arc<dyn CommandRunner>,
}

impl RemoteShutdown {
    pub fn new(config: ShutdownConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self { config, runner }
    }

    /// The Windows chain: privileged exec tool, then native shutdown over an
    /// authenticated session, then WinRM scripting.  The credentialed
    /// strategies are only included when credentials are present.
    fn windows_chain(&self, target: &ShutdownTarget) -> Vec<Box<dyn ShutdownStrategy>> {
        let mut chain: Vec<Box<dyn ShutdownStrategy>> = Vec::with_capacity(3);
        let with_credentials = target.credentials.has_user_and_password();

        if with_credentials {
            chain.push(Box::new(PsExecStrategy::new(
                Arc::clone(&self.runner),
                self.config.timeout,
            )));
        }
        chain.push(Box::new(NativeShutdownStrategy::new(
            Arc::clone(&self.runner),
            self.config.timeout,
        )));
        if with_credentials {
            chain.push(Box::new(WinRmStrategy::new(
                Arc::clone(&self.runner),
                self.config.timeout,
            )));
        }
        chain
    }

    fn linux_chain(&self) -> Vec<Box<dyn ShutdownStrategy>> {
        vec![Box::new(SshShutdownStrategy::new(
            self.config.ssh_port,
            self.config.timeout,
        ))]
    }
}

#[async_trait]
impl ShutdownExecutor for RemoteShutdown {
    async fn shutdown(
        &self,
        address: Ipv4Addr,
        os: &str,
        credentials: Option<&Credentials>,
    ) -> Result<bool, ShutdownError> {
        // Validate the platform before any network action.
        let os_class: OsClass = os.parse()?;

        let target = ShutdownTarget {
            address,
            credentials: credentials.cloned().unwrap_or_default(),
        };
        let chain = match os_class {
            OsClass::Windows => self.windows_chain(&target),
            OsClass::Linux => self.linux_chain(),
        };

        let (success, _trail) = run_chain(&chain, &target).await;
        Ok(success)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
