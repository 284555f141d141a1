//! Windows shutdown strategies.
//!
//! Three transports, tried in chain order:
//!
//! 1. **psexec** — the sysinternals remote-exec tool running the native
//!    `shutdown` command on the target under the supplied credentials.
//! 2. **native-shutdown** — `shutdown /s /m \\ADDR` issued locally; when
//!    credentials are present an IPC$ session is authenticated first via
//!    `net use`, trying the bare username and then the `.\user` local-account
//!    form.  The session is torn down on every exit path, success or not, so
//!    a later strategy never collides with a half-mapped share.
//! 3. **winrm** — the target is registered in the WinRM client's
//!    TrustedHosts, then `Stop-Computer -Force` runs remotely through
//!    `Invoke-Command` with a `PSCredential`.
//!
//! The shutdown itself is forced and delayed ten seconds, giving the target
//! a moment to flush and the command a chance to return cleanly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{AttemptOutcome, CommandRunner, RunOutcome, ShutdownStrategy, ShutdownTarget};

/// Delay handed to the remote `shutdown` command, in seconds.
const SHUTDOWN_DELAY_SECS: &str = "10";

/// Comment shown in the target's shutdown dialog.
const SHUTDOWN_COMMENT: &str = "Automatic shutdown - gate exit";

/// Budget for one `net use` session mapping.
const MAP_TIMEOUT: Duration = Duration::from_secs(15);

/// Budget for `net use /delete` cleanup calls.
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Budget for the best-effort TrustedHosts registration.
const TRUSTED_HOSTS_TIMEOUT: Duration = Duration::from_secs(10);

fn exit_detail(stdout: &str, stderr: &str) -> String {
    let detail = if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    };
    if detail.is_empty() {
        "command exited with a non-zero status".to_string()
    } else {
        detail.to_string()
    }
}

// ── Strategy 1: psexec ────────────────────────────────────────────────────────

/// Privileged remote execution through the sysinternals psexec tool.
pub struct PsExecStrategy {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl PsExecStrategy {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }
}

#[async_trait]
impl ShutdownStrategy for PsExecStrategy {
    fn name(&self) -> &'static str {
        "psexec"
    }

    async fn attempt(&self, target: &ShutdownTarget) -> AttemptOutcome {
        let (Some(username), Some(password)) = (
            target.credentials.username.as_deref(),
            target.credentials.password.as_deref(),
        ) else {
            return AttemptOutcome::Failed("credentials required".to_string());
        };

        let args = vec![
            format!("\\\\{}", target.address),
            "-u".to_string(),
            username.to_string(),
            "-p".to_string(),
            password.to_string(),
            "-accepteula".to_string(),
            "shutdown".to_string(),
            "/s".to_string(),
            "/t".to_string(),
            SHUTDOWN_DELAY_SECS.to_string(),
            "/f".to_string(),
        ];

        match self.runner.run("psexec", &args, self.timeout).await {
            RunOutcome::Exit { success, stdout, stderr } => {
                // psexec sometimes exits non-zero even after the remote
                // command ran; its banner text is the reliable signal.
                if success || stdout.to_lowercase().contains("successfully") {
                    AttemptOutcome::Success
                } else {
                    AttemptOutcome::Failed(exit_detail(&stdout, &stderr))
                }
            }
            RunOutcome::TimedOut => AttemptOutcome::TimedOut,
            RunOutcome::SpawnFailed(e) => {
                AttemptOutcome::Failed(format!("psexec unavailable: {e}"))
            }
        }
    }
}

// ── Strategy 2: native shutdown over an IPC$ session ──────────────────────────

/// The native `shutdown /s /m \\ADDR` command, with an authenticated IPC$
/// session when credentials are available.
pub struct NativeShutdownStrategy {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl NativeShutdownStrategy {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// Clears any stale session to `share`, then maps a new one.  Tries the
    /// bare username first, then the `.\user` local-account form.  Returns
    /// the username variant that authenticated, if any.
    async fn map_session(&self, share: &str, target: &ShutdownTarget) -> Option<String> {
        let (Some(username), Some(password)) = (
            target.credentials.username.as_deref(),
            target.credentials.password.as_deref(),
        ) else {
            return None;
        };

        for variant in [username.to_string(), format!(".\\{username}")] {
            // Stale mappings make `net use` refuse new credentials.
            let _ = self
                .runner
                .run("net", &delete_args(share), CLEANUP_TIMEOUT)
                .await;

            let map_args = vec![
                "use".to_string(),
                share.to_string(),
                password.to_string(),
                format!("/user:{variant}"),
            ];
            match self.runner.run("net", &map_args, MAP_TIMEOUT).await {
                outcome if outcome.succeeded() => {
                    info!(share, user = %variant, "IPC$ session authenticated");
                    return Some(variant);
                }
                RunOutcome::Exit { stdout, stderr, .. } => {
                    warn!(share, user = %variant, "IPC$ authentication failed: {}", exit_detail(&stdout, &stderr));
                }
                other => {
                    warn!(share, user = %variant, "net use failed: {other:?}");
                }
            }
        }
        None
    }

    /// Tears the session down; failures only get logged — there is nothing
    /// else to do with them.
    async fn release_session(&self, share: &str) {
        if let RunOutcome::Exit { success: false, stdout, stderr } = self
            .runner
            .run("net", &delete_args(share), CLEANUP_TIMEOUT)
            .await
        {
            warn!(share, "IPC$ session cleanup failed: {}", exit_detail(&stdout, &stderr));
        }
    }
}

fn delete_args(share: &str) -> Vec<String> {
    vec![
        "use".to_string(),
        share.to_string(),
        "/delete".to_string(),
        "/yes".to_string(),
    ]
}

#[async_trait]
impl ShutdownStrategy for NativeShutdownStrategy {
    fn name(&self) -> &'static str {
        "native-shutdown"
    }

    async fn attempt(&self, target: &ShutdownTarget) -> AttemptOutcome {
        let share = format!("\\\\{}\\IPC$", target.address);
        let session = self.map_session(&share, target).await;

        let args = vec![
            "/s".to_string(),
            "/m".to_string(),
            format!("\\\\{}", target.address),
            "/t".to_string(),
            SHUTDOWN_DELAY_SECS.to_string(),
            "/f".to_string(),
            "/c".to_string(),
            SHUTDOWN_COMMENT.to_string(),
        ];
        let result = self.runner.run("shutdown", &args, self.timeout).await;

        // Scoped release: whatever the command did, the session must be gone
        // before the chain can move to the next strategy.
        if session.is_some() {
            self.release_session(&share).await;
        }

        match result {
            RunOutcome::Exit { success: true, .. } => AttemptOutcome::Success,
            RunOutcome::Exit { stdout, stderr, .. } => {
                AttemptOutcome::Failed(exit_detail(&stdout, &stderr))
            }
            RunOutcome::TimedOut => AttemptOutcome::TimedOut,
            RunOutcome::SpawnFailed(e) => {
                AttemptOutcome::Failed(format!("shutdown unavailable: {e}"))
            }
        }
    }
}

// ── Strategy 3: WinRM / PowerShell ────────────────────────────────────────────

/// Remote `Stop-Computer -Force` over WinRM.
pub struct WinRmStrategy {
    runner: Arc<dyn CommandRunner>,
    timeout: Duration,
}

impl WinRmStrategy {
    pub fn new(runner: Arc<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }
}

#[async_trait]
impl ShutdownStrategy for WinRmStrategy {
    fn name(&self) -> &'static str {
        "winrm"
    }

    async fn attempt(&self, target: &ShutdownTarget) -> AttemptOutcome {
        let (Some(username), Some(password)) = (
            target.credentials.username.as_deref(),
            target.credentials.password.as_deref(),
        ) else {
            return AttemptOutcome::Failed("credentials required".to_string());
        };
        let address = target.address;

        // TrustedHosts registration is best-effort: it may already be set,
        // or group policy may forbid changing it and WinRM still works.
        let trust_args = vec![
            "set".to_string(),
            "winrm/config/client".to_string(),
            format!("@{{TrustedHosts=\"{address}\"}}"),
        ];
        if !self
            .runner
            .run("winrm", &trust_args, TRUSTED_HOSTS_TIMEOUT)
            .await
            .succeeded()
        {
            warn!(%address, "could not register TrustedHosts; continuing");
        }

        let script = format!(
            "$password = ConvertTo-SecureString '{password}' -AsPlainText -Force\n\
             $cred = New-Object System.Management.Automation.PSCredential('{username}', $password)\n\
             Invoke-Command -ComputerName {address} -Credential $cred -ScriptBlock {{\n\
                 Stop-Computer -Force\n\
             }} -ErrorAction Stop\n\
             exit 0"
        );

        match self
            .runner
            .run(
                "powershell",
                &["-Command".to_string(), script],
                self.timeout,
            )
            .await
        {
            RunOutcome::Exit { success: true, .. } => AttemptOutcome::Success,
            RunOutcome::Exit { stdout, stderr, .. } => {
                let detail = exit_detail(&stdout, &stderr);
                // Invoke-Command reports rejected credentials in text; map
                // it so the chain log names the real cause.
                if detail.to_lowercase().contains("access is denied") {
                    AttemptOutcome::AuthFailed(detail)
                } else {
                    AttemptOutcome::Failed(detail)
                }
            }
            RunOutcome::TimedOut => AttemptOutcome::TimedOut,
            RunOutcome::SpawnFailed(e) => {
                AttemptOutcome::Failed(format!("powershell unavailable: {e}"))
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use gatewake_core::Credentials;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    /// Runner fake that records every invocation and answers from a script
    /// keyed on (program, first matching argument fragment).
    struct ScriptedRunner {
        calls: Mutex<Vec<String>>,
        script: Vec<(&'static str, &'static str, RunOutcome)>,
    }

    impl ScriptedRunner {
        fn new(script: Vec<(&'static str, &'static str, RunOutcome)>) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                script,
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommandRunner for ScriptedRunner {
        async fn run(&self, program: &str, args: &[String], _timeout: Duration) -> RunOutcome {
            let line = format!("{program} {}", args.join(" "));
            self.calls.lock().unwrap().push(line.clone());
            for (prog, fragment, outcome) in &self.script {
                if *prog == program && line.contains(fragment) {
                    return outcome.clone();
                }
            }
            // Unscripted commands succeed quietly.
            RunOutcome::Exit {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            }
        }
    }

    fn ok() -> RunOutcome {
        RunOutcome::Exit {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        }
    }

    fn fail(stderr: &str) -> RunOutcome {
        RunOutcome::Exit {
            success: false,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn make_target() -> ShutdownTarget {
        ShutdownTarget {
            address: Ipv4Addr::new(192, 168, 1, 50),
            credentials: Credentials {
                username: Some("admin".to_string()),
                password: Some("secret".to_string()),
                key_path: None,
            },
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    // ── psexec ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_psexec_success_on_zero_exit() {
        let runner = Arc::new(ScriptedRunner::new(vec![("psexec", "shutdown", ok())]));
        let strategy = PsExecStrategy::new(Arc::clone(&runner) as Arc<dyn CommandRunner>, TIMEOUT);
        assert_eq!(strategy.attempt(&make_target()).await, AttemptOutcome::Success);

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].starts_with("psexec \\\\192.168.1.50 -u admin -p secret -accepteula"));
    }

    #[tokio::test]
    async fn test_psexec_banner_text_counts_as_success() {
        let runner = Arc::new(ScriptedRunner::new(vec![(
            "psexec",
            "shutdown",
            RunOutcome::Exit {
                success: false,
                stdout: "shutdown exited on 192.168.1.50 Successfully.".to_string(),
                stderr: String::new(),
            },
        )]));
        let strategy = PsExecStrategy::new(runner as Arc<dyn CommandRunner>, TIMEOUT);
        assert_eq!(strategy.attempt(&make_target()).await, AttemptOutcome::Success);
    }

    #[tokio::test]
    async fn test_psexec_timeout_maps_to_timed_out() {
        let runner = Arc::new(ScriptedRunner::new(vec![(
            "psexec",
            "shutdown",
            RunOutcome::TimedOut,
        )]));
        let strategy = PsExecStrategy::new(runner as Arc<dyn CommandRunner>, TIMEOUT);
        assert_eq!(strategy.attempt(&make_target()).await, AttemptOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_psexec_without_credentials_does_not_run() {
        let runner = Arc::new(ScriptedRunner::new(vec![]));
        let strategy = PsExecStrategy::new(Arc::clone(&runner) as Arc<dyn CommandRunner>, TIMEOUT);
        let target = ShutdownTarget {
            address: Ipv4Addr::new(192, 168, 1, 50),
            credentials: Credentials::default(),
        };
        assert!(matches!(
            strategy.attempt(&target).await,
            AttemptOutcome::Failed(_)
        ));
        assert!(runner.calls().is_empty());
    }

    // ── native shutdown ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_native_maps_session_runs_shutdown_then_releases() {
        let runner = Arc::new(ScriptedRunner::new(vec![]));
        let strategy =
            NativeShutdownStrategy::new(Arc::clone(&runner) as Arc<dyn CommandRunner>, TIMEOUT);
        assert_eq!(strategy.attempt(&make_target()).await, AttemptOutcome::Success);

        let calls = runner.calls();
        // stale-session cleanup, map, shutdown, release — in that order.
        assert!(calls[0].contains("net use \\\\192.168.1.50\\IPC$ /delete /yes"));
        assert!(calls[1].contains("net use \\\\192.168.1.50\\IPC$ secret /user:admin"));
        assert!(calls[2].starts_with("shutdown /s /m \\\\192.168.1.50 /t 10 /f /c"));
        assert!(calls[3].contains("/delete /yes"));
    }

    #[tokio::test]
    async fn test_native_falls_back_to_local_account_user_form() {
        let runner = Arc::new(ScriptedRunner::new(vec![(
            "net",
            "/user:admin",
            fail("System error 86: the password is not correct"),
        )]));
        let strategy =
            NativeShutdownStrategy::new(Arc::clone(&runner) as Arc<dyn CommandRunner>, TIMEOUT);
        strategy.attempt(&make_target()).await;

        let calls = runner.calls();
        // The `.\admin` variant matches the "/user:admin" fragment too, so
        // look for the literal qualified form among the calls.
        assert!(
            calls.iter().any(|c| c.contains("/user:.\\admin")),
            "local-account variant must be tried after the bare username: {calls:?}"
        );
    }

    #[tokio::test]
    async fn test_native_releases_session_even_when_shutdown_fails() {
        let runner = Arc::new(ScriptedRunner::new(vec![(
            "shutdown",
            "/s",
            fail("Access is denied. (5)"),
        )]));
        let strategy =
            NativeShutdownStrategy::new(Arc::clone(&runner) as Arc<dyn CommandRunner>, TIMEOUT);
        let outcome = strategy.attempt(&make_target()).await;
        assert!(matches!(outcome, AttemptOutcome::Failed(_)));

        let calls = runner.calls();
        let shutdown_pos = calls.iter().position(|c| c.starts_with("shutdown")).unwrap();
        let release_pos = calls.iter().rposition(|c| c.contains("/delete /yes")).unwrap();
        assert!(
            release_pos > shutdown_pos,
            "session must be released after the failed shutdown: {calls:?}"
        );
    }

    #[tokio::test]
    async fn test_native_without_credentials_skips_session_mapping() {
        let runner = Arc::new(ScriptedRunner::new(vec![]));
        let strategy =
            NativeShutdownStrategy::new(Arc::clone(&runner) as Arc<dyn CommandRunner>, TIMEOUT);
        let target = ShutdownTarget {
            address: Ipv4Addr::new(192, 168, 1, 50),
            credentials: Credentials::default(),
        };
        assert_eq!(strategy.attempt(&target).await, AttemptOutcome::Success);

        let calls = runner.calls();
        assert_eq!(calls.len(), 1, "only the shutdown command must run: {calls:?}");
        assert!(calls[0].starts_with("shutdown /s /m"));
    }

    // ── winrm ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_winrm_registers_trusted_hosts_then_invokes_powershell() {
        let runner = Arc::new(ScriptedRunner::new(vec![]));
        let strategy = WinRmStrategy::new(Arc::clone(&runner) as Arc<dyn CommandRunner>, TIMEOUT);
        assert_eq!(strategy.attempt(&make_target()).await, AttemptOutcome::Success);

        let calls = runner.calls();
        assert!(calls[0].contains("winrm set winrm/config/client"));
        assert!(calls[0].contains("TrustedHosts=\"192.168.1.50\""));
        assert!(calls[1].starts_with("powershell -Command"));
        assert!(calls[1].contains("Stop-Computer -Force"));
        assert!(calls[1].contains("PSCredential('admin'"));
    }

    #[tokio::test]
    async fn test_winrm_proceeds_when_trusted_hosts_registration_fails() {
        let runner = Arc::new(ScriptedRunner::new(vec![(
            "winrm",
            "TrustedHosts",
            fail("Access denied"),
        )]));
        let strategy = WinRmStrategy::new(Arc::clone(&runner) as Arc<dyn CommandRunner>, TIMEOUT);
        assert_eq!(strategy.attempt(&make_target()).await, AttemptOutcome::Success);
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_winrm_maps_access_denied_to_auth_failure() {
        let runner = Arc::new(ScriptedRunner::new(vec![(
            "powershell",
            "Stop-Computer",
            fail("Connecting to remote server failed: Access is denied."),
        )]));
        let strategy = WinRmStrategy::new(runner as Arc<dyn CommandRunner>, TIMEOUT);
        assert!(matches!(
            strategy.attempt(&make_target()).await,
            AttemptOutcome::AuthFailed(_)
        ));
    }
}
