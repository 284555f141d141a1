//! Integration tests for the remote shutdown executor and its strategy
//! chains, driven through the public [`ShutdownExecutor`] contract with a
//! scripted command runner standing in for the external tools.
//!
//! What these tests pin down:
//!
//! - Fallback progression: strategies run strictly in order, and a success
//!   anywhere in the chain is an overall success.
//! - The IPC$ session opened by the native strategy is released before the
//!   chain moves on to WinRM — even when the native strategy fails.
//! - Exhaustion of the whole chain is an overall failure, not an error.
//! - An unsupported OS class fails immediately with zero transport calls.
//! - The Linux SSH strategy fails cleanly against a dead or mute peer.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use gatewake_core::Credentials;
use gatewake_daemon::application::{ShutdownError, ShutdownExecutor};
use gatewake_daemon::infrastructure::shutdown::{
    CommandRunner, RemoteShutdown, RunOutcome, ShutdownConfig,
};

// ── Scripted runner ───────────────────────────────────────────────────────────

/// Answers each invocation from a (program, argument-fragment) script and
/// records the full command line.  Unscripted commands succeed.
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
        RunOutcome::Exit {
            success: true,
            stdout: String::new(),
            stderr: String::new(),
        }
    }
}

fn fail(stderr: &str) -> RunOutcome {
    RunOutcome::Exit {
        success: false,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

fn admin_credentials() -> Credentials {
    Credentials {
        username: Some("admin".to_string()),
        password: Some("secret".to_string()),
        key_path: None,
    }
}

const TARGET: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 50);

fn make_executor(runner: Arc<ScriptedRunner>) -> RemoteShutdown {
    RemoteShutdown::new(
        ShutdownConfig {
            timeout: Duration::from_secs(5),
            ssh_port: 22,
        },
        runner,
    )
}

// ── Windows chain ─────────────────────────────────────────────────────────────

/// Strategy 1 succeeds: nothing beyond psexec runs.
#[tokio::test]
async fn test_windows_chain_stops_after_psexec_success() {
    let runner = Arc::new(ScriptedRunner::new(vec![]));
    let executor = make_executor(Arc::clone(&runner));

    let ok = executor
        .shutdown(TARGET, "windows", Some(&admin_credentials()))
        .await
        .unwrap();

    assert!(ok);
    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("psexec"));
}

/// Strategies 1 and 2 fail, 3 succeeds: overall success, and the IPC$
/// session mapped by strategy 2 is released before strategy 3 starts.
#[tokio::test]
async fn test_windows_chain_falls_through_to_winrm_and_releases_session_first() {
    let runner = Arc::new(ScriptedRunner::new(vec![
        ("psexec", "shutdown", fail("Couldn't access 192.168.1.50")),
        ("shutdown", "/s", fail("Access is denied. (5)")),
    ]));
    let executor = make_executor(Arc::clone(&runner));

    let ok = executor
        .shutdown(TARGET, "windows", Some(&admin_credentials()))
        .await
        .unwrap();
    assert!(ok, "WinRM success must make the chain succeed");

    let calls = runner.calls();
    let release_pos = calls
        .iter()
        .rposition(|c| c.starts_with("net use") && c.contains("/delete /yes"))
        .expect("the mapped session must be released");
    let winrm_pos = calls
        .iter()
        .position(|c| c.starts_with("winrm") || c.starts_with("powershell"))
        .expect("strategy 3 must run");
    assert!(
        release_pos < winrm_pos,
        "session must be released before strategy 3: {calls:?}"
    );
}

/// Every strategy fails: overall failure without an error.
#[tokio::test]
async fn test_windows_chain_exhaustion_is_overall_failure() {
    let runner = Arc::new(ScriptedRunner::new(vec![
        ("psexec", "shutdown", fail("no psexec")),
        ("net", "/user:", fail("bad credentials")),
        ("shutdown", "/s", fail("Access is denied.")),
        ("powershell", "Stop-Computer", fail("WinRM cannot process the request")),
    ]));
    let executor = make_executor(Arc::clone(&runner));

    let ok = executor
        .shutdown(TARGET, "windows", Some(&admin_credentials()))
        .await
        .unwrap();
    assert!(!ok);
}

/// A hung transport counts as that strategy's failure and the chain moves
/// on.
#[tokio::test]
async fn test_windows_chain_treats_timeout_as_strategy_failure() {
    let runner = Arc::new(ScriptedRunner::new(vec![
        ("psexec", "shutdown", RunOutcome::TimedOut),
        ("shutdown", "/s", RunOutcome::TimedOut),
    ]));
    let executor = make_executor(Arc::clone(&runner));

    let ok = executor
        .shutdown(TARGET, "windows", Some(&admin_credentials()))
        .await
        .unwrap();
    assert!(ok, "WinRM still runs after the earlier strategies time out");

    let calls = runner.calls();
    assert!(calls.iter().any(|c| c.starts_with("powershell")));
}

/// Without credentials only the native strategy is applicable.
#[tokio::test]
async fn test_windows_chain_without_credentials_runs_native_only() {
    let runner = Arc::new(ScriptedRunner::new(vec![]));
    let executor = make_executor(Arc::clone(&runner));

    let ok = executor.shutdown(TARGET, "windows", None).await.unwrap();
    assert!(ok);

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].starts_with("shutdown /s /m \\\\192.168.1.50"));
}

// ── Unsupported platforms ─────────────────────────────────────────────────────

/// Unknown OS classes fail fast with zero transport calls.
#[tokio::test]
async fn test_unsupported_os_attempts_no_transport() {
    let runner = Arc::new(ScriptedRunner::new(vec![]));
    let executor = make_executor(Arc::clone(&runner));

    let result = executor
        .shutdown(TARGET, "beos", Some(&admin_credentials()))
        .await;

    assert!(matches!(
        result,
        Err(ShutdownError::UnsupportedPlatform(_))
    ));
    assert!(runner.calls().is_empty());
}

// ── Linux chain ───────────────────────────────────────────────────────────────

/// SSH to a port nothing listens on: clean overall failure, no panic.
#[tokio::test]
async fn test_linux_chain_fails_cleanly_against_dead_peer() {
    // Reserve a port, then free it so the connect is refused.
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let runner = Arc::new(ScriptedRunner::new(vec![]));
    let executor = RemoteShutdown::new(
        ShutdownConfig {
            timeout: Duration::from_secs(2),
            ssh_port: port,
        },
        runner,
    );

    let credentials = Credentials {
        username: Some("root".to_string()),
        password: Some("x".to_string()),
        key_path: None,
    };
    let ok = executor
        .shutdown(Ipv4Addr::LOCALHOST, "linux", Some(&credentials))
        .await
        .unwrap();
    assert!(!ok);
}

/// A peer that accepts the TCP connection but never speaks SSH: the
/// strategy is bounded by its timeout and the chain reports failure.
#[tokio::test]
async fn test_linux_chain_bounds_a_mute_ssh_peer() {
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .await
        .unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(async move {
        let _ = listener.accept().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let runner = Arc::new(ScriptedRunner::new(vec![]));
    let executor = RemoteShutdown::new(
        ShutdownConfig {
            timeout: Duration::from_secs(1),
            ssh_port: port,
        },
        runner,
    );

    let credentials = Credentials {
        username: Some("root".to_string()),
        password: Some("x".to_string()),
        key_path: None,
    };
    let started = std::time::Instant::now();
    let ok = executor
        .shutdown(Ipv4Addr::LOCALHOST, "linux", Some(&credentials))
        .await
        .unwrap();

    assert!(!ok);
    assert!(
        started.elapsed() < Duration::from_secs(5),
        "the strategy timeout must bound a mute peer"
    );
    server.abort();
}
