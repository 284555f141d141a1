//! Linux shutdown strategy: one command over SSH.
//!
//! The session authenticates with a private key when one is configured,
//! falling back to password auth (key takes precedence when both are
//! present), and runs a *deferred* shutdown:
//!
//! ```text
//! sudo shutdown -h +1
//! ```
//!
//! The one-minute delay is deliberate — an immediate halt can tear the
//! connection down before the command's exit status makes it back, turning
//! every successful shutdown into a reported failure.
//!
//! `ssh2` is a blocking libssh2 binding, so the whole exchange runs on the
//! blocking thread pool under the strategy timeout.  Authentication,
//! protocol and connection failures are distinct in the logs but all
//! collapse to a failed attempt at the chain boundary.

use std::io::Read;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::time::Duration;

use async_trait::async_trait;
use gatewake_core::Credentials;
use ssh2::Session;
use thiserror::Error;
use tracing::{info, warn};

use super::{AttemptOutcome, ShutdownStrategy, ShutdownTarget};

/// The deferred privileged halt issued on the target.
const SHUTDOWN_COMMAND: &str = "sudo shutdown -h +1";

/// Username assumed when the credential bundle names none.
const DEFAULT_USERNAME: &str = "root";

/// Budget for the TCP connect preceding the SSH handshake.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// SSH failure causes, kept distinct so the logs name the real problem.
#[derive(Debug, Error)]
enum SshError {
    /// The target rejected the key or password.
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Handshake or channel-level protocol failure.
    #[error("ssh protocol error: {0}")]
    Protocol(String),

    /// The TCP connection could not be established.
    #[error("connection failed: {0}")]
    Connect(#[from] std::io::Error),
}

/// SSH-based remote shutdown.
pub struct SshShutdownStrategy {
    port: u16,
    timeout: Duration,
}

impl SshShutdownStrategy {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

#[async_trait]
impl ShutdownStrategy for SshShutdownStrategy {
    fn name(&self) -> &'static str {
        "ssh"
    }

    async fn attempt(&self, target: &ShutdownTarget) -> AttemptOutcome {
        let address = target.address;
        let port = self.port;
        let credentials = target.credentials.clone();
        let session_timeout = self.timeout;

        let exec = tokio::task::spawn_blocking(move || {
            ssh_exec(address, port, &credentials, session_timeout, SHUTDOWN_COMMAND)
        });

        match tokio::time::timeout(self.timeout, exec).await {
            // Whole exchange finished inside the budget.
            Ok(Ok(Ok(0))) => {
                info!(%address, "remote shutdown scheduled over ssh");
                AttemptOutcome::Success
            }
            Ok(Ok(Ok(status))) => {
                warn!(%address, status, "remote shutdown command failed");
                AttemptOutcome::Failed(format!("remote command exited with status {status}"))
            }
            Ok(Ok(Err(e @ SshError::Auth(_)))) => {
                warn!(%address, "ssh authentication failed: {e}");
                AttemptOutcome::AuthFailed(e.to_string())
            }
            Ok(Ok(Err(e))) => {
                warn!(%address, "ssh attempt failed: {e}");
                AttemptOutcome::Failed(e.to_string())
            }
            Ok(Err(join_error)) => {
                warn!(%address, "ssh task aborted: {join_error}");
                AttemptOutcome::Failed(join_error.to_string())
            }
            // The blocking task keeps running until libssh2's own timeout
            // fires; the chain moves on regardless.
            Err(_) => AttemptOutcome::TimedOut,
        }
    }
}

/// Connects, authenticates, runs `command`, and returns its exit status.
fn ssh_exec(
    address: Ipv4Addr,
    port: u16,
    credentials: &Credentials,
    session_timeout: Duration,
    command: &str,
) -> Result<i32, SshError> {
    let addr = SocketAddr::from((address, port));
    let tcp = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)?;

    let mut session = Session::new().map_err(|e| SshError::Protocol(e.to_string()))?;
    // Bounds every libssh2 call so a silent peer cannot pin the blocking
    // thread past the strategy timeout.
    session.set_timeout(session_timeout.as_millis().min(u128::from(u32::MAX)) as u32);
    session.set_tcp_stream(tcp);
    session
        .handshake()
        .map_err(|e| SshError::Protocol(e.to_string()))?;

    let username = credentials
        .username
        .as_deref()
        .unwrap_or(DEFAULT_USERNAME);

    authenticate(&session, username, credentials)?;

    let mut channel = session
        .channel_session()
        .map_err(|e| SshError::Protocol(e.to_string()))?;
    channel
        .exec(command)
        .map_err(|e| SshError::Protocol(e.to_string()))?;

    // Drain the channel so the exit status is available after close.
    let mut output = String::new();
    let _ = channel.read_to_string(&mut output);
    let _ = channel.wait_close();

    channel
        .exit_status()
        .map_err(|e| SshError::Protocol(e.to_string()))
}

/// Key authentication when a key path is configured (it wins over a
/// password), password authentication otherwise.
fn authenticate(
    session: &Session,
    username: &str,
    credentials: &Credentials,
) -> Result<(), SshError> {
    if let Some(key_path) = &credentials.key_path {
        return session
            .userauth_pubkey_file(username, None, key_path, None)
            .map_err(|e| SshError::Auth(e.to_string()));
    }
    if let Some(password) = &credentials.password {
        return session
            .userauth_password(username, password)
            .map_err(|e| SshError::Auth(e.to_string()));
    }
    Err(SshError::Auth(
        "no password or key configured".to_string(),
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn make_target(address: Ipv4Addr) -> ShutdownTarget {
        ShutdownTarget {
            address,
            credentials: Credentials {
                username: Some("root".to_string()),
                password: Some("x".to_string()),
                key_path: None,
            },
        }
    }

    #[tokio::test]
    async fn test_attempt_fails_cleanly_against_refused_port() {
        // Reserve a port, then free it so the connect is refused.
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let strategy = SshShutdownStrategy::new(port, Duration::from_secs(2));
        let outcome = strategy.attempt(&make_target(Ipv4Addr::LOCALHOST)).await;

        assert!(
            matches!(outcome, AttemptOutcome::Failed(_)),
            "a refused connection must fail, not panic: {outcome:?}"
        );
    }

    #[tokio::test]
    async fn test_attempt_fails_against_non_ssh_server_without_raising() {
        // A listener that accepts and says nothing: the handshake cannot
        // complete, so the attempt ends in a bounded failure or timeout.
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let _ = listener.accept().await;
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let strategy = SshShutdownStrategy::new(port, Duration::from_secs(1));
        let outcome = strategy.attempt(&make_target(Ipv4Addr::LOCALHOST)).await;

        assert!(
            matches!(outcome, AttemptOutcome::Failed(_) | AttemptOutcome::TimedOut),
            "a mute peer must produce a bounded failure: {outcome:?}"
        );
        server.abort();
    }

    #[test]
    fn test_authenticate_without_secrets_is_an_auth_error() {
        let session = Session::new().unwrap();
        let result = authenticate(&session, "root", &Credentials::default());
        assert!(matches!(result, Err(SshError::Auth(_))));
    }
}
