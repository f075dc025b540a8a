//! Control socket: a line-oriented admin channel over a Unix domain socket.
//!
//! This module is responsible for:
//!
//! 1. Binding a Unix domain socket at the configured path (removing a stale
//!    socket file left behind by an earlier instance first).
//! 2. Accepting connections from local admin tools (`socat`, `nc -U`, scripts).
//! 3. Running each connection as its own Tokio task so one slow client never
//!    blocks another.
//! 4. Executing one command per line and answering with one line per command.
//! 5. Shutting down, and unlinking the socket file, when the `running` flag
//!    is cleared.
//!
//! # Protocol
//!
//! Commands and responses are plain UTF-8 lines:
//!
//! ```text
//! status            -> ok attached=true attach_point=/dev/serio_raw0 disable_caps=false processed=1024 rewritten=12
//! disable-caps on   -> ok
//! disable-caps off  -> ok
//! anything else     -> err unknown command: <line>
//! ```
//!
//! The channel is deliberately tiny: it exposes the runtime toggle and the
//! counters, nothing more. Configuration changes belong in the config file.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::application::rewrite_input::RewriteInputUseCase;

/// Error type for the control socket.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("failed to bind control socket at {path}: {source}")]
    Bind {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Runs the control socket accept loop until `running` is set to `false`.
///
/// Binds a Unix domain socket at `socket_path` and accepts admin connections
/// in a loop.  Each accepted connection is handed off to a dedicated Tokio
/// task.  The socket file is unlinked again when the loop exits.
///
/// # Errors
///
/// Returns [`ControlError::Bind`] if the socket cannot be bound (e.g., the
/// parent directory does not exist or the process lacks permission).  The
/// daemon treats this as non-fatal: remapping works without the admin
/// channel.
pub async fn run_control_socket(
    socket_path: PathBuf,
    use_case: Arc<RewriteInputUseCase>,
    running: Arc<AtomicBool>,
) -> Result<(), ControlError> {
    // A previous instance that crashed leaves its socket file behind, and
    // binding over it fails with AddrInUse. Unlink it first; if the path is
    // genuinely still served, the bind below reports that.
    if socket_path.exists() {
        debug!("removing stale control socket at {}", socket_path.display());
        if let Err(e) = std::fs::remove_file(&socket_path) {
            debug!("failed to remove stale control socket: {e}");
        }
    }

    let listener = UnixListener::bind(&socket_path).map_err(|source| ControlError::Bind {
        path: socket_path.display().to_string(),
        source,
    })?;

    info!("control socket listening on {}", socket_path.display());

    loop {
        // Check the shutdown flag before each accept attempt.
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping control socket");
            break;
        }

        // Use a short timeout on `accept()` so the loop can periodically check
        // the `running` flag even when no admin tool is connecting.
        let accept_result = timeout(Duration::from_millis(200), listener.accept()).await;

        match accept_result {
            Ok(Ok((stream, _addr))) => {
                debug!("admin connection accepted");
                let uc = Arc::clone(&use_case);
                tokio::spawn(async move {
                    handle_admin_session(stream, uc).await;
                });
            }
            Ok(Err(e)) => {
                // Transient accept error; keep serving.
                error!("control socket accept error: {e}");
            }
            Err(_) => {
                // Timeout — no connection in the last 200 ms.
                // Loop back to check the `running` flag.
            }
        }
    }

    if let Err(e) = std::fs::remove_file(&socket_path) {
        debug!("failed to remove control socket on shutdown: {e}");
    }

    Ok(())
}

/// Executes one admin command and returns the response line (no newline).
///
/// Kept free of I/O so command handling can be unit-tested directly.
pub fn execute_command(line: &str, use_case: &RewriteInputUseCase) -> String {
    match line.trim() {
        "status" => {
            let stats = use_case.stats();
            format!(
                "ok attached={} attach_point={} disable_caps={} processed={} rewritten={}",
                use_case.is_attached(),
                use_case.attach_point(),
                use_case.disable_caps(),
                stats.processed(),
                stats.rewritten(),
            )
        }
        "disable-caps on" => {
            use_case.set_disable_caps(true);
            "ok".to_string()
        }
        "disable-caps off" => {
            use_case.set_disable_caps(false);
            "ok".to_string()
        }
        other => format!("err unknown command: {other}"),
    }
}

// ── Session handling ──────────────────────────────────────────────────────────

/// Serves one admin connection: one command per line, one response per line.
async fn handle_admin_session(stream: UnixStream, use_case: Arc<RewriteInputUseCase>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let mut response = execute_command(&line, &use_case);
                response.push('\n');
                if let Err(e) = write_half.write_all(response.as_bytes()).await {
                    debug!("admin session write failed: {e}");
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!("admin session read failed: {e}");
                break;
            }
        }
    }

    debug!("admin session closed");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::intercept::mock::MockInterceptPoint;
    use crate::infrastructure::intercept::InterceptPoint;
    use scanswap_core::RemapConfig;

    fn make_use_case() -> (Arc<MockInterceptPoint>, RewriteInputUseCase) {
        let tap = Arc::new(MockInterceptPoint::new());
        let uc = RewriteInputUseCase::new(
            Arc::clone(&tap) as Arc<dyn InterceptPoint>,
            "/dev/serio_raw0",
            RemapConfig::default(),
        );
        (tap, uc)
    }

    #[test]
    fn test_status_reports_a_detached_pipeline() {
        // Arrange
        let (_tap, uc) = make_use_case();

        // Act
        let response = execute_command("status", &uc);

        // Assert
        assert_eq!(
            response,
            "ok attached=false attach_point=/dev/serio_raw0 disable_caps=false processed=0 rewritten=0"
        );
    }

    #[test]
    fn test_status_reflects_traffic_counters() {
        // Arrange
        let (tap, uc) = make_use_case();
        uc.start().expect("attach should succeed");
        tap.feed_stream(&[0x3A, 0xBA, 0x10]);

        // Act
        let response = execute_command("status", &uc);

        // Assert
        assert_eq!(
            response,
            "ok attached=true attach_point=/dev/serio_raw0 disable_caps=false processed=3 rewritten=2"
        );
    }

    #[test]
    fn test_disable_caps_round_trip() {
        // Arrange
        let (_tap, uc) = make_use_case();

        // Act / Assert
        assert_eq!(execute_command("disable-caps on", &uc), "ok");
        assert!(uc.disable_caps());
        assert_eq!(execute_command("disable-caps off", &uc), "ok");
        assert!(!uc.disable_caps());
    }

    #[test]
    fn test_commands_tolerate_surrounding_whitespace() {
        // Arrange
        let (_tap, uc) = make_use_case();

        // Act
        let response = execute_command("  disable-caps on \n", &uc);

        // Assert
        assert_eq!(response, "ok");
        assert!(uc.disable_caps());
    }

    #[test]
    fn test_unknown_command_is_echoed_back() {
        // Arrange
        let (_tap, uc) = make_use_case();

        // Act
        let response = execute_command("reboot", &uc);

        // Assert
        assert_eq!(response, "err unknown command: reboot");
    }
}
