//! Raw scancode device tap for Linux.
//!
//! Attaches to a byte-granular scancode device — canonically a `serio_raw`
//! node such as `/dev/serio_raw0`, bound to the AT keyboard port — and runs
//! a dedicated reader thread that pulls one byte at a time, hands it to the
//! registered rewriter, and forwards the (possibly rewritten) byte to the
//! configured sink.
//!
//! # Why `serio_raw`? (for beginners)
//!
//! The kernel's `serio_raw` driver detaches a serio port (the i8042 keyboard
//! controller, typically) from the regular `atkbd` driver and exposes the raw
//! byte stream as a character device.  Reading it yields exactly the bytes
//! the keyboard sent — status bit, extension prefixes and all — before any
//! keycode translation has happened, which is the layer this daemon operates
//! on.  Writing the stream back out (to a user-input bridge or another
//! consumer) is the sink's job; the tap does not interpret bytes beyond
//! handing each one to the rewriter.
//!
//! # Read loop
//!
//! The device is opened non-blocking and polled on a bounded interval: the
//! `read` call returns `WouldBlock` when no byte is pending, the loop sleeps
//! a few milliseconds and re-checks the shutdown flag, so `detach` is never
//! stuck behind a blocking read.  End-of-file ends the tap; a regular file
//! as the attach point therefore replays its contents and stops, which is
//! how the integration tests drive this module without hardware.

#![cfg(target_os = "linux")]

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info};

use super::{InterceptError, InterceptPoint, ScancodeRewriter};

/// How long the reader thread sleeps when the device has no byte pending.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Interception point backed by a raw scancode byte device.
pub struct DeviceInterceptPoint {
    /// Where forwarded bytes are written.
    sink_path: PathBuf,
    /// Cleared by `detach` to stop the reader thread.
    running: Arc<AtomicBool>,
    /// Handle of the reader thread while attached.
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceInterceptPoint {
    /// Creates an unattached tap that will forward bytes to `sink_path`.
    pub fn new(sink_path: impl Into<PathBuf>) -> Self {
        Self {
            sink_path: sink_path.into(),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    /// Opens the scancode source without blocking on a quiet device.
    fn open_source(attach_point: &str) -> std::io::Result<File> {
        OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(attach_point)
    }
}

impl InterceptPoint for DeviceInterceptPoint {
    fn attach(
        &self,
        attach_point: &str,
        rewriter: Arc<dyn ScancodeRewriter>,
    ) -> Result<(), InterceptError> {
        let mut worker = self.worker.lock().expect("lock poisoned");
        if worker.is_some() {
            return Err(InterceptError::AlreadyAttached);
        }

        let source = Self::open_source(attach_point).map_err(|source| InterceptError::Attach {
            attach_point: attach_point.to_string(),
            source,
        })?;

        let sink = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.sink_path)
            .map_err(|source| InterceptError::Sink {
                path: self.sink_path.display().to_string(),
                source,
            })?;

        self.running.store(true, Ordering::Relaxed);

        let running = Arc::clone(&self.running);
        let handle = std::thread::Builder::new()
            .name("scanswap-tap".to_string())
            .spawn(move || {
                tap_loop(source, sink, rewriter, running);
            })
            .map_err(|source| InterceptError::Attach {
                attach_point: attach_point.to_string(),
                source,
            })?;

        *worker = Some(handle);
        info!("tap attached to {attach_point}");
        Ok(())
    }

    fn detach(&self) {
        self.running.store(false, Ordering::Relaxed);
        let handle = self.worker.lock().expect("lock poisoned").take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("tap thread panicked during detach");
            }
            info!("tap detached");
        }
    }
}

impl Drop for DeviceInterceptPoint {
    fn drop(&mut self) {
        // A dropped tap must not leave its reader thread running.
        self.detach();
    }
}

/// The forwarding loop executed on the tap thread.
fn tap_loop(
    mut source: File,
    mut sink: File,
    rewriter: Arc<dyn ScancodeRewriter>,
    running: Arc<AtomicBool>,
) {
    let mut buf = [0u8; 1];

    while running.load(Ordering::Relaxed) {
        match source.read(&mut buf) {
            Ok(0) => {
                // End of stream; with a real device this means the port went
                // away, with a replay file it means the recording is done.
                debug!("tap source reached end of stream");
                break;
            }
            Ok(_) => {
                rewriter.rewrite(&mut buf[0]);
                if let Err(e) = sink.write_all(&buf) {
                    error!("tap sink write failed: {e}");
                    break;
                }
            }
            Err(e) if is_retryable_error(&e) => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                error!("tap read error: {e}");
                break;
            }
        }
    }

    if let Err(e) = sink.flush() {
        error!("tap sink flush failed: {e}");
    }
    debug!("tap loop exited");
}

/// Returns `true` for OS errors that mean "no byte yet, try again".
fn is_retryable_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::Interrupted
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use scanswap_core::{RemapConfig, RemapDecision, SharedRemapper};

    /// Applies the real remapping engine, like the daemon's handler does.
    struct EngineRewriter(SharedRemapper);

    impl ScancodeRewriter for EngineRewriter {
        fn rewrite(&self, byte: &mut u8) {
            if let RemapDecision::Substitute(b) = self.0.process(*byte) {
                *byte = b;
            }
        }
    }

    /// Leaves every byte alone.
    struct NullRewriter;

    impl ScancodeRewriter for NullRewriter {
        fn rewrite(&self, _byte: &mut u8) {}
    }

    fn temp_path(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock before epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("scanswap_tap_{}_{}_{}", std::process::id(), tag, nanos))
    }

    /// Polls until `path` holds at least `len` bytes or the timeout elapses.
    fn wait_for_len(path: &PathBuf, len: u64) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if std::fs::metadata(path).map(|m| m.len()).unwrap_or(0) >= len {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("sink never reached {len} bytes");
    }

    #[test]
    fn test_attach_fails_for_missing_attach_point() {
        // Arrange
        let sink = temp_path("missing_sink");
        let tap = DeviceInterceptPoint::new(&sink);

        // Act
        let result = tap.attach(
            "/nonexistent/scanswap/device",
            Arc::new(NullRewriter),
        );

        // Assert
        match result {
            Err(InterceptError::Attach { attach_point, source }) => {
                assert_eq!(attach_point, "/nonexistent/scanswap/device");
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected Attach error, got {other:?}"),
        }
    }

    #[test]
    fn test_replay_file_is_rewritten_into_the_sink() {
        // Arrange – a recorded session: Caps tap, letter A tap, RightCtrl tap
        let source = temp_path("replay_src");
        let sink = temp_path("replay_sink");
        let recording = [0x3Au8, 0xBA, 0x1E, 0x9E, 0xE0, 0x1D, 0xE0, 0x9D];
        std::fs::write(&source, recording).expect("write recording");

        let tap = DeviceInterceptPoint::new(&sink);
        let rewriter = Arc::new(EngineRewriter(SharedRemapper::new(RemapConfig::default())));

        // Act
        tap.attach(source.to_str().expect("utf-8 path"), rewriter)
            .expect("attach should succeed");
        wait_for_len(&sink, recording.len() as u64);
        tap.detach();

        // Assert – Caps tap swapped, letter and extended Ctrl untouched
        let forwarded = std::fs::read(&sink).expect("read sink");
        assert_eq!(forwarded, vec![0x1D, 0x9D, 0x1E, 0x9E, 0xE0, 0x1D, 0xE0, 0x9D]);

        std::fs::remove_file(&source).ok();
        std::fs::remove_file(&sink).ok();
    }

    #[test]
    fn test_double_attach_is_rejected() {
        // Arrange
        let source = temp_path("double_src");
        let sink = temp_path("double_sink");
        std::fs::write(&source, [0u8; 0]).expect("write empty recording");

        let tap = DeviceInterceptPoint::new(&sink);
        tap.attach(source.to_str().expect("utf-8 path"), Arc::new(NullRewriter))
            .expect("first attach");

        // Act
        let second = tap.attach(source.to_str().expect("utf-8 path"), Arc::new(NullRewriter));

        // Assert
        assert!(matches!(second, Err(InterceptError::AlreadyAttached)));

        tap.detach();
        std::fs::remove_file(&source).ok();
        std::fs::remove_file(&sink).ok();
    }

    #[test]
    fn test_detach_without_attach_is_a_no_op() {
        // Arrange
        let tap = DeviceInterceptPoint::new(temp_path("noop_sink"));

        // Act / Assert – must not panic or block
        tap.detach();
        tap.detach();
    }

    #[test]
    fn test_detach_stops_the_tap_thread_and_can_reattach() {
        // Arrange
        let source = temp_path("restart_src");
        let sink = temp_path("restart_sink");
        let bytes = [0x10u8, 0x90];
        std::fs::write(&source, bytes).expect("write recording");

        let tap = DeviceInterceptPoint::new(&sink);
        tap.attach(source.to_str().expect("utf-8 path"), Arc::new(NullRewriter))
            .expect("first attach");
        wait_for_len(&sink, bytes.len() as u64);
        tap.detach();

        // Act – a second session through the same tap instance
        let result = tap.attach(source.to_str().expect("utf-8 path"), Arc::new(NullRewriter));

        // Assert
        assert!(result.is_ok(), "tap must be reusable after detach");
        wait_for_len(&sink, bytes.len() as u64);
        tap.detach();

        std::fs::remove_file(&source).ok();
        std::fs::remove_file(&sink).ok();
    }
}
