//! scanswapd entry point.
//!
//! Wires the configuration, the platform interception backend, and the
//! rewrite pipeline together, then runs until a shutdown signal arrives.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()           -- /etc/scanswapd/config.toml or $SCANSWAPD_CONFIG
//!  └─ build_intercept_point() -- serio_raw device tap on Linux
//!  └─ RewriteInputUseCase     -- attaches the tap, owns the engine
//!  └─ run_control_socket      -- Unix-socket admin channel (Tokio task)
//! ```

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use scanswap_daemon::application::rewrite_input::RewriteInputUseCase;
use scanswap_daemon::infrastructure::intercept::InterceptPoint;
use scanswap_daemon::infrastructure::storage::config::{self, AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Config comes first: the log level lives in it.
    let config = config::load_config().context("loading configuration")?;

    // Initialise structured logging.  `RUST_LOG` overrides the config value.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.daemon.log_level)),
        )
        .init();

    info!("scanswapd starting");

    let tap = build_intercept_point(&config)?;
    let use_case = Arc::new(RewriteInputUseCase::new(
        tap,
        config.tap.attach_point.clone(),
        config.remap,
    ));

    // The tap is the daemon's whole purpose; failing to attach is fatal.
    use_case
        .start()
        .with_context(|| format!("attaching to {}", config.tap.attach_point))?;

    // Shutdown flag shared across all background services.
    let running = Arc::new(AtomicBool::new(true));

    // ── Control socket ────────────────────────────────────────────────────────
    #[cfg(unix)]
    {
        let socket_path = config.daemon.control_socket.clone();
        let uc = Arc::clone(&use_case);
        let running_clone = Arc::clone(&running);
        tokio::spawn(async move {
            // Remapping works without the admin channel, so a failed bind is
            // logged rather than treated as fatal.
            if let Err(e) = scanswap_daemon::infrastructure::control::run_control_socket(
                socket_path,
                uc,
                running_clone,
            )
            .await
            {
                error!("control socket unavailable: {e}");
            }
        });
    }

    // ── Ctrl-C / SIGTERM handler ──────────────────────────────────────────────
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    info!("scanswapd ready.  Press Ctrl-C to exit.");

    loop {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if !running.load(Ordering::Relaxed) {
            break;
        }
    }

    use_case.stop();
    info!("scanswapd stopped");
    Ok(())
}

/// Picks the interception backend for this platform.
#[cfg(target_os = "linux")]
fn build_intercept_point(config: &AppConfig) -> anyhow::Result<Arc<dyn InterceptPoint>> {
    use scanswap_daemon::infrastructure::intercept::device::DeviceInterceptPoint;

    Ok(Arc::new(DeviceInterceptPoint::new(config.tap.sink.clone())))
}

#[cfg(not(target_os = "linux"))]
fn build_intercept_point(_config: &AppConfig) -> anyhow::Result<Arc<dyn InterceptPoint>> {
    use scanswap_daemon::infrastructure::intercept::InterceptError;

    Err(InterceptError::Unsupported(std::env::consts::OS.to_string()).into())
}
