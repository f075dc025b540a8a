//! RewriteInputUseCase: drives intercepted scancode bytes through the engine.
//!
//! This use case is the heart of the daemon. It owns the shared remapping
//! engine, attaches an interception point to the configured attach point, and
//! exposes the runtime controls — the CapsLock-direction toggle and the
//! traffic counters — that the admin channel reports.
//!
//! # Architecture
//!
//! The use case depends only on the [`InterceptPoint`] and
//! [`ScancodeRewriter`] traits plus domain types from `scanswap-core`. The
//! concrete tap (device-backed or mock) is injected at construction time,
//! making the whole pipeline unit-testable without hardware.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use scanswap_core::{RemapConfig, RemapDecision, SharedRemapper};
use tracing::{debug, info};

use crate::infrastructure::intercept::{InterceptError, InterceptPoint, ScancodeRewriter};

/// Counters describing the traffic a pipeline has carried.
///
/// Both values only grow, and `rewritten <= processed` always holds. The
/// counters are relaxed atomics: they feed the status report and nothing
/// synchronizes on them.
#[derive(Debug, Default)]
pub struct RewriteStats {
    processed: AtomicU64,
    rewritten: AtomicU64,
}

impl RewriteStats {
    /// Folds one engine decision into the counters.
    fn record(&self, decision: RemapDecision) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        if decision.is_substitution() {
            self.rewritten.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Total bytes that have passed through the pipeline.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Bytes that left the pipeline with a different value than they entered.
    pub fn rewritten(&self) -> u64 {
        self.rewritten.load(Ordering::Relaxed)
    }
}

/// Bridges the tap's rewriter seam to the shared engine.
///
/// An instance is handed to the tap on attach and runs on the tap's thread,
/// which is why it owns `Arc` clones rather than borrows.
struct RewriteHandler {
    remapper: Arc<SharedRemapper>,
    stats: Arc<RewriteStats>,
}

impl ScancodeRewriter for RewriteHandler {
    fn rewrite(&self, byte: &mut u8) {
        let decision = self.remapper.process(*byte);
        self.stats.record(decision);
        if let RemapDecision::Substitute(replacement) = decision {
            debug!("rewrote scancode {:#04x} -> {:#04x}", *byte, replacement);
            *byte = replacement;
        }
    }
}

/// The Rewrite Input use case.
///
/// Drives the attach/detach lifecycle of the interception point and keeps
/// the engine and counters alive for as long as the tap thread needs them.
pub struct RewriteInputUseCase {
    remapper: Arc<SharedRemapper>,
    stats: Arc<RewriteStats>,
    tap: Arc<dyn InterceptPoint>,
    attach_point: String,
    attached: AtomicBool,
}

impl RewriteInputUseCase {
    /// Creates a detached pipeline over the given interception point.
    pub fn new(
        tap: Arc<dyn InterceptPoint>,
        attach_point: impl Into<String>,
        config: RemapConfig,
    ) -> Self {
        Self {
            remapper: Arc::new(SharedRemapper::new(config)),
            stats: Arc::new(RewriteStats::default()),
            tap,
            attach_point: attach_point.into(),
            attached: AtomicBool::new(false),
        }
    }

    /// Attaches the pipeline to its attach point.
    ///
    /// On failure the pipeline is left detached and `start` may simply be
    /// called again — a refused attach is the one recoverable failure in
    /// the lifecycle.
    pub fn start(&self) -> Result<(), InterceptError> {
        if self.attached.swap(true, Ordering::Relaxed) {
            return Err(InterceptError::AlreadyAttached);
        }

        let handler = Arc::new(RewriteHandler {
            remapper: Arc::clone(&self.remapper),
            stats: Arc::clone(&self.stats),
        });

        if let Err(e) = self.tap.attach(&self.attach_point, handler) {
            self.attached.store(false, Ordering::Relaxed);
            return Err(e);
        }

        info!("rewrite pipeline attached to {}", self.attach_point);
        Ok(())
    }

    /// Detaches the pipeline. Safe to call repeatedly or before `start`.
    pub fn stop(&self) {
        if self.attached.swap(false, Ordering::Relaxed) {
            self.tap.detach();
            info!("rewrite pipeline detached");
        }
    }

    /// Whether the pipeline currently holds an attached tap.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Relaxed)
    }

    /// The attach point this pipeline targets.
    pub fn attach_point(&self) -> &str {
        &self.attach_point
    }

    /// Suppresses or restores the Ctrl-to-CapsLock direction at runtime.
    ///
    /// CapsLock-to-Ctrl keeps working either way; the flag only decides
    /// whether CapsLock is reachable from the physical Ctrl key.
    pub fn set_disable_caps(&self, disable: bool) {
        self.remapper.set_disable_caps(disable);
        info!("disable_caps set to {disable}");
    }

    /// Current state of the CapsLock-direction toggle.
    pub fn disable_caps(&self) -> bool {
        self.remapper.disable_caps()
    }

    /// Traffic counters for the status report.
    pub fn stats(&self) -> &RewriteStats {
        &self.stats
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
