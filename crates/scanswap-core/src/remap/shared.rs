//! Lock-free remapping engine for callers that share one engine across threads.
//!
//! # Why a second engine? (for beginners)
//!
//! [`Remapper`](super::Remapper) takes `&mut self`, which is exactly right for
//! one stream owned by one thread.  An interception callback, however, usually
//! holds its engine behind an `Arc` — the callback thread processes bytes
//! while an administrative thread flips the toggle — and `Arc` only hands out
//! shared `&self` access.  `SharedRemapper` moves the two pieces of mutable
//! state into atomics so `process` can run on `&self`:
//!
//! - the **sequence state** lives in an `AtomicU8`, and
//! - the **toggle** lives in an `AtomicBool`.
//!
//! # Single-step state updates
//!
//! Reading the sequence state and then clearing it as two separate operations
//! would open a window: two threads could both observe "awaiting companion"
//! and both treat their byte as the companion.  `swap` reads and clears in
//! one indivisible step, so exactly one byte is ever classified as the
//! companion of a given prefix.
//!
//! # Atomic ordering
//!
//! `Ordering::Relaxed` is sufficient throughout.  The atomics carry no
//! cross-thread happens-before obligations — each one is an independent cell
//! whose latest value is all any reader needs.  A toggle flip may be observed
//! one byte late on another thread; that is acceptable by design, the same
//! way a toggle flipped between two key presses takes effect on the next
//! press.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use super::{classify, RemapConfig, RemapDecision, SequenceState};
use crate::scancode;

const IDLE: u8 = SequenceState::Idle as u8;
const AWAITING: u8 = SequenceState::AwaitingExtendedCompanion as u8;

/// A thread-safe remapping engine with the same per-byte semantics as
/// [`Remapper`](super::Remapper).
///
/// `process` takes `&self`, so the engine can sit behind an `Arc` and be
/// driven from an interception callback while another thread reads or writes
/// the toggle.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use scanswap_core::{RemapConfig, RemapDecision, SharedRemapper};
///
/// let remapper = Arc::new(SharedRemapper::new(RemapConfig::default()));
///
/// assert_eq!(remapper.process(0x3A), RemapDecision::Substitute(0x1D));
///
/// remapper.set_disable_caps(true);
/// assert_eq!(remapper.process(0x1D), RemapDecision::Pass(0x1D));
/// ```
pub struct SharedRemapper {
    /// Whether `E0` prefixes arm the companion state.  Fixed at construction;
    /// only the toggle is runtime-mutable.
    track_extended_sequences: bool,
    /// Current [`SequenceState`], stored as its `u8` discriminant.
    state: AtomicU8,
    /// The Ctrl → Caps Lock suppression toggle.
    disable_caps: AtomicBool,
}

impl SharedRemapper {
    /// Creates an engine with the given configuration, starting in
    /// [`SequenceState::Idle`].
    pub fn new(config: RemapConfig) -> Self {
        Self {
            track_extended_sequences: config.track_extended_sequences,
            state: AtomicU8::new(IDLE),
            disable_caps: AtomicBool::new(config.disable_caps),
        }
    }

    /// Processes one scancode byte and returns the forwarding decision.
    ///
    /// Lock-free and infallible; never allocates.
    pub fn process(&self, byte: u8) -> RemapDecision {
        if self.track_extended_sequences {
            if byte == scancode::EXTENDED_PREFIX {
                self.state.store(AWAITING, Ordering::Relaxed);
                return RemapDecision::Pass(byte);
            }
            // Read-and-clear in a single step.  Whatever the state was, the
            // next byte starts from Idle; if it was Awaiting, this byte is
            // the companion and passes through.
            if self.state.swap(IDLE, Ordering::Relaxed) == AWAITING {
                return RemapDecision::Pass(byte);
            }
        }

        classify(
            byte,
            RemapConfig {
                track_extended_sequences: self.track_extended_sequences,
                disable_caps: self.disable_caps.load(Ordering::Relaxed),
            },
        )
    }

    /// Sets the toggle that suppresses the Ctrl → Caps Lock direction.
    ///
    /// Takes effect for every byte processed after the store becomes visible;
    /// a byte already in flight on another thread may still see the old value.
    pub fn set_disable_caps(&self, disable: bool) {
        self.disable_caps.store(disable, Ordering::Relaxed);
    }

    /// Returns the current value of the toggle.
    pub fn disable_caps(&self) -> bool {
        self.disable_caps.load(Ordering::Relaxed)
    }

    /// Returns the current sequence state.
    ///
    /// Diagnostic only: by the time the caller inspects the result another
    /// thread may already have advanced the stream.
    pub fn state(&self) -> SequenceState {
        match self.state.load(Ordering::Relaxed) {
            AWAITING => SequenceState::AwaitingExtendedCompanion,
            _ => SequenceState::Idle,
        }
    }
}

impl Default for SharedRemapper {
    fn default() -> Self {
        Self::new(RemapConfig::default())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
