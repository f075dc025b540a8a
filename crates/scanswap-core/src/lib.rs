//! # scanswap-core
//!
//! The scancode remapping engine for ScanSwap: a byte-at-a-time state machine
//! that swaps Caps Lock and Left Ctrl in a raw PS/2-style scancode stream.
//!
//! This crate is pure computation.  It has zero dependencies on OS APIs,
//! devices, or sockets — the host integration (attaching to a real scancode
//! source) lives in `scanswap-daemon`.
//!
//! # Architecture overview (for beginners)
//!
//! ScanSwap sits between the keyboard hardware and the rest of the input
//! stack.  Every key press and release reaches it as a single raw byte (see
//! [`scancode`] for the byte layout); ScanSwap inspects each byte, rewrites
//! the two bytes that belong to the Caps Lock / Left Ctrl pair, and forwards
//! everything else untouched.  Because the rewrite happens below keycode
//! translation, every consumer — console, X11, Wayland — sees the swapped
//! keys without any per-environment configuration.
//!
//! This crate defines:
//!
//! - **[`scancode`]** – What a scancode byte *is*: the status bit, the 7-bit
//!   key code, the `E0` extension prefix, and the two codes being swapped.
//!
//! - **[`remap`]** – What to *do* with each byte: the swap rule, the
//!   two-state sequence machine that keeps extended keys out of the swap,
//!   the runtime toggle, and the two engines ([`Remapper`] for a single
//!   stream, [`SharedRemapper`] for an engine shared across threads).

pub mod remap;
pub mod scancode;

// Re-export the engine types at the crate root so callers can write
// `scanswap_core::Remapper` instead of `scanswap_core::remap::Remapper`.
pub use remap::{
    RemapConfig, RemapDecision, RemapRule, Remapper, SequenceState, SharedRemapper,
};
