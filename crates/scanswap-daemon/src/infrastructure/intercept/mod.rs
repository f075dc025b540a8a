//! Scancode interception infrastructure.
//!
//! An *interception point* is whatever the host offers for getting between
//! the keyboard and the rest of the input stack: on Linux this is a raw
//! scancode byte device (a `serio_raw` node); a kernel-side host would offer
//! a probe on the byte-receive function instead.  The attach point is named
//! by an opaque string so the caller does not care which kind it is.
//!
//! Once attached, the interception point invokes the registered
//! [`ScancodeRewriter`] with a mutable view of each pending byte *before*
//! that byte is delivered onward.  The rewriter may overwrite the byte in
//! place; leaving it untouched forwards the original.
//!
//! # Testability
//!
//! The [`InterceptPoint`] trait allows unit tests to drive the rewriting
//! pipeline byte by byte through [`mock::MockInterceptPoint`] without any
//! device access.

use std::sync::Arc;

pub mod mock;

#[cfg(target_os = "linux")]
pub mod device;

/// Rewrites one pending scancode byte in place.
///
/// Called synchronously from the interception context, once per byte, in
/// hardware arrival order.  Implementations must not block and must not fail;
/// a byte the rewriter does not recognise is simply left as-is.
pub trait ScancodeRewriter: Send + Sync {
    /// Inspects `byte` and overwrites it if it should be substituted.
    fn rewrite(&self, byte: &mut u8);
}

/// Error type for interception operations.
///
/// Attach failure is the one recoverable error in the daemon's core flow:
/// it is fatal to startup but must leave no half-installed state behind.
#[derive(Debug, thiserror::Error)]
pub enum InterceptError {
    /// The attach point could not be opened or registered.
    #[error("failed to attach to {attach_point}: {source}")]
    Attach {
        attach_point: String,
        #[source]
        source: std::io::Error,
    },
    /// The forwarding sink could not be opened.
    #[error("failed to open sink {path}: {source}")]
    Sink {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// `attach` was called while a rewriter is already registered.
    #[error("interception is already attached")]
    AlreadyAttached,
    /// No interception backend exists for this platform.
    #[error("platform not supported: {0}")]
    Unsupported(String),
}

/// Trait abstracting the host's per-byte interception capability.
///
/// The production implementation taps a raw scancode device; tests use
/// [`mock::MockInterceptPoint`].
pub trait InterceptPoint: Send + Sync {
    /// Registers `rewriter` at `attach_point` and starts delivering bytes.
    ///
    /// # Errors
    ///
    /// Returns [`InterceptError::Attach`] (or [`InterceptError::Sink`]) if
    /// the underlying resources cannot be opened, and
    /// [`InterceptError::AlreadyAttached`] on a second attach without an
    /// intervening [`detach`](InterceptPoint::detach).
    fn attach(
        &self,
        attach_point: &str,
        rewriter: Arc<dyn ScancodeRewriter>,
    ) -> Result<(), InterceptError>;

    /// Deregisters the rewriter and releases all resources.
    ///
    /// Safe to call at any time, including before a successful `attach` or
    /// repeatedly; extra calls are no-ops.
    fn detach(&self);
}
