//! Infrastructure layer for the daemon.
//!
//! Contains OS-facing adapters: the scancode interception backends, the
//! administrative control socket, and configuration storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `scanswap_core`, but MUST NOT be imported by the core engine.

#[cfg(unix)]
pub mod control;
pub mod intercept;
pub mod storage;
