//! Application layer use cases for the daemon.
//!
//! Use cases in this layer orchestrate the core engine behind trait seams and
//! contain no OS calls of their own: the interception point is injected as a
//! trait object, so everything here is testable against the in-memory mock.
//!
//! # Sub-modules
//!
//! - **`rewrite_input`** – Owns the shared remapping engine, attaches it to
//!   an interception point, and tracks lifecycle and counters.  This is the
//!   only use case the daemon has; it runs for the lifetime of the process.

pub mod rewrite_input;
