//! Persistence: configuration file handling.

pub mod config;
