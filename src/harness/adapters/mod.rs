//! Adapter implementations for the harness ports.

pub mod local;
