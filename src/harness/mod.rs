//! Embedded configuration server harness.
//!
//! This module follows hexagonal architecture:
//!
//! - [`domain`]: addresses, arguments, collections, snapshots and backoff
//! - [`ports`]: server and distribution client contracts
//! - [`adapters`]: the in-process local server and its TCP client
//! - [`services`]: the lifecycle controller and snapshot waits

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
