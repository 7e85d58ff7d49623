//! In-process configuration server and its TCP distribution client.
//!
//! The server treats every YAML document under the config directory as a
//! `{collection, name, spec}` resource, rescans the directory on an interval
//! and keeps an ordered history of distinct snapshots per collection. The
//! client speaks newline-delimited JSON to it over one persistent
//! connection.

mod client;
mod protocol;
mod server;
mod source;
mod state;

pub use client::{TcpSnapshotClient, TcpSnapshotConnector};
pub use server::{LocalConfigServer, LocalConfigServerFactory};
