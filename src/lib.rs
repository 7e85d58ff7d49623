//! Galley harness: embedded configuration server lifecycle for integration
//! tests.
//!
//! The harness owns one configuration server instance at a time, stages its
//! inputs in a private temporary workspace, and lets tests block until the
//! server has distributed an exact sequence of snapshots for a collection.
//!
//! # Architecture
//!
//! The crate follows hexagonal architecture principles:
//!
//! - **Domain**: addresses, collections, snapshot content and retry policy
//! - **Ports**: the server factory and snapshot client contracts
//! - **Adapters**: an in-process local server with a TCP client
//! - **Services**: the lifecycle controller and snapshot waiter
//!
//! # Modules
//!
//! - [`workspace`]: temporary directory tree staged for the server
//! - [`harness`]: lifecycle control and snapshot synchronisation
//! - [`config`]: timeouts and placement, overridable from the environment
//! - [`telemetry`]: log subscriber setup for test binaries

pub mod config;
pub mod harness;
pub mod telemetry;
pub mod workspace;

use harness::adapters::local::{LocalConfigServerFactory, TcpSnapshotConnector};
use harness::services::ServerLifecycleController;
use mockable::DefaultClock;

/// Lifecycle controller backed by the in-process local server.
pub type LocalGalley =
    ServerLifecycleController<LocalConfigServerFactory, TcpSnapshotConnector, DefaultClock>;
