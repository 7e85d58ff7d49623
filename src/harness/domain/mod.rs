//! Domain model for the embedded configuration server harness.
//!
//! Values here describe what the harness starts (server arguments and
//! addresses), what it observes (collections and snapshot content), and how
//! it polls (retry policy and backoff). No I/O happens in this module.

mod address;
mod args;
mod backoff;
mod collection;
mod error;
mod ids;
mod snapshot;
mod state;

pub use address::ServerAddress;
pub use args::ServerArgs;
pub use backoff::{Backoff, RetryPolicy};
pub use collection::{CollectionName, MESH_CONFIG_COLLECTION, MESH_CONFIG_RESOURCE};
pub use error::HarnessDomainError;
pub use ids::InstanceId;
pub use snapshot::{SnapshotContent, distinct_snapshots};
pub use state::LifecycleState;
