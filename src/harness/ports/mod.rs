//! Port contracts for the wrapped server and its distribution client.

mod distribution;
mod server;

pub use distribution::{
    DistributionError, DistributionResult, SnapshotClient, SnapshotConnector,
};
pub use server::{ConfigServer, ConfigServerFactory, ServerError, ServerResult};
