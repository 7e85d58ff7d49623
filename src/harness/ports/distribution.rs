//! Distribution port: fetching snapshot state from a running server.

use crate::harness::domain::{CollectionName, ServerAddress, SnapshotContent};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Result type for distribution client operations.
pub type DistributionResult<T> = Result<T, DistributionError>;

/// Opens clients against a server's distribution endpoint.
#[async_trait]
pub trait SnapshotConnector: Send + Sync {
    /// Client type produced by this connector.
    type Client: SnapshotClient;

    /// Creates a client bound to `address`.
    async fn connect(&self, address: &ServerAddress) -> DistributionResult<Self::Client>;
}

/// Client of one server's distribution endpoint.
///
/// Implementations must allow concurrent calls from multiple callers.
#[async_trait]
pub trait SnapshotClient: Send + Sync + 'static {
    /// Blocks until the server reports healthy startup or `timeout` elapses.
    async fn wait_for_startup_healthy(&self, timeout: Duration) -> DistributionResult<()>;

    /// Returns the ordered snapshots distributed so far for `collection`.
    async fn fetch_snapshots(
        &self,
        collection: &CollectionName,
    ) -> DistributionResult<Vec<SnapshotContent>>;

    /// Releases connection resources. Repeated calls succeed.
    async fn close(&self) -> DistributionResult<()>;
}

/// Errors returned by distribution client adapters.
#[derive(Debug, Clone, Error)]
pub enum DistributionError {
    /// The server did not report healthy startup in time.
    #[error("server at {address} did not become healthy within {timeout:?}")]
    StartupTimeout {
        /// Server address.
        address: ServerAddress,
        /// Health-check budget.
        timeout: Duration,
    },

    /// The client was closed.
    #[error("snapshot client is closed")]
    Closed,

    /// The transport failed.
    #[error("distribution transport error: {0}")]
    Io(Arc<std::io::Error>),

    /// The server sent a response the client cannot interpret.
    #[error("distribution protocol error: {0}")]
    Protocol(String),

    /// The server rejected the request.
    #[error("server rejected request: {0}")]
    Remote(String),
}

impl From<std::io::Error> for DistributionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}
