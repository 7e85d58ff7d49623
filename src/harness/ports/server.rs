//! Server port: the embedded configuration server as a start/serve/stop capability.

use crate::harness::domain::{ServerAddress, ServerArgs};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Creates server instances from startup arguments.
#[async_trait]
pub trait ConfigServerFactory: Send + Sync {
    /// Server instance type produced by this factory.
    type Server: ConfigServer;

    /// Creates a server bound to its address.
    ///
    /// The serving loop is not started; callers drive it through
    /// [`ConfigServer::serve`].
    async fn start(&self, args: &ServerArgs) -> ServerResult<Arc<Self::Server>>;
}

/// A created server instance.
#[async_trait]
pub trait ConfigServer: Send + Sync + 'static {
    /// Returns the bound distribution address.
    fn address(&self) -> ServerAddress;

    /// Runs the serving loop until [`ConfigServer::stop`] is signalled.
    ///
    /// Returns only once the loop and every task it spawned have exited.
    async fn serve(self: Arc<Self>) -> ServerResult<()>;

    /// Signals the serving loop to exit.
    ///
    /// Must succeed on an instance whose loop never started, and on repeated
    /// calls.
    async fn stop(&self) -> ServerResult<()>;
}

/// Errors returned by server adapters.
#[derive(Debug, Clone, Error)]
pub enum ServerError {
    /// The distribution endpoint could not be bound.
    #[error("failed to bind {address}: {source}")]
    Bind {
        /// Requested bind address.
        address: ServerAddress,
        /// Underlying I/O failure.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// The mesh config could not be read or parsed.
    #[error("invalid mesh config {path}: {reason}")]
    MeshConfig {
        /// Mesh config file path.
        path: Utf8PathBuf,
        /// Failure description.
        reason: String,
    },

    /// The adapter cannot honour the requested arguments.
    #[error("unsupported server arguments: {0}")]
    Unsupported(String),

    /// The serving loop was started more than once.
    #[error("server at {0} is already serving")]
    AlreadyServing(ServerAddress),
}
