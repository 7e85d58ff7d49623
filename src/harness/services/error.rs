//! Service-level errors for the harness lifecycle and snapshot waits.

use crate::harness::domain::{CollectionName, HarnessDomainError, ServerAddress, SnapshotContent};
use crate::harness::ports::{DistributionError, ServerError};
use crate::workspace::WorkspaceError;
use std::time::Duration;
use thiserror::Error;

/// Result type for harness service operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors returned by the harness services.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Domain validation failed.
    #[error(transparent)]
    Domain(#[from] HarnessDomainError),

    /// A workspace file-system operation failed.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// The workspace has not been initialised; call `reset` first.
    #[error("workspace is not initialised")]
    NotInitialized,

    /// No server instance is running.
    #[error("config server is not running")]
    NotRunning,

    /// The server factory failed to create an instance.
    #[error("failed to start config server: {0}")]
    Start(#[source] ServerError),

    /// A client could not be connected to the new instance.
    #[error("failed to connect to config server: {0}")]
    Connect(#[source] DistributionError),

    /// The server never reported healthy startup within the budget.
    #[error("config server at {address} did not become healthy within {timeout:?}: {source}")]
    StartupTimeout {
        /// Address of the instance that was torn down.
        address: ServerAddress,
        /// Startup budget.
        timeout: Duration,
        /// Final health-check failure.
        #[source]
        source: DistributionError,
    },

    /// The expected snapshot sequence was not observed within the budget.
    #[error(
        "timed out after {timeout:?} waiting for collection {collection}: expected {}, last observed {}",
        render_snapshots(.expected),
        render_observed(.last_observed.as_deref(), .last_error.as_deref())
    )]
    SnapshotTimeout {
        /// Collection being awaited.
        collection: CollectionName,
        /// Snapshot wait budget.
        timeout: Duration,
        /// Expected snapshot sequence.
        expected: Vec<SnapshotContent>,
        /// Distinct snapshots seen on the last successful poll.
        last_observed: Option<Vec<SnapshotContent>>,
        /// Most recent poll failure, if any.
        last_error: Option<Box<DistributionError>>,
    },

    /// Shutting down the client or the server failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Failures collected while tearing down a server instance.
///
/// Cleanup continues past these; they are reported after every step has been
/// attempted.
#[derive(Debug, Clone, Error)]
pub enum ShutdownError {
    /// Closing the distribution client failed.
    #[error("failed to close snapshot client: {0}")]
    Client(#[source] DistributionError),

    /// Stopping the server, or its serving loop, failed.
    #[error("failed to stop config server: {0}")]
    Server(#[source] ServerError),

    /// The serving task panicked or was cancelled.
    #[error("config server task did not exit cleanly: {0}")]
    Join(String),

    /// The serving loop did not exit in time and was aborted.
    #[error("config server did not stop within {0:?}; serving task aborted")]
    Timeout(Duration),
}

fn render_snapshots(snapshots: &[SnapshotContent]) -> String {
    let rendered: Vec<String> = snapshots.iter().map(ToString::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

fn render_observed(
    observed: Option<&[SnapshotContent]>,
    last_error: Option<&DistributionError>,
) -> String {
    match (observed, last_error) {
        (Some(snapshots), None) => render_snapshots(snapshots),
        (Some(snapshots), Some(err)) => {
            format!("{} (last poll failed: {err})", render_snapshots(snapshots))
        }
        (None, Some(err)) => format!("nothing (last poll failed: {err})"),
        (None, None) => "nothing".to_owned(),
    }
}
