//! Error types for harness domain validation and parsing.

use thiserror::Error;

/// Errors returned while constructing harness domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HarnessDomainError {
    /// The collection name is empty after trimming.
    #[error("collection name must not be empty")]
    EmptyCollectionName,

    /// The server address is not of the form `tcp://host:port`.
    #[error("invalid server address '{0}': expected tcp://host:port")]
    InvalidServerAddress(String),
}
