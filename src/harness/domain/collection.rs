//! Distributed collection names.

use super::HarnessDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Collection through which the server distributes the mesh config.
pub const MESH_CONFIG_COLLECTION: &str = "istio/mesh/v1alpha1/MeshConfig";

/// Resource key of the mesh config inside [`MESH_CONFIG_COLLECTION`].
pub const MESH_CONFIG_RESOURCE: &str = "meshconfig";

/// Validated name of a distributed collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    /// Creates a collection name. Surrounding whitespace is removed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessDomainError::EmptyCollectionName`] when the trimmed
    /// input is empty.
    pub fn new(value: impl Into<String>) -> Result<Self, HarnessDomainError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(HarnessDomainError::EmptyCollectionName);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}
