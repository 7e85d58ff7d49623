//! Lifecycle state of the server controller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of the managed server instance.
///
/// A failed start returns to [`LifecycleState::Stopped`]; there is no
/// terminal failure state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No server instance is live.
    #[default]
    Stopped,
    /// A server instance has been created and is awaiting its health signal.
    Starting,
    /// A server instance is healthy and a client is connected to it.
    Running,
}

impl LifecycleState {
    /// Returns the canonical string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
