//! Application services: the server lifecycle controller and snapshot waits.

mod error;
mod lifecycle;
mod snapshot_wait;

pub use error::{HarnessError, HarnessResult, ShutdownError};
pub use lifecycle::ServerLifecycleController;
pub use snapshot_wait::SnapshotWaiter;
