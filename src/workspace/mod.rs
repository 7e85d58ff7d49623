//! Private directory tree that an embedded configuration server reads from.
//!
//! A workspace is created under a fresh temporary root and holds two inputs:
//!
//! - `config/`: applied configuration fragments, watched by the server
//! - `mesh-config/meshconfig.yaml`: the mesh config, read once at startup
//!
//! Workspaces are never repaired in place. A reset drops the old tree and
//! initialises a new one.

mod error;
mod layout;
mod manager;

pub use error::{WorkspaceError, WorkspaceResult};
pub use layout::{CONFIG_DIR, MESH_CONFIG_DIR, MESH_CONFIG_FILE, WorkspaceLayout};
pub use manager::Workspace;
