//! Deterministic path layout beneath a workspace root.

use camino::{Utf8Path, Utf8PathBuf};

/// Directory holding applied configuration fragments.
pub const CONFIG_DIR: &str = "config";

/// Directory holding the mesh config file.
pub const MESH_CONFIG_DIR: &str = "mesh-config";

/// File name of the mesh config.
pub const MESH_CONFIG_FILE: &str = "meshconfig.yaml";

/// Paths of a workspace, all derived from its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    root: Utf8PathBuf,
    config_dir: Utf8PathBuf,
    mesh_config_dir: Utf8PathBuf,
    mesh_config_file: Utf8PathBuf,
}

impl WorkspaceLayout {
    /// Derives the layout beneath `root`.
    #[must_use]
    pub fn under(root: impl Into<Utf8PathBuf>) -> Self {
        let root_path = root.into();
        let mesh_config_dir = root_path.join(MESH_CONFIG_DIR);
        Self {
            config_dir: root_path.join(CONFIG_DIR),
            mesh_config_file: mesh_config_dir.join(MESH_CONFIG_FILE),
            mesh_config_dir,
            root: root_path,
        }
    }

    /// Returns the workspace root.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns the directory the server watches for configuration fragments.
    #[must_use]
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Returns the directory containing the mesh config file.
    #[must_use]
    pub fn mesh_config_dir(&self) -> &Utf8Path {
        &self.mesh_config_dir
    }

    /// Returns the mesh config file path.
    #[must_use]
    pub fn mesh_config_file(&self) -> &Utf8Path {
        &self.mesh_config_file
    }
}
