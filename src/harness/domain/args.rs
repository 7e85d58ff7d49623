//! Startup arguments for an embedded server instance.

use super::ServerAddress;
use crate::workspace::WorkspaceLayout;
use camino::Utf8PathBuf;
use std::time::Duration;

/// Startup arguments handed to a server factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerArgs {
    /// Disables transport security.
    pub insecure: bool,
    /// Enables the distribution endpoint.
    pub enable_server: bool,
    /// Reports healthy as soon as the endpoint is bound, instead of after the
    /// first settled config scan.
    pub disable_resource_ready_check: bool,
    /// Directory of configuration fragments.
    pub config_path: Utf8PathBuf,
    /// Mesh config file, read once at startup.
    pub mesh_config_file: Utf8PathBuf,
    /// Introspection port; `0` disables the endpoint.
    pub introspection_port: u16,
    /// Monitoring port; `0` disables the endpoint.
    pub monitoring_port: u16,
    /// Resource kinds the server should ignore.
    pub excluded_resource_kinds: Vec<String>,
    /// Address of the distribution endpoint.
    pub api_address: ServerAddress,
    /// Interval between rescans of `config_path`.
    pub config_poll_interval: Duration,
}

impl ServerArgs {
    /// Arguments for a local-only test instance reading from `layout`.
    ///
    /// Security is disabled, side ports are off so co-located components
    /// cannot collide, and the distribution endpoint binds an OS-assigned
    /// port on all interfaces.
    #[must_use]
    pub fn for_workspace(layout: &WorkspaceLayout, config_poll_interval: Duration) -> Self {
        Self {
            insecure: true,
            enable_server: true,
            disable_resource_ready_check: true,
            config_path: layout.config_dir().to_owned(),
            mesh_config_file: layout.mesh_config_file().to_owned(),
            introspection_port: 0,
            monitoring_port: 0,
            excluded_resource_kinds: Vec::new(),
            api_address: ServerAddress::ephemeral(),
            config_poll_interval,
        }
    }
}
