//! Service layer for embedded server lifecycle orchestration.

use super::{HarnessError, HarnessResult, ShutdownError, SnapshotWaiter};
use crate::config::HarnessConfig;
use crate::harness::adapters::local::{LocalConfigServerFactory, TcpSnapshotConnector};
use crate::harness::domain::{
    CollectionName, InstanceId, LifecycleState, ServerAddress, ServerArgs, SnapshotContent,
};
use crate::harness::ports::{
    ConfigServer, ConfigServerFactory, ServerResult, SnapshotClient, SnapshotConnector,
};
use crate::workspace::Workspace;
use camino::{Utf8Path, Utf8PathBuf};
use mockable::{Clock, DefaultClock};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A server instance together with its serving task.
struct RunningServer<S> {
    server: Arc<S>,
    address: ServerAddress,
    task: JoinHandle<ServerResult<()>>,
}

/// Owns one embedded server instance, its workspace and its distribution
/// client.
///
/// At most one server instance and one client are live at a time. Every
/// restart tears both down first, so configuration staged in the workspace
/// survives while server state does not.
///
/// Mutating operations take `&mut self` and are therefore serialised by the
/// borrow checker; [`ServerLifecycleController::wait_for_snapshot`] takes
/// `&self` so several waits may run concurrently.
pub struct ServerLifecycleController<F, C, K>
where
    F: ConfigServerFactory,
    C: SnapshotConnector,
    K: Clock + Send + Sync,
{
    id: InstanceId,
    factory: Arc<F>,
    connector: Arc<C>,
    clock: Arc<K>,
    config: HarnessConfig,
    waiter: SnapshotWaiter,
    state: LifecycleState,
    workspace: Option<Workspace>,
    server: Option<RunningServer<F::Server>>,
    client: Option<C::Client>,
}

impl<F, C, K> ServerLifecycleController<F, C, K>
where
    F: ConfigServerFactory,
    C: SnapshotConnector,
    K: Clock + Send + Sync,
{
    /// Creates a stopped controller with no workspace.
    #[must_use]
    pub fn new(factory: Arc<F>, connector: Arc<C>, clock: Arc<K>, config: HarnessConfig) -> Self {
        let waiter = SnapshotWaiter::new(config.snapshot.policy());
        Self {
            id: InstanceId::new(),
            factory,
            connector,
            clock,
            config,
            waiter,
            state: LifecycleState::Stopped,
            workspace: None,
            server: None,
            client: None,
        }
    }

    /// Creates a controller and brings it to a running state with a fresh
    /// workspace.
    ///
    /// # Errors
    ///
    /// Returns any error from [`ServerLifecycleController::reset`].
    pub async fn launch(
        factory: Arc<F>,
        connector: Arc<C>,
        clock: Arc<K>,
        config: HarnessConfig,
    ) -> HarnessResult<Self> {
        let mut controller = Self::new(factory, connector, clock, config);
        controller.reset().await?;
        Ok(controller)
    }

    /// Returns the identifier carried on this controller's log records.
    #[must_use]
    pub const fn id(&self) -> InstanceId {
        self.id
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// Returns the active configuration.
    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Returns the current workspace, if one has been initialised.
    #[must_use]
    pub const fn workspace(&self) -> Option<&Workspace> {
        self.workspace.as_ref()
    }

    /// Returns the distribution address of the running instance.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NotRunning`] when no instance is running.
    pub fn address(&self) -> HarnessResult<ServerAddress> {
        match (&self.server, self.state) {
            (Some(running), LifecycleState::Running) => Ok(running.address),
            _ => Err(HarnessError::NotRunning),
        }
    }

    /// Discards all prior state and starts from a fresh workspace.
    ///
    /// Teardown failures of the previous instance are logged and otherwise
    /// ignored; the previous workspace tree is removed.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Workspace`] when the new workspace cannot be
    /// created, or any error from [`ServerLifecycleController::restart`].
    pub async fn reset(&mut self) -> HarnessResult<()> {
        if let Err(err) = self.close().await {
            warn!(instance = %self.id, error = %err, "error while closing config server during reset");
        }
        self.workspace = None;
        let workspace = Workspace::initialize(&self.config.workspace)?;
        debug!(instance = %self.id, root = %workspace.layout().root(), "initialised workspace");
        self.workspace = Some(workspace);
        self.restart().await
    }

    /// Stops any live instance and starts a new one over the current
    /// workspace.
    ///
    /// On failure every partially created resource is torn down and the
    /// controller is left stopped.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Shutdown`] when the previous instance cannot
    /// be closed, [`HarnessError::NotInitialized`] without a workspace,
    /// [`HarnessError::Start`] or [`HarnessError::Connect`] when the new
    /// instance cannot be created, and [`HarnessError::StartupTimeout`] when
    /// it never reports healthy.
    pub async fn restart(&mut self) -> HarnessResult<()> {
        if self.server.is_some() || self.client.is_some() {
            self.close().await?;
        }

        let args = {
            let workspace = self
                .workspace
                .as_ref()
                .ok_or(HarnessError::NotInitialized)?;
            ServerArgs::for_workspace(
                workspace.layout(),
                self.config.server.config_poll_interval(),
            )
        };

        self.state = LifecycleState::Starting;
        if let Err(err) = self.start_instance(&args).await {
            if let Err(close_err) = self.close().await {
                warn!(instance = %self.id, error = %close_err, "error while tearing down failed start");
            }
            return Err(err);
        }

        self.state = LifecycleState::Running;
        if let Some(running) = &self.server {
            info!(instance = %self.id, address = %running.address, "config server running");
        }
        Ok(())
    }

    async fn start_instance(&mut self, args: &ServerArgs) -> HarnessResult<()> {
        let server = self.factory.start(args).await.map_err(HarnessError::Start)?;
        let address = server.address();
        let task = tokio::spawn(Arc::clone(&server).serve());
        self.server = Some(RunningServer {
            server,
            address,
            task,
        });
        debug!(instance = %self.id, %address, "config server serving");

        let connected = self
            .connector
            .connect(&address)
            .await
            .map_err(HarnessError::Connect)?;
        let timeout = self.config.startup.timeout();
        let healthy = connected.wait_for_startup_healthy(timeout).await;
        self.client = Some(connected);
        healthy.map_err(|source| HarnessError::StartupTimeout {
            address,
            timeout,
            source,
        })
    }

    /// Replaces the mesh config and restarts so the server reads it.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NotInitialized`] without a workspace,
    /// [`HarnessError::Workspace`] when the write fails, or any error from
    /// [`ServerLifecycleController::restart`].
    pub async fn set_mesh_config(&mut self, yaml: &str) -> HarnessResult<()> {
        self.require_workspace()?.set_mesh_config(yaml)?;
        debug!(instance = %self.id, "mesh config replaced; restarting");
        self.restart().await
    }

    /// Stages a configuration fragment in the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NotInitialized`] without a workspace, or
    /// [`HarnessError::Workspace`] when the write fails.
    pub fn apply_config_text(&self, yaml: &str) -> HarnessResult<Utf8PathBuf> {
        Ok(self
            .require_workspace()?
            .apply_config_text(&*self.clock, yaml)?)
    }

    /// Mirrors a directory tree of configuration into the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NotInitialized`] without a workspace, or
    /// [`HarnessError::Workspace`] on any copy failure.
    pub fn apply_config_dir(&self, source: impl AsRef<Utf8Path>) -> HarnessResult<()> {
        Ok(self.require_workspace()?.apply_config_dir(source.as_ref())?)
    }

    /// Removes all staged configuration from the workspace.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::NotInitialized`] without a workspace, or
    /// [`HarnessError::Workspace`] when a removal fails.
    pub fn clear_config(&self) -> HarnessResult<()> {
        Ok(self.require_workspace()?.clear_config()?)
    }

    /// Waits until the distinct snapshots of `collection` equal `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Domain`] for an empty collection name,
    /// [`HarnessError::NotRunning`] when no client is connected, and
    /// [`HarnessError::SnapshotTimeout`] when no match is observed in time.
    pub async fn wait_for_snapshot(
        &self,
        collection: &str,
        expected: &[SnapshotContent],
    ) -> HarnessResult<()> {
        let collection_name = CollectionName::new(collection)?;
        let client = self.client.as_ref().ok_or(HarnessError::NotRunning)?;
        debug!(instance = %self.id, collection = %collection_name, expected = expected.len(), "waiting for snapshots");
        self.waiter
            .wait_for_snapshot(client, &collection_name, expected)
            .await
    }

    /// Closes the client, then stops the server.
    ///
    /// Both steps are attempted even when the first fails, and the
    /// controller is left stopped either way. Closing a controller with
    /// nothing live succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Shutdown`] with the first failure observed.
    pub async fn close(&mut self) -> HarnessResult<()> {
        let mut failures = Vec::new();

        if let Some(client) = self.client.take() {
            if let Err(err) = client.close().await {
                warn!(instance = %self.id, error = %err, "failed to close snapshot client");
                failures.push(ShutdownError::Client(err));
            }
        }

        if let Some(running) = self.server.take() {
            let address = running.address;
            match self.stop_server(running).await {
                Ok(()) => debug!(instance = %self.id, %address, "config server stopped"),
                Err(err) => {
                    warn!(instance = %self.id, %address, error = %err, "failed to stop config server");
                    failures.push(err);
                }
            }
        }

        self.state = LifecycleState::Stopped;
        failures
            .into_iter()
            .next()
            .map_or(Ok(()), |err| Err(HarnessError::Shutdown(err)))
    }

    async fn stop_server(&self, running: RunningServer<F::Server>) -> Result<(), ShutdownError> {
        let RunningServer {
            server, mut task, ..
        } = running;
        let signalled = server.stop().await;

        let shutdown_timeout = self.config.shutdown_timeout();
        let exited = match tokio::time::timeout(shutdown_timeout, &mut task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(err))) => Err(ShutdownError::Server(err)),
            Ok(Err(join_err)) => Err(ShutdownError::Join(join_err.to_string())),
            Err(_elapsed) => {
                task.abort();
                drop(task.await);
                Err(ShutdownError::Timeout(shutdown_timeout))
            }
        };

        signalled.map_err(ShutdownError::Server)?;
        exited
    }

    fn require_workspace(&self) -> HarnessResult<&Workspace> {
        self.workspace.as_ref().ok_or(HarnessError::NotInitialized)
    }
}

impl ServerLifecycleController<LocalConfigServerFactory, TcpSnapshotConnector, DefaultClock> {
    /// Launches a controller backed by the in-process local server.
    ///
    /// # Errors
    ///
    /// Returns any error from [`ServerLifecycleController::launch`].
    pub async fn launch_local(config: HarnessConfig) -> HarnessResult<Self> {
        let connector = TcpSnapshotConnector::new(config.startup.policy().backoff());
        Self::launch(
            Arc::new(LocalConfigServerFactory::new()),
            Arc::new(connector),
            Arc::new(DefaultClock),
            config,
        )
        .await
    }
}

impl<F, C, K> Drop for ServerLifecycleController<F, C, K>
where
    F: ConfigServerFactory,
    C: SnapshotConnector,
    K: Clock + Send + Sync,
{
    fn drop(&mut self) {
        if let Some(running) = self.server.take() {
            debug!(instance = %self.id, address = %running.address, "aborting config server on drop");
            running.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalGalley;
    use rstest::{fixture, rstest};

    #[fixture]
    fn unstarted() -> LocalGalley {
        let config = HarnessConfig::default();
        ServerLifecycleController::new(
            Arc::new(LocalConfigServerFactory::new()),
            Arc::new(TcpSnapshotConnector::new(config.startup.policy().backoff())),
            Arc::new(DefaultClock),
            config,
        )
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn close_without_instance_succeeds_repeatedly(mut unstarted: LocalGalley) {
        unstarted.close().await.expect("first close");
        unstarted.close().await.expect("second close");

        assert_eq!(unstarted.state(), LifecycleState::Stopped);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn restart_requires_workspace(mut unstarted: LocalGalley) {
        let result = unstarted.restart().await;

        assert!(matches!(result, Err(HarnessError::NotInitialized)));
        assert_eq!(unstarted.state(), LifecycleState::Stopped);
    }

    #[rstest]
    fn staging_requires_workspace(unstarted: LocalGalley) {
        assert!(matches!(
            unstarted.apply_config_text("a: 1\n"),
            Err(HarnessError::NotInitialized)
        ));
        assert!(matches!(
            unstarted.clear_config(),
            Err(HarnessError::NotInitialized)
        ));
        assert!(matches!(unstarted.address(), Err(HarnessError::NotRunning)));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn wait_requires_running_client(unstarted: LocalGalley) {
        let result = unstarted.wait_for_snapshot("foo", &[]).await;

        assert!(matches!(result, Err(HarnessError::NotRunning)));
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn wait_rejects_blank_collection(unstarted: LocalGalley) {
        let result = unstarted.wait_for_snapshot("  ", &[]).await;

        assert!(matches!(result, Err(HarnessError::Domain(_))));
    }
}
