//! In-process configuration server backed by a workspace directory.

use super::protocol::serve_connection;
use super::source::{load_mesh_config, scan_config_dir};
use super::state::DistributionState;
use crate::harness::domain::{MESH_CONFIG_COLLECTION, ServerAddress, ServerArgs, SnapshotContent};
use crate::harness::ports::{ConfigServer, ConfigServerFactory, ServerError, ServerResult};
use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Creates [`LocalConfigServer`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalConfigServerFactory;

impl LocalConfigServerFactory {
    /// Creates a factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConfigServerFactory for LocalConfigServerFactory {
    type Server = LocalConfigServer;

    async fn start(&self, args: &ServerArgs) -> ServerResult<Arc<LocalConfigServer>> {
        if !args.insecure {
            return Err(ServerError::Unsupported(
                "the local server does not support transport security".to_owned(),
            ));
        }
        if !args.enable_server {
            return Err(ServerError::Unsupported(
                "the distribution endpoint must be enabled".to_owned(),
            ));
        }
        if args.introspection_port != 0 || args.monitoring_port != 0 {
            warn!(
                introspection_port = args.introspection_port,
                monitoring_port = args.monitoring_port,
                "the local server has no introspection or monitoring endpoints; ports ignored"
            );
        }

        let mesh_config = load_mesh_config(&args.mesh_config_file)?;
        let bind_error = |source| ServerError::Bind {
            address: args.api_address,
            source: Arc::new(source),
        };
        let listener = TcpListener::bind(args.api_address.socket_addr())
            .await
            .map_err(bind_error)?;
        let address = ServerAddress::tcp(listener.local_addr().map_err(bind_error)?);

        let mut state = DistributionState::default();
        state.publish(MESH_CONFIG_COLLECTION, mesh_config);
        if args.disable_resource_ready_check {
            state.mark_ready();
        }
        let (shutdown, _) = watch::channel(false);

        info!(%address, config_dir = %args.config_path, "local config server bound");
        Ok(Arc::new(LocalConfigServer {
            address,
            config_dir: args.config_path.clone(),
            poll_interval: args.config_poll_interval.max(MIN_POLL_INTERVAL),
            excluded: args.excluded_resource_kinds.iter().cloned().collect(),
            listener: Mutex::new(Some(listener)),
            previous_scan: Mutex::new(None),
            state: Arc::new(RwLock::new(state)),
            shutdown,
        }))
    }
}

/// Configuration server that distributes snapshots of a watched directory.
///
/// The config directory is rescanned every poll interval while serving; the
/// mesh config is read once when the instance is created. A scan is only
/// published once the next scan returns the same content, so multi-file
/// edits made between two ticks are distributed as one snapshot.
#[derive(Debug)]
pub struct LocalConfigServer {
    address: ServerAddress,
    config_dir: Utf8PathBuf,
    poll_interval: Duration,
    excluded: HashSet<String>,
    listener: Mutex<Option<TcpListener>>,
    previous_scan: Mutex<Option<BTreeMap<String, SnapshotContent>>>,
    state: Arc<RwLock<DistributionState>>,
    shutdown: watch::Sender<bool>,
}

impl LocalConfigServer {
    fn take_listener(&self) -> Option<TcpListener> {
        self.listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn is_stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Records `scanned` and returns whether it matches the previous scan.
    fn is_settled(&self, scanned: &BTreeMap<String, SnapshotContent>) -> bool {
        let mut previous = self
            .previous_scan
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if previous.as_ref() == Some(scanned) {
            return true;
        }
        *previous = Some(scanned.clone());
        false
    }

    async fn rescan(&self) {
        let root = self.config_dir.clone();
        let scanned = match tokio::task::spawn_blocking(move || scan_config_dir(&root)).await {
            Ok(scanned) => scanned,
            Err(err) => {
                warn!(address = %self.address, error = %err, "config scan task failed");
                return;
            }
        };
        let filtered: BTreeMap<String, SnapshotContent> = scanned
            .into_iter()
            .filter(|(collection, _)| !self.excluded.contains(collection))
            .collect();
        if !self.is_settled(&filtered) {
            trace!(address = %self.address, "config scan changed; waiting for it to settle");
            return;
        }
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply_scan(filtered);
    }
}

#[async_trait]
impl ConfigServer for LocalConfigServer {
    fn address(&self) -> ServerAddress {
        self.address
    }

    async fn serve(self: Arc<Self>) -> ServerResult<()> {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            return Ok(());
        }
        let Some(listener) = self.take_listener() else {
            if self.is_stopping() {
                return Ok(());
            }
            return Err(ServerError::AlreadyServing(self.address));
        };

        let mut rescan = tokio::time::interval(self.poll_interval);
        rescan.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut connections = JoinSet::new();
        debug!(address = %self.address, "serving loop started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow_and_update() {
                        break;
                    }
                }
                _ = rescan.tick() => self.rescan().await,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        trace!(address = %self.address, %peer, "accepted connection");
                        connections.spawn(serve_connection(stream, Arc::clone(&self.state)));
                    }
                    Err(err) => warn!(address = %self.address, error = %err, "failed to accept connection"),
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    match finished {
                        Ok(Ok(())) => {}
                        Ok(Err(err)) => debug!(address = %self.address, error = %err, "connection closed with error"),
                        Err(err) => warn!(address = %self.address, error = %err, "connection task failed"),
                    }
                }
            }
        }

        drop(listener);
        connections.shutdown().await;
        debug!(address = %self.address, "serving loop exited");
        Ok(())
    }

    async fn stop(&self) -> ServerResult<()> {
        self.shutdown.send_replace(true);
        drop(self.take_listener());
        Ok(())
    }
}
