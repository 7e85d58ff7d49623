//! TCP client for the local server's distribution endpoint.

use super::protocol::{Request, Response, encode_line};
use crate::harness::domain::{Backoff, CollectionName, ServerAddress, SnapshotContent};
use crate::harness::ports::{
    DistributionError, DistributionResult, SnapshotClient, SnapshotConnector,
};
use async_trait::async_trait;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Opens [`TcpSnapshotClient`]s.
#[derive(Debug, Clone)]
pub struct TcpSnapshotConnector {
    backoff: Backoff,
}

impl TcpSnapshotConnector {
    /// Creates a connector whose clients probe health with `backoff`.
    #[must_use]
    pub const fn new(backoff: Backoff) -> Self {
        Self { backoff }
    }
}

impl Default for TcpSnapshotConnector {
    fn default() -> Self {
        Self::new(Backoff::new(
            Duration::from_millis(10),
            Duration::from_millis(250),
        ))
    }
}

#[async_trait]
impl SnapshotConnector for TcpSnapshotConnector {
    type Client = TcpSnapshotClient;

    async fn connect(&self, address: &ServerAddress) -> DistributionResult<TcpSnapshotClient> {
        Ok(TcpSnapshotClient {
            address: *address,
            backoff: self.backoff.clone(),
            connection: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }
}

struct Connection {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

/// Distribution client holding one persistent connection.
///
/// The connection is opened on first use and reopened after any transport
/// failure. Requests from concurrent callers are serialised over it.
pub struct TcpSnapshotClient {
    address: ServerAddress,
    backoff: Backoff,
    connection: Mutex<Option<Connection>>,
    closed: AtomicBool,
}

impl TcpSnapshotClient {
    /// Returns the server address this client talks to.
    #[must_use]
    pub const fn address(&self) -> ServerAddress {
        self.address
    }

    async fn dial(&self) -> DistributionResult<Connection> {
        let stream = TcpStream::connect(self.address.dial_addr()).await?;
        let (reader, writer) = stream.into_split();
        trace!(address = %self.address, "opened distribution connection");
        Ok(Connection {
            lines: BufReader::new(reader).lines(),
            writer,
        })
    }

    async fn request(&self, request: &Request) -> DistributionResult<Response> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DistributionError::Closed);
        }
        let mut guard = self.connection.lock().await;
        let mut connection = match guard.take() {
            Some(open) => open,
            None => self.dial().await?,
        };
        let response = exchange(&mut connection, request).await?;
        if !self.closed.load(Ordering::SeqCst) {
            *guard = Some(connection);
        }
        Ok(response)
    }
}

async fn exchange(connection: &mut Connection, request: &Request) -> DistributionResult<Response> {
    let line = encode_line(request).map_err(|err| DistributionError::Protocol(err.to_string()))?;
    connection.writer.write_all(line.as_bytes()).await?;
    let reply = connection
        .lines
        .next_line()
        .await?
        .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))?;
    serde_json::from_str(&reply)
        .map_err(|err| DistributionError::Protocol(format!("malformed response: {err}")))
}

#[async_trait]
impl SnapshotClient for TcpSnapshotClient {
    async fn wait_for_startup_healthy(&self, timeout: Duration) -> DistributionResult<()> {
        let deadline = Instant::now() + timeout;
        let mut backoff = self.backoff.clone();
        let probe = async {
            loop {
                match self.request(&Request::Health).await {
                    Ok(Response::Health { ready: true }) => return Ok(()),
                    Ok(other) => trace!(address = %self.address, response = ?other, "server not ready"),
                    Err(DistributionError::Closed) => return Err(DistributionError::Closed),
                    Err(err) => trace!(address = %self.address, error = %err, "health probe failed"),
                }
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(DistributionError::StartupTimeout {
                        address: self.address,
                        timeout,
                    });
                }
                tokio::time::sleep(backoff.next_delay(remaining)).await;
            }
        };

        let outcome = tokio::time::timeout_at(deadline, probe)
            .await
            .unwrap_or(Err(DistributionError::StartupTimeout {
                address: self.address,
                timeout,
            }));
        if outcome.is_ok() {
            debug!(address = %self.address, "server reported healthy startup");
        }
        outcome
    }

    async fn fetch_snapshots(
        &self,
        collection: &CollectionName,
    ) -> DistributionResult<Vec<SnapshotContent>> {
        let request = Request::Snapshots {
            collection: collection.as_str().to_owned(),
        };
        match self.request(&request).await? {
            Response::Snapshots { snapshots } => Ok(snapshots),
            Response::Error { message } => Err(DistributionError::Remote(message)),
            Response::Health { .. } => Err(DistributionError::Protocol(
                "health response to a snapshot request".to_owned(),
            )),
        }
    }

    async fn close(&self) -> DistributionResult<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!(address = %self.address, "closing snapshot client");
        }
        drop(self.connection.lock().await.take());
        Ok(())
    }
}
