//! Newline-delimited JSON protocol spoken by the local server and client.

use super::state::DistributionState;
use crate::harness::domain::SnapshotContent;
use serde::{Deserialize, Serialize};
use std::io;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::trace;

/// Client request, one per line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum Request {
    Health,
    Snapshots { collection: String },
}

/// Server response, one per request line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum Response {
    Health { ready: bool },
    Snapshots { snapshots: Vec<SnapshotContent> },
    Error { message: String },
}

/// Encodes a message as a single line, terminator included.
pub(crate) fn encode_line<T: Serialize>(message: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

fn answer(state: &RwLock<DistributionState>, request: Request) -> Response {
    let guard = state.read().unwrap_or_else(PoisonError::into_inner);
    match request {
        Request::Health => Response::Health {
            ready: guard.is_ready(),
        },
        Request::Snapshots { collection } => Response::Snapshots {
            snapshots: guard.snapshots(&collection),
        },
    }
}

/// Answers requests on `stream` until the peer disconnects.
///
/// Malformed requests receive an error response; the connection stays open.
pub(crate) async fn serve_connection(
    stream: TcpStream,
    state: Arc<RwLock<DistributionState>>,
) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<Request>(&line) {
            Ok(request) => {
                trace!(?request, "answering request");
                answer(&state, request)
            }
            Err(err) => Response::Error {
                message: format!("malformed request: {err}"),
            },
        };
        writer.write_all(encode_line(&response)?.as_bytes()).await?;
    }
    Ok(())
}
