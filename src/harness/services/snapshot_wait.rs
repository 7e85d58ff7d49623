//! Polls a distribution client until a collection's snapshots match.

use super::{HarnessError, HarnessResult};
use crate::harness::domain::{CollectionName, RetryPolicy, SnapshotContent, distinct_snapshots};
use crate::harness::ports::{DistributionError, SnapshotClient};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Waits for distributed snapshot sequences to match an expectation.
///
/// Each wait polls with exponential backoff until the deadline set by its
/// [`RetryPolicy`]. Waits hold no state between calls, so a single waiter
/// may serve concurrent callers awaiting different collections.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotWaiter {
    policy: RetryPolicy,
}

#[derive(Debug, Default)]
struct PollProgress {
    last_observed: Option<Vec<SnapshotContent>>,
    last_error: Option<DistributionError>,
}

impl SnapshotWaiter {
    /// Creates a waiter with the given polling policy.
    #[must_use]
    pub const fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Returns the polling policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Polls `client` until the distinct snapshots of `collection` equal
    /// `expected`, in order, with no extras and no omissions.
    ///
    /// An empty `expected` succeeds only while the collection has never been
    /// distributed. Dropping the returned future abandons the wait without
    /// side effects.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::SnapshotTimeout`] carrying the last observed
    /// sequence when no match is seen before the deadline.
    pub async fn wait_for_snapshot<C>(
        &self,
        client: &C,
        collection: &CollectionName,
        expected: &[SnapshotContent],
    ) -> HarnessResult<()>
    where
        C: SnapshotClient + ?Sized,
    {
        let deadline = Instant::now() + self.policy.timeout();
        let mut progress = PollProgress::default();

        let matched = tokio::time::timeout_at(
            deadline,
            self.poll_until_match(client, collection, expected, deadline, &mut progress),
        )
        .await
        .unwrap_or(false);

        if matched {
            debug!(%collection, snapshots = expected.len(), "observed expected snapshots");
            return Ok(());
        }

        Err(HarnessError::SnapshotTimeout {
            collection: collection.clone(),
            timeout: self.policy.timeout(),
            expected: expected.to_vec(),
            last_observed: progress.last_observed,
            last_error: progress.last_error.map(Box::new),
        })
    }

    async fn poll_until_match<C>(
        &self,
        client: &C,
        collection: &CollectionName,
        expected: &[SnapshotContent],
        deadline: Instant,
        progress: &mut PollProgress,
    ) -> bool
    where
        C: SnapshotClient + ?Sized,
    {
        let mut backoff = self.policy.backoff();
        loop {
            match client.fetch_snapshots(collection).await {
                Ok(observed) => {
                    let distinct = distinct_snapshots(observed);
                    if distinct.as_slice() == expected {
                        return true;
                    }
                    trace!(%collection, observed = distinct.len(), "snapshots do not match yet");
                    progress.last_observed = Some(distinct);
                    progress.last_error = None;
                }
                Err(err) => {
                    debug!(%collection, error = %err, "snapshot fetch failed; retrying");
                    progress.last_error = Some(err);
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return false;
            }
            tokio::time::sleep(backoff.next_delay(remaining)).await;
        }
    }
}
