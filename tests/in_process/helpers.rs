//! Shared helpers for in-process harness tests.

use galley_harness::LocalGalley;
use galley_harness::config::HarnessConfig;
use galley_harness::harness::domain::SnapshotContent;
use galley_harness::telemetry::init_test_logging;
use serde_json::{Value, json};
use std::time::Duration;

/// Configuration with a fast rescan and generous waits.
#[must_use]
pub fn fast_config() -> HarnessConfig {
    HarnessConfig::default()
        .with_config_poll_interval(Duration::from_millis(20))
        .with_startup_timeout(Duration::from_secs(5))
        .with_snapshot_timeout(Duration::from_secs(5))
}

/// Configuration whose snapshot waits give up quickly, for negative cases.
#[must_use]
pub fn short_wait_config() -> HarnessConfig {
    fast_config().with_snapshot_timeout(Duration::from_millis(1_500))
}

/// Launches a local harness, panicking if it does not come up.
pub async fn launch(config: HarnessConfig) -> LocalGalley {
    init_test_logging();
    LocalGalley::launch_local(config)
        .await
        .expect("harness should launch")
}

/// Renders one resource document as a YAML fragment.
#[must_use]
pub fn resource(collection: &str, name: &str, spec: &Value) -> String {
    serde_yaml::to_string(&json!({
        "collection": collection,
        "name": name,
        "spec": spec,
    }))
    .expect("resource document should serialize")
}

/// Builds a single-entry snapshot.
#[must_use]
pub fn snapshot(key: &str, value: impl Into<Value>) -> SnapshotContent {
    SnapshotContent::new().with_entry(key, value)
}
