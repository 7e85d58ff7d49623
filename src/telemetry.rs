//! Log subscriber setup for tests that drive the harness.
//!
//! The harness itself only emits `tracing` events; installing a subscriber
//! is left to the embedding test binary.

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter directive.
pub const LOG_FILTER_ENV: &str = "GALLEY_HARNESS_LOG";

/// Filter applied when [`LOG_FILTER_ENV`] is unset or invalid.
pub const DEFAULT_LOG_FILTER: &str = "warn";

static INIT: Once = Once::new();

/// Installs a test-friendly fmt subscriber once per process.
///
/// Output goes through the test writer, so it is captured per test unless
/// `--nocapture` is passed. Later calls, and calls made after another
/// subscriber has been installed, have no effect.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_FILTER_ENV)
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        drop(
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_test_writer()
                .try_init(),
        );
    });
}
