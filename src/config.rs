//! Harness configuration: timeouts, polling backoff and workspace placement.
//!
//! Values start from [`HarnessConfig::default`] and may be overridden through
//! environment variables prefixed with [`ENV_PREFIX`], using `__` to separate
//! nested keys (for example `GALLEY_HARNESS_SNAPSHOT__TIMEOUT_MS=30000`).
//! Slow CI runners are expected to raise the timeouts this way rather than
//! editing call sites.

use crate::harness::domain::RetryPolicy;
use camino::Utf8PathBuf;
use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "GALLEY_HARNESS_";

/// Default prefix for workspace temp roots.
pub const DEFAULT_WORKDIR_PREFIX: &str = "galley-workdir";

/// Errors returned while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment could not extract the configuration.
    #[error("failed to extract harness configuration: {0}")]
    Extract(Box<figment::Error>),

    /// A value is outside its accepted range.
    #[error("invalid harness configuration: {field} {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Constraint that was violated.
        reason: &'static str,
    },
}

/// Bounded retry settings for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Overall budget for the loop, in milliseconds.
    pub timeout_ms: u64,
    /// First delay between attempts, in milliseconds.
    pub initial_backoff_ms: u64,
    /// Upper bound for the delay between attempts, in milliseconds.
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            initial_backoff_ms: 10,
            max_backoff_ms: 250,
        }
    }
}

impl RetrySettings {
    /// Returns the overall timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the settings as a retry policy.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.timeout(),
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field,
                reason: "timeout must be greater than zero",
            });
        }
        if self.initial_backoff_ms == 0 {
            return Err(ConfigError::Invalid {
                field,
                reason: "initial backoff must be greater than zero",
            });
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::Invalid {
                field,
                reason: "initial backoff must not exceed max backoff",
            });
        }
        Ok(())
    }
}

/// Placement of workspace temp roots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSettings {
    /// Prefix for each temp root's directory name.
    pub prefix: String,
    /// Parent directory for temp roots; the system temp dir when unset.
    pub base_dir: Option<Utf8PathBuf>,
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_WORKDIR_PREFIX.to_owned(),
            base_dir: None,
        }
    }
}

/// Settings passed through to the embedded server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Interval between rescans of the config directory, in milliseconds.
    pub config_poll_interval_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            config_poll_interval_ms: 50,
        }
    }
}

impl ServerSettings {
    /// Returns the config rescan interval.
    #[must_use]
    pub const fn config_poll_interval(&self) -> Duration {
        Duration::from_millis(self.config_poll_interval_ms)
    }
}

/// Complete harness configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Startup health-check budget used by restarts.
    pub startup: RetrySettings,
    /// Snapshot polling budget used by snapshot waits.
    pub snapshot: RetrySettings,
    /// Time allowed for a serving loop to quiesce after stop, in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// Workspace placement.
    pub workspace: WorkspaceSettings,
    /// Embedded server settings.
    pub server: ServerSettings,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            startup: RetrySettings::default(),
            snapshot: RetrySettings::default(),
            shutdown_timeout_ms: 5_000,
            workspace: WorkspaceSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

impl HarnessConfig {
    /// Loads defaults merged with `GALLEY_HARNESS_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when extraction or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// Returns the default provider chain without extracting it.
    #[must_use]
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Extracts and validates configuration from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when extraction or validation fails.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment
            .extract()
            .map_err(|err| ConfigError::Extract(Box::new(err)))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.startup.validate("startup")?;
        self.snapshot.validate("snapshot")?;
        if self.shutdown_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "shutdown_timeout_ms",
                reason: "must be greater than zero",
            });
        }
        if self.server.config_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "server.config_poll_interval_ms",
                reason: "must be greater than zero",
            });
        }
        if self.workspace.prefix.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "workspace.prefix",
                reason: "must not be empty",
            });
        }
        Ok(())
    }

    /// Returns the serving-loop quiesce timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Overrides the startup health-check timeout.
    #[must_use]
    pub fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup.timeout_ms = duration_to_millis(timeout);
        self
    }

    /// Overrides the snapshot wait timeout.
    #[must_use]
    pub fn with_snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot.timeout_ms = duration_to_millis(timeout);
        self
    }

    /// Overrides the serving-loop quiesce timeout.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = duration_to_millis(timeout);
        self
    }

    /// Overrides the server's config rescan interval.
    #[must_use]
    pub fn with_config_poll_interval(mut self, interval: Duration) -> Self {
        self.server.config_poll_interval_ms = duration_to_millis(interval);
        self
    }
}

fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
