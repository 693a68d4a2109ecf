//! Dispatcher configuration
//!
//! Settings can be built in code or loaded from JSON or TOML files.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::ConfigError;

/// Configuration for the event dispatcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Deadline for the completion barrier in milliseconds.
    /// `None` waits for every handler however long it takes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch_timeout_ms: Option<u64>,
    /// Log handlers that drop their completion signal at warn level.
    pub warn_on_abandoned: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: None,
            warn_on_abandoned: true,
        }
    }
}

enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

impl DispatcherConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the barrier deadline
    ///
    /// Rounded up to whole milliseconds, never below 1ms.
    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        let millis = timeout.as_nanos().div_ceil(1_000_000).max(1);
        self.dispatch_timeout_ms = Some(u64::try_from(millis).unwrap_or(u64::MAX));
        self
    }

    /// Barrier deadline as a `Duration`
    pub fn dispatch_timeout(&self) -> Option<Duration> {
        self.dispatch_timeout_ms.map(Duration::from_millis)
    }

    /// Load config from file (JSON or TOML)
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        let content = std::fs::read_to_string(path)?;

        let config: Self = match format {
            ConfigFormat::Json => serde_json::from_str(&content)?,
            ConfigFormat::Toml => toml::from_str(&content)?,
        };

        config.validate()?;
        tracing::debug!("Loaded dispatcher config from {}", path.display());
        Ok(config)
    }

    /// Save config to file (JSON or TOML)
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch_timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "dispatch_timeout_ms".to_string(),
                reason: "must be > 0, omit it to wait without a deadline".to_string(),
            });
        }

        Ok(())
    }
}
