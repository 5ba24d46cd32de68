//! Streaming configuration via `streaming.toml`
//!
//! On first open, a default `streaming.toml` is created in the given
//! directory. To change settings, edit the file and restart.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use streamkeeper_core::{StreamingError, StreamingResult, UNCLOSED_STREAM_ALERT};

/// Config file name placed in the configuration directory.
pub const CONFIG_FILE_NAME: &str = "streaming.toml";

/// Ghost buster settings, the `[ghost_buster]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GhostBusterConfig {
    /// Run the background sweeper
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// How long the sweeper waits on the reference queue per poll
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Alert name raised for reclaimed streams
    #[serde(default = "default_alert_name")]
    pub alert_name: String,
}

fn default_enabled() -> bool {
    true
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_alert_name() -> String {
    UNCLOSED_STREAM_ALERT.to_string()
}

impl Default for GhostBusterConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            poll_interval_ms: default_poll_interval_ms(),
            alert_name: default_alert_name(),
        }
    }
}

impl GhostBusterConfig {
    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Streaming configuration loaded from `streaming.toml`.
///
/// # Example
///
/// ```toml
/// # Record a call stack when a provider is closed, reported when a
/// # cursor is later requested from it.
/// capture_close_site = false
///
/// [ghost_buster]
/// enabled = true
/// poll_interval_ms = 1000
/// alert_name = "UNCLOSED_STREAM"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct StreamingConfig {
    /// Capture the close site of managed providers
    #[serde(default)]
    pub capture_close_site: bool,
    /// Ghost buster settings
    #[serde(default)]
    pub ghost_buster: GhostBusterConfig,
}

impl StreamingConfig {
    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero poll interval or an empty alert name.
    pub fn validate(&self) -> StreamingResult<()> {
        if self.ghost_buster.poll_interval_ms == 0 {
            return Err(StreamingError::InvalidConfig(
                "ghost_buster.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.ghost_buster.alert_name.trim().is_empty() {
            return Err(StreamingError::InvalidConfig(
                "ghost_buster.alert_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Streaming configuration
#
# Record a call stack when a managed provider is closed. The stack is
# included in the error returned when a cursor is later requested from it.
capture_close_site = false

[ghost_buster]
# Reclaim streams whose provider was dropped without being closed.
enabled = true

# How long the sweeper waits for dropped providers per poll (milliseconds).
poll_interval_ms = 1000

# Alert raised for every reclaimed stream.
alert_name = "UNCLOSED_STREAM"
"#
    }

    /// Parse and validate config from TOML text.
    pub fn from_toml_str(content: &str) -> StreamingResult<Self> {
        let config: StreamingConfig = toml::from_str(content)
            .map_err(|e| StreamingError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> StreamingResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            StreamingError::InvalidConfig(msg) => StreamingError::InvalidConfig(format!(
                "Failed to load config file '{}': {}",
                path.display(),
                msg
            )),
            other => other,
        })
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> StreamingResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> StreamingResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            StreamingError::InvalidConfig(format!("Failed to serialize config: {}", e))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
