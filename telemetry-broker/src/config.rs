//! Broker configuration with sensible defaults.

// Layer 1: Standard library imports
use std::path::PathBuf;
use std::time::Duration;

/// Default acknowledgment timeout before a pending message is redelivered.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on redelivery attempts per message.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Fixed cadence of the acknowledgment-timeout scan; not configurable (see
/// design notes: deriving this from `ack_timeout` is a valid extension but
/// not required for correctness).
pub const TIMEOUT_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Per-subscriber inbox capacity.
pub const SUBSCRIBER_INBOX_CAPACITY: usize = 100;

/// Broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Whether published messages are additionally appended to a per-topic log.
    pub persistence_enabled: bool,
    /// Root directory for per-topic message logs, used only when
    /// `persistence_enabled` is set.
    pub persistence_dir: PathBuf,
    /// How long a pending message may go unacknowledged before redelivery.
    pub ack_timeout: Duration,
    /// Maximum number of redeliveries before a message is dropped.
    pub max_retries: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            persistence_enabled: false,
            persistence_dir: PathBuf::from("./data/broker"),
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl BrokerConfig {
    /// Create a new configuration builder.
    pub fn builder() -> BrokerConfigBuilder {
        BrokerConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.ack_timeout.is_zero() {
            return Err("ack_timeout must be > 0".to_string());
        }
        if self.persistence_enabled && self.persistence_dir.as_os_str().is_empty() {
            return Err("persistence_dir must be set when persistence_enabled".to_string());
        }
        Ok(())
    }
}

/// Builder for [`BrokerConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct BrokerConfigBuilder {
    config: BrokerConfig,
}

impl BrokerConfigBuilder {
    /// Enable or disable per-topic append-only persistence.
    pub fn with_persistence(mut self, enabled: bool, dir: impl Into<PathBuf>) -> Self {
        self.config.persistence_enabled = enabled;
        self.config.persistence_dir = dir.into();
        self
    }

    /// Set the acknowledgment timeout.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_timeout = timeout;
        self
    }

    /// Set the maximum number of redelivery attempts.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<BrokerConfig, String> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = BrokerConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.persistence_enabled);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn builder_roundtrips_all_fields() {
        let config = BrokerConfig::builder()
            .with_ack_timeout(Duration::from_millis(500))
            .with_max_retries(2)
            .with_persistence(true, "/tmp/topics")
            .build()
            .unwrap();

        assert_eq!(config.ack_timeout, Duration::from_millis(500));
        assert_eq!(config.max_retries, 2);
        assert!(config.persistence_enabled);
        assert_eq!(config.persistence_dir, PathBuf::from("/tmp/topics"));
    }

    #[test]
    fn zero_ack_timeout_fails_validation() {
        let result = BrokerConfig::builder()
            .with_ack_timeout(Duration::from_secs(0))
            .build();
        assert!(result.is_err());
    }
}
