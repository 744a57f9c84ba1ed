//! Collector configuration with sensible defaults.

// Layer 1: Standard library imports
use std::path::PathBuf;

/// Default number of independent worker tasks.
pub const DEFAULT_WORKERS: usize = 4;

/// Default per-GPU ring capacity.
pub const DEFAULT_MAX_ENTRIES_PER_GPU: usize = 1000;

/// Default topic the collector subscribes to.
pub const DEFAULT_TOPIC: &str = "telemetry";

/// Number of acked messages between checkpoint persists.
pub const CHECKPOINT_BATCH: u64 = 100;

/// Collector configuration.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Number of independent worker tasks subscribing to the broker.
    pub workers: usize,
    /// Root directory for per-GPU telemetry logs.
    pub data_dir: PathBuf,
    /// Maximum retained entries per GPU in the in-memory ring.
    pub max_entries_per_gpu: usize,
    /// Whether worker checkpoints are persisted.
    pub checkpoint_enabled: bool,
    /// Root directory for per-worker checkpoint files.
    pub checkpoint_dir: PathBuf,
    /// Port the collector's HTTP query surface listens on.
    pub health_port: u16,
    /// Topic the worker pool subscribes to.
    pub mq_topic: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            data_dir: PathBuf::from("./data/telemetry"),
            max_entries_per_gpu: DEFAULT_MAX_ENTRIES_PER_GPU,
            checkpoint_enabled: true,
            checkpoint_dir: PathBuf::from("./data/checkpoints"),
            health_port: 8080,
            mq_topic: DEFAULT_TOPIC.to_string(),
        }
    }
}

impl CollectorConfig {
    /// Create a new configuration builder.
    pub fn builder() -> CollectorConfigBuilder {
        CollectorConfigBuilder::default()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.workers == 0 {
            return Err("workers must be > 0".to_string());
        }
        if self.max_entries_per_gpu == 0 {
            return Err("max_entries_per_gpu must be > 0".to_string());
        }
        if self.health_port == 0 {
            return Err("health_port must be in 1..=65535".to_string());
        }
        if self.mq_topic.is_empty() {
            return Err("mq_topic must not be empty".to_string());
        }
        Ok(())
    }
}

/// Builder for [`CollectorConfig`] with a fluent API.
#[derive(Debug, Default)]
pub struct CollectorConfigBuilder {
    config: CollectorConfig,
}

impl CollectorConfigBuilder {
    /// Set the number of independent worker tasks.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// Set the per-GPU telemetry log directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.data_dir = dir.into();
        self
    }

    /// Set the per-GPU ring capacity.
    pub fn with_max_entries_per_gpu(mut self, max: usize) -> Self {
        self.config.max_entries_per_gpu = max;
        self
    }

    /// Enable or disable checkpoint persistence, and set its directory.
    pub fn with_checkpoints(mut self, enabled: bool, dir: impl Into<PathBuf>) -> Self {
        self.config.checkpoint_enabled = enabled;
        self.config.checkpoint_dir = dir.into();
        self
    }

    /// Set the HTTP query surface port.
    pub fn with_health_port(mut self, port: u16) -> Self {
        self.config.health_port = port;
        self
    }

    /// Set the broker topic this collector subscribes to.
    pub fn with_mq_topic(mut self, topic: impl Into<String>) -> Self {
        self.config.mq_topic = topic.into();
        self
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<CollectorConfig, String> {
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
        let config = CollectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workers, DEFAULT_WORKERS);
    }

    #[test]
    fn builder_roundtrips_all_fields() {
        let config = CollectorConfig::builder()
            .with_workers(2)
            .with_max_entries_per_gpu(50)
            .with_mq_topic("gpu-metrics")
            .with_health_port(9090)
            .build()
            .unwrap();

        assert_eq!(config.workers, 2);
        assert_eq!(config.max_entries_per_gpu, 50);
        assert_eq!(config.mq_topic, "gpu-metrics");
        assert_eq!(config.health_port, 9090);
    }

    #[test]
    fn zero_workers_fails_validation() {
        let result = CollectorConfig::builder().with_workers(0).build();
        assert!(result.is_err());
    }

    #[test]
    fn empty_topic_fails_validation() {
        let result = CollectorConfig::builder().with_mq_topic("").build();
        assert!(result.is_err());
    }
}
