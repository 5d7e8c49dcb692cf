// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! The validated [`RelayConfig`] is built once at startup and handed by
//! reference to each component. Any invalid field results in a
//! HardValidationError that prevents startup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{HardValidationError, RelayError, RelayResult};
use crate::types::{StoreCapacity, StoreName, TopicName};

/// Raw store section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawStoreConfig {
    #[serde(default = "default_store_name")]
    name: String,
    #[serde(default = "default_store_size")]
    size_bytes: usize,
}

fn default_store_name() -> String {
    "txrelay-messages".to_string()
}

fn default_store_size() -> usize {
    1024 * 1024 // 1MB
}

impl Default for RawStoreConfig {
    fn default() -> Self {
        Self {
            name: default_store_name(),
            size_bytes: default_store_size(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawProducerConfig {
    #[serde(default = "default_bulk_count")]
    bulk_count: usize,
}

fn default_bulk_count() -> usize {
    100
}

impl Default for RawProducerConfig {
    fn default() -> Self {
        Self {
            bulk_count: default_bulk_count(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConsumerConfig {
    rule_file: Option<String>,
    #[serde(default = "default_bundle_threshold")]
    bundle_threshold_bytes: usize,
    #[serde(default = "default_poll_interval_ms")]
    poll_interval_ms: u64,
    #[serde(default = "default_connect_retry_ms")]
    connect_retry_ms: u64,
    #[serde(default)]
    debug_csv: Option<String>,
}

fn default_bundle_threshold() -> usize {
    1024 // 1KB
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_connect_retry_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize)]
struct RawBrokerConfig {
    #[serde(default = "default_topic")]
    topic: String,
    #[serde(default = "default_spool_dir")]
    spool_dir: String,
}

fn default_topic() -> String {
    "transactions".to_string()
}

fn default_spool_dir() -> String {
    "/tmp/txrelay/spool".to_string()
}

impl Default for RawBrokerConfig {
    fn default() -> Self {
        Self {
            topic: default_topic(),
            spool_dir: default_spool_dir(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawLoggingConfig {
    #[serde(default = "default_log_level")]
    level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RawLoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    store: RawStoreConfig,
    #[serde(default)]
    producer: RawProducerConfig,
    consumer: RawConsumerConfig,
    #[serde(default)]
    broker: RawBrokerConfig,
    #[serde(default)]
    logging: RawLoggingConfig,
    #[serde(default)]
    metrics_port: Option<u16>,
}

/// Validated shared store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub name: StoreName,
    pub capacity: StoreCapacity,
}

/// Validated producer settings.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub bulk_count: usize,
}

/// Validated consumer settings.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    pub rule_file: PathBuf,
    pub bundle_threshold_bytes: usize,
    pub poll_interval: Duration,
    pub connect_retry: Duration,
    /// When set, every relayed batch is also appended to this CSV file.
    pub debug_csv: Option<PathBuf>,
}

/// Validated broker settings.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub topic: TopicName,
    pub spool_dir: PathBuf,
}

/// Complete validated configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub store: StoreConfig,
    pub producer: ProducerConfig,
    pub consumer: ConsumerConfig,
    pub broker: BrokerConfig,
    pub log_level: String,
    pub metrics_port: Option<u16>,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Maximum records a single producer run may generate.
    pub const MAX_BULK_COUNT: usize = 1_000_000;

    /// Load and validate configuration from a YAML file.
    ///
    /// A relative `rule_file` or `debug_csv` is resolved against the
    /// directory holding the configuration file.
    pub fn load_file(path: impl AsRef<Path>) -> RelayResult<RelayConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(RelayError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RelayError::Io {
            context: "reading config file",
            source: e,
        })?;

        let mut config = Self::load_string(&content)?;

        if let Some(base) = path.parent() {
            config.consumer.rule_file = resolve(base, &config.consumer.rule_file);
            config.consumer.debug_csv = config
                .consumer
                .debug_csv
                .as_deref()
                .map(|csv| resolve(base, csv));
        }

        Ok(config)
    }

    /// Load and validate configuration from a YAML string.
    pub fn load_string(content: &str) -> RelayResult<RelayConfig> {
        let raw: RawConfig =
            serde_yaml::from_str(content).map_err(|e| RelayError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?;

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> RelayResult<RelayConfig> {
        let store = StoreConfig {
            name: StoreName::new(raw.store.name)?,
            capacity: StoreCapacity::new(raw.store.size_bytes)?,
        };

        let producer = Self::validate_producer(raw.producer)?;
        let consumer = Self::validate_consumer(raw.consumer)?;

        let broker = BrokerConfig {
            topic: TopicName::new(raw.broker.topic)?,
            spool_dir: PathBuf::from(raw.broker.spool_dir),
        };

        let log_level = Self::validate_log_level(raw.logging.level)?;

        if raw.metrics_port == Some(0) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "metrics_port",
                value: "0".to_string(),
                reason: "Port 0 is reserved and cannot be used".to_string(),
            }
            .into());
        }

        Ok(RelayConfig {
            store,
            producer,
            consumer,
            broker,
            log_level,
            metrics_port: raw.metrics_port,
        })
    }

    fn validate_producer(raw: RawProducerConfig) -> RelayResult<ProducerConfig> {
        if raw.bulk_count == 0 || raw.bulk_count > Self::MAX_BULK_COUNT {
            return Err(HardValidationError::InvalidFieldValue {
                field: "producer.bulk_count",
                value: raw.bulk_count.to_string(),
                reason: format!("Must be between 1 and {}", Self::MAX_BULK_COUNT),
            }
            .into());
        }

        Ok(ProducerConfig {
            bulk_count: raw.bulk_count,
        })
    }

    fn validate_consumer(raw: RawConsumerConfig) -> RelayResult<ConsumerConfig> {
        let rule_file = match raw.rule_file {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => {
                return Err(HardValidationError::MissingRequiredField {
                    field: "rule_file",
                    context: "consumer section".to_string(),
                }
                .into())
            }
        };

        if raw.bundle_threshold_bytes == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "consumer.bundle_threshold_bytes",
                value: "0".to_string(),
                reason: "Bundle threshold must be greater than 0".to_string(),
            }
            .into());
        }

        if raw.poll_interval_ms == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "consumer.poll_interval_ms",
                value: "0".to_string(),
                reason: "Poll interval must be greater than 0".to_string(),
            }
            .into());
        }

        if raw.connect_retry_ms == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "consumer.connect_retry_ms",
                value: "0".to_string(),
                reason: "Retry interval must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(ConsumerConfig {
            rule_file,
            bundle_threshold_bytes: raw.bundle_threshold_bytes,
            poll_interval: Duration::from_millis(raw.poll_interval_ms),
            connect_retry: Duration::from_millis(raw.connect_retry_ms),
            debug_csv: raw
                .debug_csv
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        })
    }

    fn validate_log_level(level: String) -> RelayResult<String> {
        let normalized = level.to_ascii_lowercase();
        match normalized.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(normalized),
            _ => Err(HardValidationError::InvalidFieldValue {
                field: "logging.level",
                value: level,
                reason: "Must be one of trace, debug, info, warn, error".to_string(),
            }
            .into()),
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        base.join(path)
    } else {
        path.to_path_buf()
    }
}
