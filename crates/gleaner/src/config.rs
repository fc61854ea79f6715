/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Service configuration.
//!
//! Loaded from a TOML file with per-field defaults, so a partial (or absent)
//! config file yields a fully usable configuration. Validation catches the
//! values that would make a subsystem misbehave silently.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GleanerConfig {
    pub database: DatabaseConfig,
    pub launcher: LauncherConfig,
    pub recovery: RecoveryConfig,
    pub harvest: HarvestConfig,
    pub steps: StepsConfig,
    pub outbox: OutboxConfig,
    pub trigger: TriggerConfig,
    pub broker: BrokerConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite path or URL
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "gleaner.db".to_string(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherConfig {
    /// Driver loop tick, milliseconds
    pub poll_interval_ms: u64,
    /// Concurrent pipeline executions; one worker preserves strict global
    /// ordering, more workers interleave subjects
    pub worker_slots: usize,
    /// Follow-up resubmission delay after a completed run, seconds
    pub success_interval_secs: u64,
    /// Follow-up resubmission delay after a failed run, seconds
    pub failure_interval_secs: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            worker_slots: 1,
            success_interval_secs: 2 * 60 * 60,
            failure_interval_secs: 60 * 60,
        }
    }
}

impl LauncherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn success_interval(&self) -> Duration {
        Duration::from_secs(self.success_interval_secs)
    }

    pub fn failure_interval(&self) -> Duration {
        Duration::from_secs(self.failure_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RecoveryConfig {
    /// Collection interval used to compute next-due times at startup, seconds
    pub interval_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            interval_secs: 2 * 60 * 60,
        }
    }
}

impl RecoveryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    pub graphql_url: String,
    /// Items requested per page
    pub page_size: u32,
    /// Log a warning when the reported remaining quota drops below this
    pub rate_limit_floor: i64,
    /// Per-request timeout, seconds
    pub request_timeout_secs: u64,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            graphql_url: "https://api.github.com/graphql".to_string(),
            page_size: 100,
            rate_limit_floor: 100,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct StepsConfig {
    /// Items processed per chunk in chunked steps
    pub chunk_size: usize,
    /// Automatic retries of the same chunk on transient errors
    pub retry_limit: u32,
    /// Item-level failures tolerated before a step is declared failed
    pub skip_limit: u32,
}

impl Default for StepsConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            retry_limit: 3,
            skip_limit: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OutboxConfig {
    /// Publisher tick, seconds
    pub publish_interval_secs: u64,
    /// Pending rows drained per tick
    pub batch_size: i64,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            publish_interval_secs: 5,
            batch_size: 100,
        }
    }
}

impl OutboxConfig {
    pub fn publish_interval(&self) -> Duration {
        Duration::from_secs(self.publish_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TriggerConfig {
    /// Stream/topic carrying collection triggers
    pub topic: String,
    pub consumer_group: String,
    pub consumer_name: String,
    /// Poll tick for the trigger source, milliseconds
    pub poll_interval_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            topic: "gleaner.collection.trigger".to_string(),
            consumer_group: "gleaner-harvester".to_string(),
            consumer_name: "gleaner-0".to_string(),
            poll_interval_ms: 1000,
        }
    }
}

impl TriggerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// Bootstrap servers for the Kafka producer/consumer
    pub servers: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            servers: "localhost:9092".to_string(),
        }
    }
}

impl GleanerConfig {
    /// Loads configuration from a TOML file.
    pub fn from_toml_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: GleanerConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates value ranges that would make a subsystem misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.launcher.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "launcher.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.launcher.worker_slots == 0 {
            return Err(ConfigError::Invalid(
                "launcher.worker_slots must be greater than zero".to_string(),
            ));
        }
        if self.steps.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "steps.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.steps.retry_limit == 0 {
            return Err(ConfigError::Invalid(
                "steps.retry_limit must be greater than zero".to_string(),
            ));
        }
        if self.outbox.batch_size <= 0 {
            return Err(ConfigError::Invalid(
                "outbox.batch_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
