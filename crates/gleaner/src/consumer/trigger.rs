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

//! Trigger Ingestion
//!
//! Consumes "please collect now" signals from an append-only stream with
//! consumer-group semantics and forwards them to the launcher at HIGH
//! priority. Delivery is at-least-once: the launcher's submit dedup absorbs
//! duplicates, and per-group read offsets mean a crashed consumer resumes
//! from its last unacknowledged entry rather than the log head or tail.
//!
//! A malformed entry (missing or non-numeric `userId`) is logged and
//! acknowledged - retrying an entry that cannot parse will never succeed.

use crate::config::TriggerConfig;
use crate::error::ConsumerError;
use crate::launcher::{JobPriority, PriorityJobLauncher};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info, warn};

/// One entry from the trigger stream.
#[derive(Debug, Clone)]
pub struct TriggerEntry {
    pub entry_id: String,
    pub fields: HashMap<String, String>,
}

/// A consumer-group view of the trigger stream.
#[async_trait]
pub trait TriggerSource: Send + Sync {
    /// Entries delivered to this consumer but not yet acknowledged, replayed
    /// at startup.
    async fn read_pending(&self) -> Result<Vec<TriggerEntry>, ConsumerError>;

    /// Reads up to `max` new entries, advancing the group's delivery point.
    async fn read_batch(&self, max: usize) -> Result<Vec<TriggerEntry>, ConsumerError>;

    /// Acknowledges one entry as fully handled.
    async fn ack(&self, entry_id: &str) -> Result<(), ConsumerError>;
}

/// Forwards trigger entries to the launcher.
pub struct TriggerIngestor {
    source: Arc<dyn TriggerSource>,
    launcher: PriorityJobLauncher,
    config: TriggerConfig,
}

impl TriggerIngestor {
    pub fn new(
        source: Arc<dyn TriggerSource>,
        launcher: PriorityJobLauncher,
        config: TriggerConfig,
    ) -> Self {
        Self {
            source,
            launcher,
            config,
        }
    }

    /// Replays entries left unacknowledged by a previous incarnation.
    pub async fn recover_pending(&self) -> Result<usize, ConsumerError> {
        let pending = self.source.read_pending().await?;
        if pending.is_empty() {
            info!("No pending trigger entries to recover");
            return Ok(0);
        }

        info!("Recovering {} pending trigger entries", pending.len());
        let count = pending.len();
        for entry in pending {
            self.handle_entry(entry).await?;
        }
        Ok(count)
    }

    /// Reads and handles one batch of new entries.
    pub async fn poll_once(&self) -> Result<usize, ConsumerError> {
        let batch = self.source.read_batch(64).await?;
        let count = batch.len();
        for entry in batch {
            self.handle_entry(entry).await?;
        }
        Ok(count)
    }

    /// Handles one entry: parse, submit HIGH, acknowledge.
    ///
    /// Malformed entries are acknowledged without submission; duplicate
    /// submissions are absorbed by the launcher's dedup and acknowledged
    /// all the same.
    async fn handle_entry(&self, entry: TriggerEntry) -> Result<(), ConsumerError> {
        match parse_subject_id(&entry) {
            Some(subject_id) => {
                info!("Received collection trigger for subject {}", subject_id);
                self.launcher.submit(subject_id, JobPriority::High);
            }
            None => {
                warn!(
                    "Trigger entry {} has missing or non-numeric userId, skipping: {:?}",
                    entry.entry_id, entry.fields
                );
            }
        }
        self.source.ack(&entry.entry_id).await
    }

    /// Runs recovery then the poll loop until shutdown is signalled.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting trigger ingestion (topic: {}, group: {}, consumer: {})",
            self.config.topic, self.config.consumer_group, self.config.consumer_name
        );

        if let Err(e) = self.recover_pending().await {
            error!("Pending trigger recovery failed: {}", e);
        }

        let mut interval = time::interval(self.config.poll_interval());
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.poll_once().await {
                        Ok(0) => {}
                        Ok(n) => debug!("Handled {} trigger entries", n),
                        Err(e) => error!("Trigger poll failed: {}", e),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Trigger ingestion stopped");
    }
}

fn parse_subject_id(entry: &TriggerEntry) -> Option<i64> {
    entry.fields.get("userId")?.parse::<i64>().ok()
}

/// In-memory trigger source for tests and single-process setups.
///
/// Models consumer-group semantics: `read_batch` moves entries to the
/// delivered-unacknowledged set, `ack` clears them, and `read_pending`
/// replays whatever is still unacknowledged.
#[derive(Default)]
pub struct InMemoryTriggerSource {
    inner: std::sync::Mutex<InMemorySourceState>,
}

#[derive(Default)]
struct InMemorySourceState {
    new_entries: std::collections::VecDeque<TriggerEntry>,
    unacknowledged: HashMap<String, TriggerEntry>,
    next_id: u64,
}

impl InMemoryTriggerSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry to the stream, returning its id.
    pub fn append(&self, fields: HashMap<String, String>) -> String {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let entry_id = format!("{}-0", inner.next_id);
        inner.next_id += 1;
        inner.new_entries.push_back(TriggerEntry {
            entry_id: entry_id.clone(),
            fields,
        });
        entry_id
    }

    /// Convenience: appends a `{userId}` trigger.
    pub fn append_user_trigger(&self, user_id: impl std::fmt::Display) -> String {
        let mut fields = HashMap::new();
        fields.insert("userId".to_string(), user_id.to_string());
        self.append(fields)
    }

    /// Marks an entry as delivered-but-unacknowledged, as if a previous
    /// consumer crashed mid-handling.
    pub fn seed_unacknowledged(&self, fields: HashMap<String, String>) -> String {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let entry_id = format!("{}-0", inner.next_id);
        inner.next_id += 1;
        inner.unacknowledged.insert(
            entry_id.clone(),
            TriggerEntry {
                entry_id: entry_id.clone(),
                fields,
            },
        );
        entry_id
    }

    /// Ids of entries still awaiting acknowledgment.
    pub fn unacknowledged_ids(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.unacknowledged.keys().cloned().collect()
    }
}

#[async_trait]
impl TriggerSource for InMemoryTriggerSource {
    async fn read_pending(&self) -> Result<Vec<TriggerEntry>, ConsumerError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.unacknowledged.values().cloned().collect())
    }

    async fn read_batch(&self, max: usize) -> Result<Vec<TriggerEntry>, ConsumerError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(entry) = inner.new_entries.pop_front() else { break };
            inner
                .unacknowledged
                .insert(entry.entry_id.clone(), entry.clone());
            batch.push(entry);
        }
        Ok(batch)
    }

    async fn ack(&self, entry_id: &str) -> Result<(), ConsumerError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.unacknowledged.remove(entry_id);
        Ok(())
    }
}

/// Kafka-backed trigger source (consumer group over the trigger topic).
///
/// Offset commits are the acknowledgment: a crashed consumer resumes from
/// the group's committed offset, so `read_pending` is empty by construction
/// - redelivery of uncommitted entries happens through the normal poll path.
#[cfg(feature = "kafka")]
pub mod kafka {
    use super::{TriggerEntry, TriggerSource};
    use crate::config::{BrokerConfig, TriggerConfig};
    use crate::error::ConsumerError;
    use async_trait::async_trait;
    use rdkafka::config::ClientConfig;
    use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
    use rdkafka::Message;
    use std::collections::HashMap;
    use std::time::Duration;

    pub struct KafkaTriggerSource {
        consumer: StreamConsumer,
        poll_timeout: Duration,
    }

    impl KafkaTriggerSource {
        pub fn new(broker: &BrokerConfig, trigger: &TriggerConfig) -> Result<Self, ConsumerError> {
            let consumer: StreamConsumer = ClientConfig::new()
                .set("bootstrap.servers", &broker.servers)
                .set("group.id", &trigger.consumer_group)
                .set("client.id", &trigger.consumer_name)
                .set("enable.auto.commit", "false")
                .set("auto.offset.reset", "earliest")
                .create()
                .map_err(|e| ConsumerError::Source(e.to_string()))?;
            consumer
                .subscribe(&[trigger.topic.as_str()])
                .map_err(|e| ConsumerError::Source(e.to_string()))?;
            Ok(Self {
                consumer,
                poll_timeout: trigger.poll_interval(),
            })
        }
    }

    #[async_trait]
    impl TriggerSource for KafkaTriggerSource {
        async fn read_pending(&self) -> Result<Vec<TriggerEntry>, ConsumerError> {
            // Uncommitted entries are redelivered by the group coordinator on
            // the regular poll path.
            Ok(Vec::new())
        }

        async fn read_batch(&self, max: usize) -> Result<Vec<TriggerEntry>, ConsumerError> {
            let mut batch = Vec::new();
            while batch.len() < max {
                let message = match tokio::time::timeout(self.poll_timeout, self.consumer.recv())
                    .await
                {
                    Err(_) => break,
                    Ok(Err(e)) => return Err(ConsumerError::Source(e.to_string())),
                    Ok(Ok(message)) => message,
                };

                let mut fields = HashMap::new();
                if let Some(Ok(payload)) = message.payload_view::<str>() {
                    if let Ok(serde_json::Value::Object(map)) =
                        serde_json::from_str::<serde_json::Value>(payload)
                    {
                        for (key, value) in map {
                            let value = match value {
                                serde_json::Value::String(s) => s,
                                other => other.to_string(),
                            };
                            fields.insert(key, value);
                        }
                    }
                }

                batch.push(TriggerEntry {
                    entry_id: format!("{}-{}", message.partition(), message.offset()),
                    fields,
                });
            }
            Ok(batch)
        }

        async fn ack(&self, _entry_id: &str) -> Result<(), ConsumerError> {
            self.consumer
                .commit_consumer_state(CommitMode::Async)
                .map_err(|e| ConsumerError::Source(e.to_string()))
        }
    }
}

#[cfg(feature = "kafka")]
pub use kafka::KafkaTriggerSource;
