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

//! Broker abstraction for outbox publishing.
//!
//! The publisher only needs "hand this payload to this destination and tell
//! me whether it was accepted". The Kafka implementation (behind the `kafka`
//! feature) is the production path; the in-memory broker backs tests and
//! single-process deployments.

use crate::error::PublisherError;
use async_trait::async_trait;
use std::sync::Mutex;

/// One message handed to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub exchange: String,
    pub routing_key: String,
    /// Caller-assigned idempotency key, carried as message metadata
    pub message_id: String,
    pub event_type: String,
    /// Opaque event body, forwarded byte-for-byte
    pub payload: Vec<u8>,
}

/// Publishes messages to a broker.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publishes one message; returns once the broker acknowledged it.
    async fn publish(&self, message: BrokerMessage) -> Result<(), PublisherError>;
}

/// In-memory broker for tests and single-process setups.
///
/// Published messages accumulate in order; a configurable rejection hook
/// simulates broker failures.
#[derive(Default)]
pub struct InMemoryBroker {
    published: Mutex<Vec<BrokerMessage>>,
    reject_routing_keys: Mutex<Vec<String>>,
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes publishes to the given routing key fail.
    pub fn reject_routing_key(&self, routing_key: impl Into<String>) {
        self.reject_routing_keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(routing_key.into());
    }

    /// All messages accepted so far, in publish order.
    pub fn published(&self) -> Vec<BrokerMessage> {
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl Broker for InMemoryBroker {
    async fn publish(&self, message: BrokerMessage) -> Result<(), PublisherError> {
        let rejected = self
            .reject_routing_keys
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&message.routing_key);
        if rejected {
            return Err(PublisherError::Broker(format!(
                "routing key '{}' rejected",
                message.routing_key
            )));
        }
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message);
        Ok(())
    }
}

/// Kafka broker over `rdkafka`'s Tokio-aware producer.
///
/// Exchanges map to topics and the routing key travels as the record key, so
/// per-subject ordering within a partition is preserved.
#[cfg(feature = "kafka")]
pub mod kafka {
    use super::{Broker, BrokerMessage};
    use crate::config::BrokerConfig;
    use crate::error::PublisherError;
    use async_trait::async_trait;
    use rdkafka::config::ClientConfig;
    use rdkafka::message::{Header, OwnedHeaders};
    use rdkafka::producer::{FutureProducer, FutureRecord};
    use std::time::Duration;

    pub struct KafkaBroker {
        producer: FutureProducer,
    }

    impl KafkaBroker {
        pub fn new(config: &BrokerConfig) -> Result<Self, PublisherError> {
            let producer: FutureProducer = ClientConfig::new()
                .set("bootstrap.servers", &config.servers)
                .set("message.timeout.ms", "5000")
                .create()
                .map_err(|e| PublisherError::Broker(e.to_string()))?;
            Ok(Self { producer })
        }
    }

    #[async_trait]
    impl Broker for KafkaBroker {
        async fn publish(&self, message: BrokerMessage) -> Result<(), PublisherError> {
            let headers = OwnedHeaders::new()
                .insert(Header {
                    key: "message_id",
                    value: Some(message.message_id.as_str()),
                })
                .insert(Header {
                    key: "event_type",
                    value: Some(message.event_type.as_str()),
                });

            let record = FutureRecord::to(&message.exchange)
                .key(&message.routing_key)
                .headers(headers)
                .payload(&message.payload);

            self.producer
                .send(record, Duration::from_secs(5))
                .await
                .map_err(|(e, _)| PublisherError::Broker(e.to_string()))?;
            Ok(())
        }
    }
}

#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
