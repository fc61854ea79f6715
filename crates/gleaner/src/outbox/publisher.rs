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

//! Outbox Publisher
//!
//! Periodically drains `Pending` outbox rows, oldest first, in bounded
//! batches. Each row publishes independently: the broker's acknowledgment
//! moves it to `Published`, any error moves it to `Failed` and the batch
//! continues - one bad row never blocks the rest. `Failed` rows are not
//! retried automatically; requeueing them is an operator/backfill action,
//! which keeps the per-tick cost bounded and predictable.

use super::broker::{Broker, BrokerMessage};
use super::routing;
use crate::config::OutboxConfig;
use crate::dal::DAL;
use crate::error::PublisherError;
use crate::models::outbox_message::OutboxMessage;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time;
use tracing::{debug, error, info};

/// The outbox publisher.
pub struct OutboxPublisher {
    dal: DAL,
    broker: Arc<dyn Broker>,
    config: OutboxConfig,
}

impl OutboxPublisher {
    pub fn new(dal: DAL, broker: Arc<dyn Broker>, config: OutboxConfig) -> Self {
        Self {
            dal,
            broker,
            config,
        }
    }

    /// Publishes one batch of pending rows.
    ///
    /// Returns `(published, failed)` counts. Storage failures reading the
    /// batch surface as errors; per-row publish failures do not.
    pub async fn publish_pending(&self) -> Result<(usize, usize), PublisherError> {
        let pending = self
            .dal
            .outbox_message()
            .list_pending(self.config.batch_size)
            .await?;

        if pending.is_empty() {
            return Ok((0, 0));
        }
        debug!("Publishing {} pending outbox rows", pending.len());

        let mut published = 0;
        let mut failed = 0;
        for message in pending {
            match self.publish_one(&message).await {
                Ok(()) => {
                    self.dal.outbox_message().mark_published(message.id).await?;
                    info!(
                        "Published outbox row: message_id={}, type={}",
                        message.message_id, message.event_type
                    );
                    published += 1;
                }
                Err(e) => {
                    error!(
                        "Failed to publish outbox row: message_id={}, type={}: {}",
                        message.message_id, message.event_type, e
                    );
                    self.dal.outbox_message().mark_failed(message.id).await?;
                    failed += 1;
                }
            }
        }
        Ok((published, failed))
    }

    /// Publishes one row after resolving its destination.
    ///
    /// The stored destination is re-validated against the allow-list: a row
    /// carrying an unmapped event type was created by code this publisher
    /// does not know, and publishing it blind would misroute it.
    async fn publish_one(&self, message: &OutboxMessage) -> Result<(), PublisherError> {
        let destination = routing::destination_for(&message.event_type)
            .ok_or_else(|| PublisherError::UnmappedEventType(message.event_type.clone()))?;

        self.broker
            .publish(BrokerMessage {
                exchange: destination.exchange.to_string(),
                routing_key: destination.routing_key.to_string(),
                message_id: message.message_id.clone(),
                event_type: message.event_type.clone(),
                payload: message.payload.clone().into_bytes(),
            })
            .await
    }

    /// Runs the publisher loop until shutdown is signalled.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting outbox publisher (interval: {:?}, batch size: {})",
            self.config.publish_interval(),
            self.config.batch_size
        );
        let mut interval = time::interval(self.config.publish_interval());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.publish_pending().await {
                        error!("Outbox publish tick failed: {}", e);
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Outbox publisher stopped");
    }
}
