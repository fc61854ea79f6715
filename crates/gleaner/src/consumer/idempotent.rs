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

//! Idempotent Event Consumer
//!
//! Guards the broker's at-least-once delivery with the processed-message
//! ledger. A delivery whose `message_id` is already recorded acknowledges
//! immediately without re-applying anything - duplicate delivery is expected
//! under at-least-once transport and must be a no-op, not an error.
//!
//! First-time deliveries run their handler's side effect and the ledger
//! insert in one local transaction, then acknowledge. A failed transaction
//! dead-letters the delivery (never requeued to self), so a poison message
//! cannot loop forever against this consumer.

use crate::dal::{LedgerOutcome, DAL};
use crate::error::SideEffectError;
use diesel::sqlite::SqliteConnection;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One inbound broker delivery.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Caller-assigned idempotency key
    pub message_id: String,
    pub event_type: String,
    pub payload: String,
}

/// The consumer's decision for a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Acknowledge: the side effect is applied (now or previously)
    Ack,
    /// Negative-acknowledge without requeue; route to the dead-letter path
    DeadLetter,
}

/// A side-effect handler for one event type.
///
/// `apply` runs inside the ledger transaction on the consumer's database
/// connection, so everything it writes commits atomically with the
/// idempotency record.
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> &'static str;

    fn apply(&self, conn: &mut SqliteConnection, delivery: &Delivery)
        -> Result<(), SideEffectError>;
}

/// The idempotent consumer.
pub struct IdempotentConsumer {
    dal: DAL,
    handlers: HashMap<&'static str, Arc<dyn EventHandler>>,
}

impl IdempotentConsumer {
    pub fn new(dal: DAL) -> Self {
        Self {
            dal,
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler for its event type, replacing any previous one.
    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        let event_type = handler.event_type();
        if self.handlers.insert(event_type, handler).is_some() {
            warn!("Replaced existing handler for event type '{}'", event_type);
        } else {
            debug!("Registered handler for event type '{}'", event_type);
        }
    }

    /// Processes one delivery and returns the ack/dead-letter verdict.
    pub async fn process(&self, delivery: Delivery) -> Verdict {
        // Fast path: duplicate deliveries ack without touching the handler.
        match self.dal.processed_message().exists(&delivery.message_id).await {
            Ok(true) => {
                debug!(
                    "Duplicate delivery {} ({}), acknowledging without re-applying",
                    delivery.message_id, delivery.event_type
                );
                return Verdict::Ack;
            }
            Ok(false) => {}
            Err(e) => {
                error!(
                    "Ledger check failed for {} ({}): {}",
                    delivery.message_id, delivery.event_type, e
                );
                return Verdict::DeadLetter;
            }
        }

        let Some(handler) = self.handlers.get(delivery.event_type.as_str()) else {
            error!(
                "No handler for event type '{}' (message {}), dead-lettering",
                delivery.event_type, delivery.message_id
            );
            return Verdict::DeadLetter;
        };

        let handler = Arc::clone(handler);
        let handler_delivery = delivery.clone();
        let outcome = self
            .dal
            .processed_message()
            .apply_idempotent(&delivery.message_id, &delivery.event_type, move |conn| {
                handler.apply(conn, &handler_delivery)
            })
            .await;

        match outcome {
            Ok(LedgerOutcome::Applied) => {
                info!(
                    "Applied side effect for {} ({})",
                    delivery.message_id, delivery.event_type
                );
                Verdict::Ack
            }
            Ok(LedgerOutcome::Duplicate) => {
                // Raced another delivery of the same message; its commit wins.
                debug!(
                    "Delivery {} applied concurrently elsewhere, acknowledging",
                    delivery.message_id
                );
                Verdict::Ack
            }
            Err(e) => {
                error!(
                    "Side-effect transaction failed for {} ({}): {}",
                    delivery.message_id, delivery.event_type, e
                );
                Verdict::DeadLetter
            }
        }
    }
}
