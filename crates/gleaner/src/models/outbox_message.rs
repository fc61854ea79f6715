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

//! Outbox message model.
//!
//! Rows are created in the same transaction as the domain state change they
//! describe (write-ahead of the event) and mutated only by the publisher:
//! `Pending` to `Published` on broker acknowledgment, `Pending` to `Failed`
//! on any publish error. Rows are retained for audit rather than deleted.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use serde::{Deserialize, Serialize};

/// Publication status of an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxStatus {
    /// Not yet handed to the broker
    Pending,
    /// The broker acknowledged the publish
    Published,
    /// A publish attempt failed; requeueing is an operator action
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "Pending",
            OutboxStatus::Published => "Published",
            OutboxStatus::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Pending" => Some(OutboxStatus::Pending),
            "Published" => Some(OutboxStatus::Published),
            "Failed" => Some(OutboxStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A domain event awaiting (or past) publication (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxMessage {
    pub id: UniversalUuid,
    /// Caller-assigned idempotency key; unique, never reused for a
    /// semantically different event
    pub message_id: String,
    pub exchange: String,
    pub routing_key: String,
    pub event_type: String,
    /// Opaque serialized event body, forwarded byte-for-byte
    pub payload: String,
    pub status: OutboxStatus,
    pub created_at: UniversalTimestamp,
    pub published_at: Option<UniversalTimestamp>,
}

/// Structure for creating new outbox rows.
///
/// Status starts as `Pending`; `message_id` defaults to a fresh v4 UUID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOutboxMessage {
    pub message_id: String,
    pub exchange: String,
    pub routing_key: String,
    pub event_type: String,
    pub payload: String,
}

impl NewOutboxMessage {
    /// Builds a new outbox row with a generated message id, resolving the
    /// destination from the event type's routing entry.
    pub fn for_event(event_type: &str, exchange: &str, routing_key: &str, payload: String) -> Self {
        Self {
            message_id: UniversalUuid::new_v4().to_string(),
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            event_type: event_type.to_string(),
            payload,
        }
    }
}
