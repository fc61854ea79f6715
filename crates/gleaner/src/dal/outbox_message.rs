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

//! Outbox message DAL.
//!
//! Rows are selected oldest-first in bounded batches so one publisher tick
//! never monopolizes resources under backlog. Status moves `Pending` to
//! `Published` or `Failed`; `Failed` rows are left for operator requeue.

use super::models::{NewSqliteOutboxMessage, SqliteOutboxMessage};
use super::DAL;
use crate::database::schema::outbox_messages;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::ValidationError;
use crate::models::outbox_message::{NewOutboxMessage, OutboxMessage, OutboxStatus};
use diesel::prelude::*;

/// Data access layer for the transactional outbox.
#[derive(Clone)]
pub struct OutboxMessageDAL<'a> {
    dal: &'a DAL,
}

impl<'a> OutboxMessageDAL<'a> {
    /// Creates a new OutboxMessageDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a new outbox row in the `Pending` status.
    ///
    /// Producers co-locating the event with a domain change should prefer
    /// transaction-scoped insertion (see
    /// `CollectionMetadataDAL::finalize_collection`); this standalone create
    /// exists for events with no accompanying state change.
    pub async fn create(&self, new_message: NewOutboxMessage) -> Result<OutboxMessage, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let now = UniversalTimestamp::now();
        let new_row = NewSqliteOutboxMessage {
            id: UniversalUuid::new_v4().as_bytes().to_vec(),
            message_id: new_message.message_id,
            exchange: new_message.exchange,
            routing_key: new_message.routing_key,
            event_type: new_message.event_type,
            payload: new_message.payload,
            status: OutboxStatus::Pending.as_str().to_string(),
            created_at: now.to_rfc3339(),
        };

        let row: SqliteOutboxMessage = conn
            .interact(move |conn| {
                diesel::insert_into(outbox_messages::table)
                    .values(&new_row)
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        row.try_into()
    }

    /// Lists up to `limit` pending rows, oldest first.
    pub async fn list_pending(&self, limit: i64) -> Result<Vec<OutboxMessage>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let rows: Vec<SqliteOutboxMessage> = conn
            .interact(move |conn| {
                outbox_messages::table
                    .filter(outbox_messages::status.eq(OutboxStatus::Pending.as_str()))
                    .order(outbox_messages::created_at.asc())
                    .limit(limit)
                    .load(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Marks a row `Published`, stamping `published_at`.
    pub async fn mark_published(&self, id: UniversalUuid) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let key = id.as_bytes().to_vec();
        let now = UniversalTimestamp::now().to_rfc3339();
        conn.interact(move |conn| {
            diesel::update(outbox_messages::table.filter(outbox_messages::id.eq(key)))
                .set((
                    outbox_messages::status.eq(OutboxStatus::Published.as_str()),
                    outbox_messages::published_at.eq(Some(now)),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Marks a row `Failed`.
    pub async fn mark_failed(&self, id: UniversalUuid) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let key = id.as_bytes().to_vec();
        conn.interact(move |conn| {
            diesel::update(outbox_messages::table.filter(outbox_messages::id.eq(key)))
                .set(outbox_messages::status.eq(OutboxStatus::Failed.as_str()))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Fetches a row by its message id.
    pub async fn get_by_message_id(
        &self,
        message_id: &str,
    ) -> Result<Option<OutboxMessage>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let message_id = message_id.to_string();
        let row: Option<SqliteOutboxMessage> = conn
            .interact(move |conn| {
                outbox_messages::table
                    .filter(outbox_messages::message_id.eq(message_id))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        row.map(TryInto::try_into).transpose()
    }

    /// Counts rows in the given status (for monitoring and tests).
    pub async fn count_with_status(&self, status: OutboxStatus) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(move |conn| {
                outbox_messages::table
                    .filter(outbox_messages::status.eq(status.as_str()))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }
}
