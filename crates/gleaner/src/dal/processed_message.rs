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

//! Processed message DAL: the idempotency ledger.
//!
//! `apply_idempotent` is the consumer's correctness core: the ledger check,
//! the side effect, and the ledger insert run in one transaction on one
//! connection. A duplicate delivery either sees the committed ledger row
//! (and becomes a no-op) or collides with the primary key and rolls back.

use super::models::NewSqliteProcessedMessage;
use super::DAL;
use crate::database::schema::processed_messages;
use crate::database::universal_types::UniversalTimestamp;
use crate::error::{SideEffectError, ValidationError};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

/// Result of an idempotent application attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    /// The side effect ran and the ledger entry was recorded
    Applied,
    /// The message id was already in the ledger; nothing was re-applied
    Duplicate,
}

/// Data access layer for the processed message ledger.
#[derive(Clone)]
pub struct ProcessedMessageDAL<'a> {
    dal: &'a DAL,
}

impl<'a> ProcessedMessageDAL<'a> {
    /// Creates a new ProcessedMessageDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Checks whether a message id is already in the ledger.
    pub async fn exists(&self, message_id: &str) -> Result<bool, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let message_id = message_id.to_string();
        let count: i64 = conn
            .interact(move |conn| {
                processed_messages::table
                    .filter(processed_messages::message_id.eq(message_id))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(count > 0)
    }

    /// Applies a side effect exactly once for the given message id.
    ///
    /// Within a single transaction: re-checks the ledger (closing the race
    /// against a concurrent duplicate), runs `side_effect` on the same
    /// connection, and inserts the ledger row. Returns
    /// [`LedgerOutcome::Duplicate`] without running the side effect when the
    /// id is already recorded.
    pub async fn apply_idempotent<F>(
        &self,
        message_id: &str,
        event_type: &str,
        side_effect: F,
    ) -> Result<LedgerOutcome, SideEffectError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<(), SideEffectError> + Send + 'static,
    {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| SideEffectError::ConnectionPool(e.to_string()))?;

        let message_id = message_id.to_string();
        let event_type = event_type.to_string();
        let processed_at = UniversalTimestamp::now().to_rfc3339();

        let outcome: LedgerOutcome = conn
            .interact(move |conn| {
                conn.transaction::<_, SideEffectError, _>(|conn| {
                    let already: i64 = processed_messages::table
                        .filter(processed_messages::message_id.eq(&message_id))
                        .count()
                        .get_result(conn)?;

                    if already > 0 {
                        return Ok(LedgerOutcome::Duplicate);
                    }

                    side_effect(conn)?;

                    let ledger_row = NewSqliteProcessedMessage {
                        message_id,
                        event_type,
                        processed_at,
                    };
                    diesel::insert_into(processed_messages::table)
                        .values(&ledger_row)
                        .execute(conn)?;

                    Ok(LedgerOutcome::Applied)
                })
            })
            .await
            .map_err(|e| SideEffectError::ConnectionPool(e.to_string()))??;

        Ok(outcome)
    }

    /// Counts ledger entries (for monitoring and tests).
    pub async fn count(&self) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(move |conn| processed_messages::table.count().get_result(conn))
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }
}
