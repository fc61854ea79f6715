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

//! Collection metadata DAL.
//!
//! `finalize_collection` is the write-ahead point of the outbox pattern: the
//! metadata bump and the completion event row commit in one transaction, so
//! a run that recorded its bookkeeping has always also queued its event.

use super::models::{NewSqliteCollectionMetadata, NewSqliteOutboxMessage, SqliteCollectionMetadata};
use super::DAL;
use crate::database::schema::{collection_metadata, outbox_messages};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::ValidationError;
use crate::models::collection_metadata::{CollectionCursors, CollectionMetadata};
use crate::models::outbox_message::{NewOutboxMessage, OutboxStatus};
use diesel::prelude::*;

/// Data access layer for per-subject collection bookkeeping.
#[derive(Clone)]
pub struct CollectionMetadataDAL<'a> {
    dal: &'a DAL,
}

impl<'a> CollectionMetadataDAL<'a> {
    /// Creates a new CollectionMetadataDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Fetches the metadata row for a subject, if one exists yet.
    pub async fn get(&self, subject_id: i64) -> Result<Option<CollectionMetadata>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let row: Option<SqliteCollectionMetadata> = conn
            .interact(move |conn| {
                collection_metadata::table
                    .filter(collection_metadata::subject_id.eq(subject_id))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        row.map(TryInto::try_into).transpose()
    }

    /// Records a successful collection run and queues its completion event
    /// in one transaction.
    ///
    /// The metadata row is created lazily on first collection. Collection
    /// timestamps never move backwards: an earlier wall clock (skew, restore
    /// from backup) leaves the stored value in place. Cursors overwrite
    /// unconditionally - the newest opaque token is always the resume point.
    pub async fn finalize_collection(
        &self,
        subject_id: i64,
        cursors: CollectionCursors,
        event: NewOutboxMessage,
    ) -> Result<CollectionMetadata, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let now = UniversalTimestamp::now();
        let now_str = now.to_rfc3339();

        let row: SqliteCollectionMetadata = conn
            .interact(move |conn| {
                conn.transaction::<_, ValidationError, _>(|conn| {
                    let existing: Option<SqliteCollectionMetadata> = collection_metadata::table
                        .filter(collection_metadata::subject_id.eq(subject_id))
                        .first(conn)
                        .optional()?;

                    let updated = match existing {
                        Some(current) => {
                            // Monotonic guard: RFC3339 UTC strings compare
                            // chronologically, so string max preserves order.
                            let last_full = match current.last_full_collection_at {
                                Some(prev) if prev.as_str() > now_str.as_str() => prev,
                                _ => now_str.clone(),
                            };
                            diesel::update(
                                collection_metadata::table
                                    .filter(collection_metadata::subject_id.eq(subject_id)),
                            )
                            .set((
                                collection_metadata::last_full_collection_at.eq(Some(last_full)),
                                collection_metadata::last_incremental_at.eq(Some(now_str.clone())),
                                collection_metadata::repo_cursor.eq(cursors.repo_cursor.clone()),
                                collection_metadata::commit_cursor
                                    .eq(cursors.commit_cursor.clone()),
                                collection_metadata::issue_cursor.eq(cursors.issue_cursor.clone()),
                                collection_metadata::pull_request_cursor
                                    .eq(cursors.pull_request_cursor.clone()),
                                collection_metadata::updated_at.eq(now_str.clone()),
                            ))
                            .get_result::<SqliteCollectionMetadata>(conn)?
                        }
                        None => {
                            let new_row = NewSqliteCollectionMetadata {
                                id: UniversalUuid::new_v4().as_bytes().to_vec(),
                                subject_id,
                                last_full_collection_at: Some(now_str.clone()),
                                last_incremental_at: Some(now_str.clone()),
                                repo_cursor: cursors.repo_cursor.clone(),
                                commit_cursor: cursors.commit_cursor.clone(),
                                issue_cursor: cursors.issue_cursor.clone(),
                                pull_request_cursor: cursors.pull_request_cursor.clone(),
                                created_at: now_str.clone(),
                                updated_at: now_str.clone(),
                            };
                            diesel::insert_into(collection_metadata::table)
                                .values(&new_row)
                                .get_result::<SqliteCollectionMetadata>(conn)?
                        }
                    };

                    // Write-ahead of the event: same transaction as the state change.
                    let outbox_row = NewSqliteOutboxMessage {
                        id: UniversalUuid::new_v4().as_bytes().to_vec(),
                        message_id: event.message_id,
                        exchange: event.exchange,
                        routing_key: event.routing_key,
                        event_type: event.event_type,
                        payload: event.payload,
                        status: OutboxStatus::Pending.as_str().to_string(),
                        created_at: now_str.clone(),
                    };
                    diesel::insert_into(outbox_messages::table)
                        .values(&outbox_row)
                        .execute(conn)?;

                    Ok(updated)
                })
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        row.try_into()
    }
}
