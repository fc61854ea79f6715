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

//! SQLite row structs.
//!
//! These models use SQLite-compatible types: UUIDs as BLOB (`Vec<u8>`),
//! timestamps as TEXT (RFC3339 strings). They are used internally by the DAL
//! and converted to/from domain types at the DAL boundary.

use crate::database::schema::*;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::ValidationError;
use crate::models::collection_metadata::{CollectionCursors, CollectionMetadata};
use crate::models::harvested_fact::{FactKind, HarvestedFact};
use crate::models::job_execution::{JobExecution, JobOutcome};
use crate::models::outbox_message::{OutboxMessage, OutboxStatus};
use crate::models::processed_message::ProcessedMessage;
use crate::models::subject::Subject;
use diesel::prelude::*;

pub(crate) fn decode_uuid(bytes: &[u8]) -> Result<UniversalUuid, ValidationError> {
    UniversalUuid::from_bytes(bytes).map_err(|e| ValidationError::CorruptRow {
        message: format!("invalid uuid blob: {}", e),
    })
}

pub(crate) fn decode_ts(s: &str) -> Result<UniversalTimestamp, ValidationError> {
    UniversalTimestamp::from_rfc3339(s).map_err(|e| ValidationError::CorruptRow {
        message: format!("invalid timestamp '{}': {}", s, e),
    })
}

pub(crate) fn decode_ts_opt(s: Option<&str>) -> Result<Option<UniversalTimestamp>, ValidationError> {
    s.map(decode_ts).transpose()
}

// ============================================================================
// Subject Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = subjects)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteSubject {
    pub id: i64,
    pub github_login: String,
    pub github_token: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = subjects)]
pub struct NewSqliteSubject {
    pub id: i64,
    pub github_login: String,
    pub github_token: Option<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteSubject> for Subject {
    type Error = ValidationError;

    fn try_from(row: SqliteSubject) -> Result<Self, Self::Error> {
        Ok(Subject {
            id: row.id,
            github_login: row.github_login,
            github_token: row.github_token,
            active: row.active,
            created_at: decode_ts(&row.created_at)?,
            updated_at: decode_ts(&row.updated_at)?,
        })
    }
}

// ============================================================================
// Job Execution Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = job_executions)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteJobExecution {
    pub id: Vec<u8>,
    pub subject_id: i64,
    pub run_id: String,
    pub outcome: String,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub error_details: Option<String>,
    pub steps_completed: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = job_executions)]
pub struct NewSqliteJobExecution {
    pub id: Vec<u8>,
    pub subject_id: i64,
    pub run_id: String,
    pub outcome: String,
    pub started_at: String,
    pub steps_completed: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteJobExecution> for JobExecution {
    type Error = ValidationError;

    fn try_from(row: SqliteJobExecution) -> Result<Self, Self::Error> {
        let outcome = JobOutcome::parse(&row.outcome).ok_or(ValidationError::CorruptRow {
            message: format!("unknown job outcome '{}'", row.outcome),
        })?;
        Ok(JobExecution {
            id: decode_uuid(&row.id)?,
            subject_id: row.subject_id,
            run_id: row.run_id,
            outcome,
            started_at: decode_ts(&row.started_at)?,
            ended_at: decode_ts_opt(row.ended_at.as_deref())?,
            error_details: row.error_details,
            steps_completed: row.steps_completed,
            created_at: decode_ts(&row.created_at)?,
            updated_at: decode_ts(&row.updated_at)?,
        })
    }
}

// ============================================================================
// Harvested Fact Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = harvested_facts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteHarvestedFact {
    pub id: Vec<u8>,
    pub subject_id: i64,
    pub source_repository: String,
    pub natural_id: String,
    pub fact_type: String,
    pub title: Option<String>,
    pub occurred_at: Option<String>,
    pub payload: String,
    pub collected_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = harvested_facts)]
pub struct NewSqliteHarvestedFact {
    pub id: Vec<u8>,
    pub subject_id: i64,
    pub source_repository: String,
    pub natural_id: String,
    pub fact_type: String,
    pub title: Option<String>,
    pub occurred_at: Option<String>,
    pub payload: String,
    pub collected_at: String,
}

impl TryFrom<SqliteHarvestedFact> for HarvestedFact {
    type Error = ValidationError;

    fn try_from(row: SqliteHarvestedFact) -> Result<Self, Self::Error> {
        let fact_type = FactKind::parse(&row.fact_type).ok_or(ValidationError::CorruptRow {
            message: format!("unknown fact type '{}'", row.fact_type),
        })?;
        Ok(HarvestedFact {
            id: decode_uuid(&row.id)?,
            subject_id: row.subject_id,
            source_repository: row.source_repository,
            natural_id: row.natural_id,
            fact_type,
            title: row.title,
            occurred_at: decode_ts_opt(row.occurred_at.as_deref())?,
            payload: row.payload,
            collected_at: decode_ts(&row.collected_at)?,
        })
    }
}

// ============================================================================
// Collection Metadata Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = collection_metadata)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteCollectionMetadata {
    pub id: Vec<u8>,
    pub subject_id: i64,
    pub last_full_collection_at: Option<String>,
    pub last_incremental_at: Option<String>,
    pub repo_cursor: Option<String>,
    pub commit_cursor: Option<String>,
    pub issue_cursor: Option<String>,
    pub pull_request_cursor: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = collection_metadata)]
pub struct NewSqliteCollectionMetadata {
    pub id: Vec<u8>,
    pub subject_id: i64,
    pub last_full_collection_at: Option<String>,
    pub last_incremental_at: Option<String>,
    pub repo_cursor: Option<String>,
    pub commit_cursor: Option<String>,
    pub issue_cursor: Option<String>,
    pub pull_request_cursor: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<SqliteCollectionMetadata> for CollectionMetadata {
    type Error = ValidationError;

    fn try_from(row: SqliteCollectionMetadata) -> Result<Self, Self::Error> {
        Ok(CollectionMetadata {
            id: decode_uuid(&row.id)?,
            subject_id: row.subject_id,
            last_full_collection_at: decode_ts_opt(row.last_full_collection_at.as_deref())?,
            last_incremental_at: decode_ts_opt(row.last_incremental_at.as_deref())?,
            cursors: CollectionCursors {
                repo_cursor: row.repo_cursor,
                commit_cursor: row.commit_cursor,
                issue_cursor: row.issue_cursor,
                pull_request_cursor: row.pull_request_cursor,
            },
            created_at: decode_ts(&row.created_at)?,
            updated_at: decode_ts(&row.updated_at)?,
        })
    }
}

// ============================================================================
// Outbox Message Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = outbox_messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteOutboxMessage {
    pub id: Vec<u8>,
    pub message_id: String,
    pub exchange: String,
    pub routing_key: String,
    pub event_type: String,
    pub payload: String,
    pub status: String,
    pub created_at: String,
    pub published_at: Option<String>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = outbox_messages)]
pub struct NewSqliteOutboxMessage {
    pub id: Vec<u8>,
    pub message_id: String,
    pub exchange: String,
    pub routing_key: String,
    pub event_type: String,
    pub payload: String,
    pub status: String,
    pub created_at: String,
}

impl TryFrom<SqliteOutboxMessage> for OutboxMessage {
    type Error = ValidationError;

    fn try_from(row: SqliteOutboxMessage) -> Result<Self, Self::Error> {
        let status = OutboxStatus::parse(&row.status).ok_or(ValidationError::CorruptRow {
            message: format!("unknown outbox status '{}'", row.status),
        })?;
        Ok(OutboxMessage {
            id: decode_uuid(&row.id)?,
            message_id: row.message_id,
            exchange: row.exchange,
            routing_key: row.routing_key,
            event_type: row.event_type,
            payload: row.payload,
            status,
            created_at: decode_ts(&row.created_at)?,
            published_at: decode_ts_opt(row.published_at.as_deref())?,
        })
    }
}

// ============================================================================
// Processed Message Models
// ============================================================================

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = processed_messages)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SqliteProcessedMessage {
    pub message_id: String,
    pub event_type: String,
    pub processed_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = processed_messages)]
pub struct NewSqliteProcessedMessage {
    pub message_id: String,
    pub event_type: String,
    pub processed_at: String,
}

impl TryFrom<SqliteProcessedMessage> for ProcessedMessage {
    type Error = ValidationError;

    fn try_from(row: SqliteProcessedMessage) -> Result<Self, Self::Error> {
        Ok(ProcessedMessage {
            message_id: row.message_id,
            event_type: row.event_type,
            processed_at: decode_ts(&row.processed_at)?,
        })
    }
}
