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

//! Job execution DAL.
//!
//! Execution records are append-only history: rows move `Running` to
//! `Completed`/`Failed` but are never deleted. Schedule recovery reads the
//! most recent completed end time per subject.

use super::models::{decode_ts, NewSqliteJobExecution, SqliteJobExecution};
use super::DAL;
use crate::database::schema::job_executions;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::ValidationError;
use crate::models::job_execution::{JobExecution, JobOutcome, NewJobExecution};
use diesel::prelude::*;

/// Data access layer for pipeline execution records.
#[derive(Clone)]
pub struct JobExecutionDAL<'a> {
    dal: &'a DAL,
}

impl<'a> JobExecutionDAL<'a> {
    /// Creates a new JobExecutionDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a new execution record in the `Running` outcome.
    pub async fn create(&self, new_execution: NewJobExecution) -> Result<JobExecution, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let now = UniversalTimestamp::now();
        let new_row = NewSqliteJobExecution {
            id: UniversalUuid::new_v4().as_bytes().to_vec(),
            subject_id: new_execution.subject_id,
            run_id: new_execution.run_id,
            outcome: JobOutcome::Running.as_str().to_string(),
            started_at: now.to_rfc3339(),
            steps_completed: 0,
            created_at: now.to_rfc3339(),
            updated_at: now.to_rfc3339(),
        };

        let row: SqliteJobExecution = conn
            .interact(move |conn| {
                diesel::insert_into(job_executions::table)
                    .values(&new_row)
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        row.try_into()
    }

    /// Fetches an execution record by id.
    pub async fn get_by_id(&self, id: UniversalUuid) -> Result<JobExecution, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let key = id.as_bytes().to_vec();
        let row: SqliteJobExecution = conn
            .interact(move |conn| {
                job_executions::table
                    .filter(job_executions::id.eq(key))
                    .first(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        row.try_into()
    }

    /// Marks an execution as completed.
    pub async fn mark_completed(
        &self,
        id: UniversalUuid,
        steps_completed: i32,
    ) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let key = id.as_bytes().to_vec();
        let now = UniversalTimestamp::now().to_rfc3339();
        conn.interact(move |conn| {
            diesel::update(job_executions::table.filter(job_executions::id.eq(key)))
                .set((
                    job_executions::outcome.eq(JobOutcome::Completed.as_str()),
                    job_executions::ended_at.eq(Some(now.clone())),
                    job_executions::steps_completed.eq(steps_completed),
                    job_executions::updated_at.eq(now),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Marks an execution as failed with error details.
    pub async fn mark_failed(
        &self,
        id: UniversalUuid,
        error_details: &str,
        steps_completed: i32,
    ) -> Result<(), ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let key = id.as_bytes().to_vec();
        let details = error_details.to_string();
        let now = UniversalTimestamp::now().to_rfc3339();
        conn.interact(move |conn| {
            diesel::update(job_executions::table.filter(job_executions::id.eq(key)))
                .set((
                    job_executions::outcome.eq(JobOutcome::Failed.as_str()),
                    job_executions::ended_at.eq(Some(now.clone())),
                    job_executions::error_details.eq(Some(details)),
                    job_executions::steps_completed.eq(steps_completed),
                    job_executions::updated_at.eq(now),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Returns the most recent `ended_at` of a completed execution for the
    /// subject, or `None` when the subject has never completed a run.
    ///
    /// RFC3339 strings with a fixed UTC offset order lexicographically, so
    /// the max is taken in SQL.
    pub async fn last_completed_end(
        &self,
        subject_id: i64,
    ) -> Result<Option<UniversalTimestamp>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let max_ended: Option<Option<String>> = conn
            .interact(move |conn| {
                job_executions::table
                    .filter(job_executions::subject_id.eq(subject_id))
                    .filter(job_executions::outcome.eq(JobOutcome::Completed.as_str()))
                    .select(diesel::dsl::max(job_executions::ended_at))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        match max_ended.flatten() {
            Some(s) => Ok(Some(decode_ts(&s)?)),
            None => Ok(None),
        }
    }

    /// Lists all execution records for a subject, most recent first.
    pub async fn list_for_subject(
        &self,
        subject_id: i64,
    ) -> Result<Vec<JobExecution>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let rows: Vec<SqliteJobExecution> = conn
            .interact(move |conn| {
                job_executions::table
                    .filter(job_executions::subject_id.eq(subject_id))
                    .order(job_executions::started_at.desc())
                    .load(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
