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

//! Subject DAL.

use super::models::{NewSqliteSubject, SqliteSubject};
use super::DAL;
use crate::database::schema::subjects;
use crate::database::universal_types::UniversalTimestamp;
use crate::error::ValidationError;
use crate::models::subject::{NewSubject, Subject};
use diesel::prelude::*;

/// Data access layer for registered subjects.
#[derive(Clone)]
pub struct SubjectDAL<'a> {
    dal: &'a DAL,
}

impl<'a> SubjectDAL<'a> {
    /// Creates a new SubjectDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Registers a new subject.
    pub async fn create(&self, new_subject: NewSubject) -> Result<Subject, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let now = UniversalTimestamp::now();
        let new_row = NewSqliteSubject {
            id: new_subject.id,
            github_login: new_subject.github_login,
            github_token: new_subject.github_token,
            active: true,
            created_at: now.to_rfc3339(),
            updated_at: now.to_rfc3339(),
        };

        let row: SqliteSubject = conn
            .interact(move |conn| {
                diesel::insert_into(subjects::table)
                    .values(&new_row)
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        row.try_into()
    }

    /// Fetches a subject by id.
    pub async fn get(&self, subject_id: i64) -> Result<Option<Subject>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let row: Option<SqliteSubject> = conn
            .interact(move |conn| {
                subjects::table
                    .filter(subjects::id.eq(subject_id))
                    .first(conn)
                    .optional()
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        row.map(TryInto::try_into).transpose()
    }

    /// Lists all active subjects, ordered by id.
    ///
    /// Schedule recovery iterates this set at startup.
    pub async fn list_active(&self) -> Result<Vec<Subject>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let rows: Vec<SqliteSubject> = conn
            .interact(move |conn| {
                subjects::table
                    .filter(subjects::active.eq(true))
                    .order(subjects::id.asc())
                    .load(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
