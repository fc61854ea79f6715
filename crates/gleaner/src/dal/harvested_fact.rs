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

//! Harvested fact DAL.
//!
//! Facts are insert-only. `insert_if_absent` checks the natural key inside
//! the insert transaction, so re-running a collection over identical upstream
//! data leaves the row count unchanged.

use super::models::{NewSqliteHarvestedFact, SqliteHarvestedFact};
use super::DAL;
use crate::database::schema::harvested_facts;
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::ValidationError;
use crate::models::harvested_fact::{FactKind, HarvestedFact, NewHarvestedFact};
use diesel::prelude::*;

/// Data access layer for harvested activity facts.
#[derive(Clone)]
pub struct HarvestedFactDAL<'a> {
    dal: &'a DAL,
}

impl<'a> HarvestedFactDAL<'a> {
    /// Creates a new HarvestedFactDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Inserts a fact unless its natural key already exists.
    ///
    /// Returns `true` when a row was inserted, `false` when the same upstream
    /// item had already been ingested. The existence check and insert run in
    /// one transaction; the UNIQUE constraint backstops any race.
    pub async fn insert_if_absent(
        &self,
        new_fact: NewHarvestedFact,
    ) -> Result<bool, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let now = UniversalTimestamp::now();
        let new_row = NewSqliteHarvestedFact {
            id: UniversalUuid::new_v4().as_bytes().to_vec(),
            subject_id: new_fact.subject_id,
            source_repository: new_fact.source_repository,
            natural_id: new_fact.natural_id,
            fact_type: new_fact.fact_type.as_str().to_string(),
            title: new_fact.title,
            occurred_at: new_fact.occurred_at.map(|t| t.to_rfc3339()),
            payload: new_fact.payload,
            collected_at: now.to_rfc3339(),
        };

        let inserted: bool = conn
            .interact(move |conn| {
                conn.transaction::<_, ValidationError, _>(|conn| {
                    let existing: i64 = harvested_facts::table
                        .filter(harvested_facts::subject_id.eq(new_row.subject_id))
                        .filter(harvested_facts::source_repository.eq(&new_row.source_repository))
                        .filter(harvested_facts::natural_id.eq(&new_row.natural_id))
                        .count()
                        .get_result(conn)?;

                    if existing > 0 {
                        return Ok(false);
                    }

                    diesel::insert_into(harvested_facts::table)
                        .values(&new_row)
                        .execute(conn)?;
                    Ok(true)
                })
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(inserted)
    }

    /// Counts all facts for a subject.
    pub async fn count_for_subject(&self, subject_id: i64) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(move |conn| {
                harvested_facts::table
                    .filter(harvested_facts::subject_id.eq(subject_id))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    /// Counts facts of one kind for a subject.
    pub async fn count_of_kind(
        &self,
        subject_id: i64,
        kind: FactKind,
    ) -> Result<i64, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let count: i64 = conn
            .interact(move |conn| {
                harvested_facts::table
                    .filter(harvested_facts::subject_id.eq(subject_id))
                    .filter(harvested_facts::fact_type.eq(kind.as_str()))
                    .count()
                    .get_result(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        Ok(count)
    }

    /// Lists facts of one kind for a subject, ordered by natural id.
    pub async fn list_of_kind(
        &self,
        subject_id: i64,
        kind: FactKind,
    ) -> Result<Vec<HarvestedFact>, ValidationError> {
        let conn = self
            .dal
            .database
            .get_connection()
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))?;

        let rows: Vec<SqliteHarvestedFact> = conn
            .interact(move |conn| {
                harvested_facts::table
                    .filter(harvested_facts::subject_id.eq(subject_id))
                    .filter(harvested_facts::fact_type.eq(kind.as_str()))
                    .order(harvested_facts::natural_id.asc())
                    .load(conn)
            })
            .await
            .map_err(|e| ValidationError::ConnectionPool(e.to_string()))??;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
