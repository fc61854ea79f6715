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

//! Data Access Layer.
//!
//! This module provides database operations through a single interface. Each
//! entity type has its own sub-DAL; every mutation is scoped to one local
//! transaction executed inside a `conn.interact` closure on the pooled
//! connection.
//!
//! # Example
//!
//! ```rust,ignore
//! use gleaner::dal::DAL;
//! use gleaner::database::Database;
//!
//! let db = Database::new("gleaner.db", 5);
//! let dal = DAL::new(db);
//!
//! let pending = dal.outbox_message().list_pending(100).await?;
//! ```

use crate::database::Database;

pub mod collection_metadata;
pub mod harvested_fact;
pub mod job_execution;
pub mod models;
pub mod outbox_message;
pub mod processed_message;
pub mod subject;

pub use collection_metadata::CollectionMetadataDAL;
pub use harvested_fact::HarvestedFactDAL;
pub use job_execution::JobExecutionDAL;
pub use outbox_message::OutboxMessageDAL;
pub use processed_message::{LedgerOutcome, ProcessedMessageDAL};
pub use subject::SubjectDAL;

/// The Data Access Layer struct.
///
/// # Thread Safety
///
/// The `DAL` struct is `Clone` and can be safely shared between tasks.
/// Each clone references the same underlying connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    /// Creates a new DAL instance.
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Returns a subject DAL for subject operations.
    pub fn subject(&self) -> SubjectDAL {
        SubjectDAL::new(self)
    }

    /// Returns a job execution DAL for execution history operations.
    pub fn job_execution(&self) -> JobExecutionDAL {
        JobExecutionDAL::new(self)
    }

    /// Returns a harvested fact DAL for fact operations.
    pub fn harvested_fact(&self) -> HarvestedFactDAL {
        HarvestedFactDAL::new(self)
    }

    /// Returns a collection metadata DAL for bookkeeping operations.
    pub fn collection_metadata(&self) -> CollectionMetadataDAL {
        CollectionMetadataDAL::new(self)
    }

    /// Returns an outbox message DAL for outbox operations.
    pub fn outbox_message(&self) -> OutboxMessageDAL {
        OutboxMessageDAL::new(self)
    }

    /// Returns a processed message DAL for idempotency ledger operations.
    pub fn processed_message(&self) -> ProcessedMessageDAL {
        ProcessedMessageDAL::new(self)
    }
}
