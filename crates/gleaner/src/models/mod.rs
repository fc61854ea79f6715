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

//! Domain model structures.
//!
//! These are storage-agnostic types using the universal wrappers; the DAL
//! converts them to/from SQLite row structs at its boundary.

pub mod collection_metadata;
pub mod harvested_fact;
pub mod job_execution;
pub mod outbox_message;
pub mod processed_message;
pub mod subject;

pub use collection_metadata::{CollectionCursors, CollectionMetadata};
pub use harvested_fact::{FactKind, HarvestedFact, NewHarvestedFact};
pub use job_execution::{JobExecution, JobOutcome, NewJobExecution};
pub use outbox_message::{NewOutboxMessage, OutboxMessage, OutboxStatus};
pub use processed_message::ProcessedMessage;
pub use subject::{NewSubject, Subject};
