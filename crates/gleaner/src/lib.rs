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

//! # Gleaner
//!
//! A background service for resilient, priority-scheduled harvesting of
//! GitHub activity data.
//!
//! Gleaner periodically and on demand collects activity for a population of
//! registered subjects from the rate-limited GraphQL API, persists
//! normalized facts, and propagates completion events to other services
//! without loss or duplication.
//!
//! ## Architecture
//!
//! - [`launcher`] - priority-scheduled job launching with per-subject
//!   serialization and startup schedule recovery
//! - [`step`] - the linear, fault-tolerant step pipeline (chunked steps with
//!   retry/skip budgets) and its registry
//! - [`harvest`] - the cursor-paginating GraphQL client with partial-result
//!   salvage, and the concrete collection steps
//! - [`outbox`] - the transactional outbox and its publisher
//! - [`consumer`] - the idempotent event consumer and trigger-stream
//!   ingestion
//! - [`dal`] / [`database`] / [`models`] - SQLite persistence
//!
//! Delivery semantics: at-least-once end to end. Producers write events in
//! the same transaction as the state change they describe; the publisher
//! retries nothing but marks row state; consumers deduplicate on the
//! processed-message ledger.

pub mod config;
pub mod consumer;
pub mod dal;
pub mod database;
pub mod error;
pub mod harvest;
pub mod launcher;
pub mod models;
pub mod outbox;
pub mod retry;
pub mod runner;
pub mod step;

pub use config::GleanerConfig;
pub use consumer::{Delivery, IdempotentConsumer, TriggerIngestor, Verdict};
pub use dal::DAL;
pub use database::Database;
pub use harvest::HarvestClient;
pub use launcher::{JobPriority, PriorityJobLauncher, ScheduleRecovery};
pub use models::job_execution::JobOutcome;
pub use outbox::OutboxPublisher;
pub use retry::{BackoffStrategy, RetryCondition, RetryPolicy};
pub use runner::GleanerRunner;
pub use step::{CollectionPipeline, Step, StepContext, StepProvider, StepRegistry};

use tracing_subscriber::EnvFilter;

/// Initializes tracing for the process.
///
/// Honors `RUST_LOG` when set; `filter` (or `info`) otherwise. Safe to call
/// more than once - later calls are no-ops, which keeps test setup simple.
pub fn init_logging(filter: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter.unwrap_or("info")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init();
}
