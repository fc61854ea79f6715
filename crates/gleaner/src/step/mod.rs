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

//! Step Pipeline
//!
//! A collection job is a linear sequence of steps composed by the
//! [`registry::StepRegistry`] from explicitly registered providers. Steps are
//! either single-shot tasklets (implement [`Step`] directly) or chunked
//! ([`chunked::ChunkedStep`] wrapping a [`chunked::ChunkWorker`]) with
//! per-chunk retry and per-item skip budgets.
//!
//! Step *i+1* starts only after step *i* terminates. A step failure fails the
//! job; the failure is recorded in the execution history and the subject is
//! picked up again by the next periodic or triggered submission.

pub mod chunked;
pub mod context;
pub mod pipeline;
pub mod registry;

pub use chunked::{ChunkWorker, ChunkedStep};
pub use context::StepContext;
pub use pipeline::CollectionPipeline;
pub use registry::{StepProvider, StepRegistry};

use crate::error::StepError;
use async_trait::async_trait;

/// A single unit of work within the collection pipeline.
///
/// Implementations must be safe to re-run: a failed job is re-executed from
/// its first step on the next submission, so every write a step performs has
/// to be idempotent (fact writes go through existence checks, metadata
/// updates are monotonic).
#[async_trait]
pub trait Step: Send + Sync {
    /// Unique step name, used in logs and registration checks.
    fn name(&self) -> &str;

    /// Executes the step against the shared job context.
    async fn execute(&self, ctx: &mut StepContext) -> Result<(), StepError>;
}
