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

//! Chunked step execution.
//!
//! A [`ChunkWorker`] reads its input items once, then processes them in
//! bounded chunks. The chunk is the unit of retry: a transient item failure
//! re-runs the whole chunk (worker writes must be idempotent), a bad item is
//! skipped and counted, and the skip budget bounds how much bad data one run
//! tolerates before the step is declared failed.

use super::context::StepContext;
use super::Step;
use crate::error::{ItemError, StepError};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use tracing::{debug, warn};

/// A worker processed by [`ChunkedStep`].
#[async_trait]
pub trait ChunkWorker: Send + Sync {
    type Item: Send + Sync;

    /// Unique step name.
    fn name(&self) -> &str;

    /// Reads the full input set for this run.
    ///
    /// Called once per execution, before chunking. Workers derive their input
    /// from the context (discovered repositories, fetched upstream pages) and
    /// may record values for later steps, such as pagination cursors.
    async fn read(&self, ctx: &mut StepContext) -> Result<Vec<Self::Item>, StepError>;

    /// Processes one item. Writes must be idempotent: the same item is
    /// re-processed when its chunk is retried.
    async fn process(&self, item: &Self::Item, ctx: &StepContext) -> Result<(), ItemError>;
}

/// Drives a [`ChunkWorker`] under the configured fault policy.
pub struct ChunkedStep<W: ChunkWorker> {
    worker: W,
    chunk_size: usize,
    retry_policy: RetryPolicy,
    skip_limit: u32,
}

impl<W: ChunkWorker> ChunkedStep<W> {
    pub fn new(worker: W, chunk_size: usize, retry_policy: RetryPolicy, skip_limit: u32) -> Self {
        Self {
            worker,
            chunk_size: chunk_size.max(1),
            retry_policy,
            skip_limit,
        }
    }

    /// Processes one chunk, retrying it on transient failures.
    ///
    /// Returns the number of items skipped in this chunk. Skip counts from
    /// abandoned (retried) passes are discarded so one bad item is never
    /// counted twice.
    async fn run_chunk(
        &self,
        chunk: &[W::Item],
        ctx: &StepContext,
        skipped_so_far: u32,
    ) -> Result<u32, StepError> {
        let mut attempt: u32 = 1;
        loop {
            match self.attempt_chunk(chunk, ctx, skipped_so_far).await {
                Ok(chunk_skipped) => return Ok(chunk_skipped),
                Err(ChunkFailure::SkipLimit { skipped }) => {
                    return Err(StepError::SkipLimitExceeded {
                        skipped,
                        limit: self.skip_limit,
                    });
                }
                Err(ChunkFailure::Fatal(message)) => return Err(StepError::Fatal(message)),
                Err(ChunkFailure::Transient(error)) => {
                    if !self.retry_policy.should_retry(attempt, &error) {
                        return Err(StepError::RetryLimitExhausted {
                            attempts: attempt,
                            message: error.to_string(),
                        });
                    }
                    let delay = self.retry_policy.calculate_delay(attempt);
                    warn!(
                        "Chunk failed in step {} (attempt {}), retrying in {:?}: {}",
                        self.worker.name(),
                        attempt,
                        delay,
                        error
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// One pass over a chunk. Skips are tallied against the step-wide budget.
    async fn attempt_chunk(
        &self,
        chunk: &[W::Item],
        ctx: &StepContext,
        skipped_so_far: u32,
    ) -> Result<u32, ChunkFailure> {
        let mut chunk_skipped: u32 = 0;
        for item in chunk {
            match self.worker.process(item, ctx).await {
                Ok(()) => {}
                Err(ItemError::BadItem(reason)) => {
                    chunk_skipped += 1;
                    let total = skipped_so_far + chunk_skipped;
                    warn!(
                        "Skipping bad item in step {} ({}/{} skips used): {}",
                        self.worker.name(),
                        total,
                        self.skip_limit,
                        reason
                    );
                    if total > self.skip_limit {
                        return Err(ChunkFailure::SkipLimit { skipped: total });
                    }
                }
                Err(error @ ItemError::Transient(_)) => {
                    return Err(ChunkFailure::Transient(error));
                }
                Err(ItemError::Fatal(message)) => {
                    return Err(ChunkFailure::Fatal(message));
                }
            }
        }
        Ok(chunk_skipped)
    }
}

enum ChunkFailure {
    Transient(ItemError),
    SkipLimit { skipped: u32 },
    Fatal(String),
}

#[async_trait]
impl<W: ChunkWorker> Step for ChunkedStep<W> {
    fn name(&self) -> &str {
        self.worker.name()
    }

    async fn execute(&self, ctx: &mut StepContext) -> Result<(), StepError> {
        if ctx.is_skipped() {
            debug!("Step {} skipped: collection soft-skipped", self.name());
            return Ok(());
        }

        let items = self.worker.read(ctx).await?;
        if items.is_empty() {
            debug!("Step {} has no input items", self.name());
            return Ok(());
        }

        let mut skipped: u32 = 0;
        for chunk in items.chunks(self.chunk_size) {
            skipped += self.run_chunk(chunk, ctx, skipped).await?;
        }

        let processed = items.len() as u64 - skipped as u64;
        ctx.insert(format!("{}_processed", self.name()), processed);
        if skipped > 0 {
            warn!(
                "Step {} completed with {} skipped of {} items",
                self.name(),
                skipped,
                items.len()
            );
        } else {
            debug!("Step {} completed: {} items", self.name(), items.len());
        }
        Ok(())
    }
}
