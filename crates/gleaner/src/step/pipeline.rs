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

//! Composed collection pipeline.
//!
//! Runs the registry's ordered steps for one subject, recording the attempt
//! in the execution history: a `Running` row at start, finalized `Completed`
//! or `Failed`. Step failures do not propagate as errors to the launcher -
//! the outcome is data, recorded and returned.

use super::context::StepContext;
use super::registry::StepRegistry;
use super::Step;
use crate::dal::DAL;
use crate::error::ValidationError;
use crate::models::job_execution::{JobOutcome, NewJobExecution};
use std::sync::Arc;
use tracing::{error, info};

/// The composed, ordered collection job.
pub struct CollectionPipeline {
    dal: DAL,
    steps: Vec<Arc<dyn Step>>,
}

impl CollectionPipeline {
    /// Composes the pipeline from the registry's providers.
    pub fn new(dal: DAL, registry: &StepRegistry) -> Self {
        let steps = registry.compose();
        info!(
            "Composed collection pipeline with {} steps: [{}]",
            steps.len(),
            steps.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
        );
        Self { dal, steps }
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Executes all steps for one subject.
    ///
    /// Returns the recorded outcome. Only storage failures while writing the
    /// execution record itself surface as errors.
    pub async fn run(&self, subject_id: i64, run_id: &str) -> Result<JobOutcome, ValidationError> {
        let record = self
            .dal
            .job_execution()
            .create(NewJobExecution {
                subject_id,
                run_id: run_id.to_string(),
            })
            .await?;

        info!(
            "Starting collection job for subject {} (run_id: {})",
            subject_id, run_id
        );

        let mut ctx = StepContext::new(subject_id, run_id);
        let mut steps_completed: i32 = 0;

        for step in &self.steps {
            match step.execute(&mut ctx).await {
                Ok(()) => {
                    steps_completed += 1;
                }
                Err(e) => {
                    error!(
                        "Step {} failed for subject {} (run_id: {}): {}",
                        step.name(),
                        subject_id,
                        run_id,
                        e
                    );
                    self.dal
                        .job_execution()
                        .mark_failed(record.id, &e.to_string(), steps_completed)
                        .await?;
                    return Ok(JobOutcome::Failed);
                }
            }
        }

        self.dal
            .job_execution()
            .mark_completed(record.id, steps_completed)
            .await?;
        info!(
            "Collection job completed for subject {} ({} steps, run_id: {})",
            subject_id, steps_completed, run_id
        );
        Ok(JobOutcome::Completed)
    }
}
