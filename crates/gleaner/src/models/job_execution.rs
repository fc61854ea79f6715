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

//! Job execution model: one row per attempt of the composed collection
//! pipeline for a subject.
//!
//! Records are created when the launcher hands a request to the pipeline,
//! finalized on completion or failure, and never deleted. Schedule recovery
//! reads this history to compute each subject's next due time.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use serde::{Deserialize, Serialize};

/// Outcome of a pipeline execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// The pipeline is currently executing
    Running,
    /// All steps terminated successfully
    Completed,
    /// A step exhausted its fault budget
    Failed,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Running => "Running",
            JobOutcome::Completed => "Completed",
            JobOutcome::Failed => "Failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Running" => Some(JobOutcome::Running),
            "Completed" => Some(JobOutcome::Completed),
            "Failed" => Some(JobOutcome::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A pipeline execution record (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: UniversalUuid,
    pub subject_id: i64,
    /// Unique per launch; used for tracing and dedup of launch attempts
    pub run_id: String,
    pub outcome: JobOutcome,
    pub started_at: UniversalTimestamp,
    pub ended_at: Option<UniversalTimestamp>,
    pub error_details: Option<String>,
    /// Number of steps that terminated successfully in this attempt
    pub steps_completed: i32,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

/// Structure for creating new execution records.
///
/// The record is created in the `Running` outcome with `started_at` set by
/// the DAL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewJobExecution {
    pub subject_id: i64,
    pub run_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_round_trip() {
        for outcome in [JobOutcome::Running, JobOutcome::Completed, JobOutcome::Failed] {
            assert_eq!(JobOutcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(JobOutcome::parse("Cancelled"), None);
    }
}
