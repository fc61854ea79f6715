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

//! Schedule Recovery
//!
//! Runs once at process start. Reconstructs each active subject's next due
//! time from the persisted execution history: overdue subjects are submitted
//! immediately at LOW priority, the rest get a one-shot timer for their
//! remaining wait. Restarts therefore neither starve subjects nor stampede
//! the external API - only overdue subjects fire at startup.

use super::job_launcher::PriorityJobLauncher;
use super::queue::JobPriority;
use crate::dal::DAL;
use crate::error::ValidationError;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;
use tracing::info;

/// Counts reported after a recovery pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Subjects submitted immediately (overdue)
    pub immediate: usize,
    /// Subjects armed with a future timer
    pub scheduled: usize,
}

/// Startup schedule recovery.
pub struct ScheduleRecovery {
    dal: DAL,
    launcher: PriorityJobLauncher,
    interval: Duration,
}

impl ScheduleRecovery {
    pub fn new(dal: DAL, launcher: PriorityJobLauncher, interval: Duration) -> Self {
        Self {
            dal,
            launcher,
            interval,
        }
    }

    /// Computes the next due time from the last completed run.
    ///
    /// A subject with no completed history is due immediately.
    pub fn next_run(
        last_run: Option<DateTime<Utc>>,
        interval: Duration,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        match last_run {
            None => now,
            Some(last) => {
                last + ChronoDuration::from_std(interval).unwrap_or_else(|_| ChronoDuration::zero())
            }
        }
    }

    /// Recovers schedules for every active subject.
    pub async fn recover(&self) -> Result<RecoverySummary, ValidationError> {
        info!("Recovering schedules on startup...");

        let subjects = self.dal.subject().list_active().await?;
        let now = Utc::now();
        let mut immediate = 0;
        let mut scheduled = 0;

        for subject in subjects {
            let last_run = self
                .dal
                .job_execution()
                .last_completed_end(subject.id)
                .await?
                .map(|t| t.into_inner());

            let next_run = Self::next_run(last_run, self.interval, now);

            if next_run <= now {
                self.launcher.submit(subject.id, JobPriority::Low);
                immediate += 1;
            } else {
                let delay = (next_run - now)
                    .to_std()
                    .unwrap_or_else(|_| Duration::from_secs(0));
                self.launcher.schedule_submit(subject.id, delay);
                scheduled += 1;
            }
        }

        let summary = RecoverySummary {
            immediate,
            scheduled,
        };
        info!(
            "Schedule recovery complete. Immediate: {}, Scheduled: {}",
            summary.immediate, summary.scheduled
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_history_is_due_now() {
        let now = Utc::now();
        let next = ScheduleRecovery::next_run(None, Duration::from_secs(7200), now);
        assert_eq!(next, now);
    }

    #[test]
    fn test_overdue_subject() {
        // lastRun = now - 3h, interval = 2h -> due 1h ago
        let now = Utc::now();
        let last = now - ChronoDuration::hours(3);
        let next = ScheduleRecovery::next_run(Some(last), Duration::from_secs(7200), now);
        assert!(next <= now);
        assert_eq!(next, last + ChronoDuration::hours(2));
    }

    #[test]
    fn test_not_yet_due_subject() {
        // lastRun = now - 1h, interval = 2h -> due in 1h
        let now = Utc::now();
        let last = now - ChronoDuration::hours(1);
        let next = ScheduleRecovery::next_run(Some(last), Duration::from_secs(7200), now);
        assert!(next > now);
        assert_eq!(next, now + ChronoDuration::hours(1));
    }
}
