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

//! Priority Job Launcher
//!
//! Accepts collection submissions at two priority levels, deduplicates
//! against queued and in-flight work, and drives execution of the composed
//! pipeline. The driver loop is single-threaded and non-overlapping; actual
//! pipeline execution is dispatched onto a semaphore-bounded worker pool.
//!
//! Within one subject, executions are strictly serialized: `submit` refuses
//! while the subject is queued or running, and the claim path re-checks the
//! running set to close the race against jobs admitted between tick and
//! launch. Launch failures are logged and are not re-queued - step-level
//! fault tolerance inside the pipeline owns transient recovery, and the next
//! periodic or triggered submission owns the rest.

use super::queue::{CollectionRequest, JobPriority, RequestQueue};
use crate::config::LauncherConfig;
use crate::models::job_execution::JobOutcome;
use crate::step::CollectionPipeline;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::time;
use tracing::{debug, error, info};
use uuid::Uuid;

struct LauncherInner {
    pipeline: Arc<CollectionPipeline>,
    queue: Mutex<RequestQueue>,
    running: Mutex<HashSet<i64>>,
    worker_slots: Arc<Semaphore>,
    config: LauncherConfig,
}

/// The priority job launcher.
///
/// A cheap-to-clone handle; all clones share one queue, running set, and
/// worker pool.
#[derive(Clone)]
pub struct PriorityJobLauncher {
    inner: Arc<LauncherInner>,
}

impl PriorityJobLauncher {
    /// Creates a new launcher around the composed pipeline.
    pub fn new(pipeline: Arc<CollectionPipeline>, config: LauncherConfig) -> Self {
        Self {
            inner: Arc::new(LauncherInner {
                pipeline,
                queue: Mutex::new(RequestQueue::new()),
                running: Mutex::new(HashSet::new()),
                worker_slots: Arc::new(Semaphore::new(config.worker_slots)),
                config,
            }),
        }
    }

    /// Submits a collection request.
    ///
    /// A no-op (returning `false`) when a job for the subject is currently
    /// executing or a request for it is already queued at any priority; this
    /// makes `submit` idempotent under bursty duplicate triggers.
    pub fn submit(&self, subject_id: i64, priority: JobPriority) -> bool {
        {
            let running = self.inner.running.lock().unwrap_or_else(|e| e.into_inner());
            if running.contains(&subject_id) {
                debug!("Job already running for subject {}, skipping submit", subject_id);
                return false;
            }
        }

        let accepted = {
            let mut queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.push(subject_id, priority)
        };

        if accepted {
            info!(
                "Submitted collection request for subject {} with priority {}",
                subject_id, priority
            );
        } else {
            debug!("Request already queued for subject {}, skipping submit", subject_id);
        }
        accepted
    }

    /// Number of queued requests.
    pub fn queued_len(&self) -> usize {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// True when the subject has a queued request.
    pub fn is_queued(&self, subject_id: i64) -> bool {
        self.inner
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(subject_id)
    }

    /// True when a job for the subject is currently executing.
    pub fn is_running(&self, subject_id: i64) -> bool {
        self.inner
            .running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&subject_id)
    }

    /// Pops the best request and claims its subject for execution.
    ///
    /// Re-checks the running set between pop and claim: a request admitted
    /// while its subject is mid-flight (via another submission path) is
    /// dropped rather than double-launched.
    fn try_claim(&self) -> Option<CollectionRequest> {
        let request = {
            let mut queue = self.inner.queue.lock().unwrap_or_else(|e| e.into_inner());
            queue.pop()?
        };

        let mut running = self.inner.running.lock().unwrap_or_else(|e| e.into_inner());
        if !running.insert(request.subject_id) {
            info!(
                "Job already running for subject {}, dropping dequeued request",
                request.subject_id
            );
            return None;
        }
        Some(request)
    }

    /// Executes one claimed request to completion and arms the follow-up
    /// LOW-priority resubmission timer.
    async fn execute_claimed(&self, request: CollectionRequest) -> JobOutcome {
        let subject_id = request.subject_id;
        let run_id = Uuid::new_v4().to_string();

        let outcome = match self.inner.pipeline.run(subject_id, &run_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Storage failure recording the attempt; the subject is not
                // advanced and may be resubmitted later.
                error!("Failed to launch job for subject {}: {}", subject_id, e);
                JobOutcome::Failed
            }
        };

        {
            let mut running = self.inner.running.lock().unwrap_or_else(|e| e.into_inner());
            running.remove(&subject_id);
        }

        self.arm_resubmission(subject_id, outcome);
        outcome
    }

    /// Schedules the next LOW-priority run for a subject.
    ///
    /// Completed runs wait the success interval, failed runs the (shorter)
    /// failure interval. This is the same mechanism schedule recovery uses,
    /// so periodic collection continues seamlessly across restarts.
    fn arm_resubmission(&self, subject_id: i64, outcome: JobOutcome) {
        let interval = match outcome {
            JobOutcome::Completed => self.inner.config.success_interval(),
            _ => self.inner.config.failure_interval(),
        };
        info!(
            "Job finished for subject {} with outcome {}. Next run in {:?}",
            subject_id, outcome, interval
        );
        self.schedule_submit(subject_id, interval);
    }

    /// Arms a one-shot timer that submits the subject at LOW priority.
    pub fn schedule_submit(&self, subject_id: i64, delay: Duration) {
        let launcher = self.clone();
        tokio::spawn(async move {
            time::sleep(delay).await;
            launcher.submit(subject_id, JobPriority::Low);
        });
    }

    /// Claims and executes at most one request, inline.
    ///
    /// This is the launcher's unit of progress; the driver loop calls it
    /// through the worker pool, and tests call it directly for deterministic
    /// scheduling.
    pub async fn drive_once(&self) -> Option<(i64, JobOutcome)> {
        let request = self.try_claim()?;
        let subject_id = request.subject_id;
        let outcome = self.execute_claimed(request).await;
        Some((subject_id, outcome))
    }

    /// Runs the driver loop until shutdown is signalled.
    ///
    /// The loop itself never blocks on pipeline execution: when all worker
    /// slots are busy the tick is skipped, and claimed requests are executed
    /// on spawned workers holding a slot permit.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting priority job launcher (poll interval: {:?}, worker slots: {})",
            self.inner.config.poll_interval(),
            self.inner.config.worker_slots
        );
        let mut interval = time::interval(self.inner.config.poll_interval());

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if self.inner.worker_slots.available_permits() == 0 {
                        debug!("All worker slots busy, skipping poll");
                        continue;
                    }

                    if let Some(request) = self.try_claim() {
                        let permit = match Arc::clone(&self.inner.worker_slots).acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => break,
                        };
                        let launcher = self.clone();
                        tokio::spawn(async move {
                            let _permit = permit; // Hold slot until the job completes
                            launcher.execute_claimed(request).await;
                        });
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Priority job launcher stopped");
    }
}
