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

//! Launcher and schedule-recovery tests: submission dedup, priority
//! ordering, per-subject serialization, and restart recovery.

use crate::fixtures::get_or_init_fixture;
use async_trait::async_trait;
use chrono::Utc;
use gleaner::config::LauncherConfig;
use gleaner::dal::DAL;
use gleaner::error::StepError;
use gleaner::launcher::{JobPriority, PriorityJobLauncher, ScheduleRecovery};
use gleaner::models::job_execution::JobOutcome;
use gleaner::models::subject::NewSubject;
use gleaner::step::{CollectionPipeline, Step, StepContext, StepProvider, StepRegistry};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

fn reset_and_dal() -> DAL {
    let fixture = get_or_init_fixture();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.reset_database();
    guard.initialize();
    guard.get_dal()
}

fn test_launcher_config() -> LauncherConfig {
    LauncherConfig {
        poll_interval_ms: 10,
        worker_slots: 1,
        success_interval_secs: 3600,
        failure_interval_secs: 3600,
    }
}

/// Launcher over an empty registry (placeholder step, completes instantly).
fn noop_launcher(dal: DAL) -> PriorityJobLauncher {
    let registry = StepRegistry::new();
    let pipeline = Arc::new(CollectionPipeline::new(dal, &registry));
    PriorityJobLauncher::new(pipeline, test_launcher_config())
}

/// Step that blocks until the test releases a permit.
struct GateStep {
    gate: Arc<Semaphore>,
}

#[async_trait]
impl Step for GateStep {
    fn name(&self) -> &str {
        "gate"
    }

    async fn execute(&self, _ctx: &mut StepContext) -> Result<(), StepError> {
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| StepError::Fatal(e.to_string()))?;
        permit.forget();
        Ok(())
    }
}

struct GateProvider {
    step: Arc<GateStep>,
}

impl StepProvider for GateProvider {
    fn order(&self) -> i32 {
        10
    }

    fn name(&self) -> &str {
        "gate"
    }

    fn build_step(&self) -> Arc<dyn Step> {
        Arc::clone(&self.step) as Arc<dyn Step>
    }
}

#[tokio::test]
#[serial]
async fn test_submit_is_idempotent_while_queued() {
    let dal = reset_and_dal();
    let launcher = noop_launcher(dal);

    assert!(launcher.submit(1, JobPriority::Low));
    // Second call is a no-op while the first is queued, any priority.
    assert!(!launcher.submit(1, JobPriority::High));
    assert!(!launcher.submit(1, JobPriority::Low));
    assert_eq!(launcher.queued_len(), 1);
}

#[tokio::test]
#[serial]
async fn test_priority_partition_then_fifo() {
    let dal = reset_and_dal();
    let launcher = noop_launcher(dal);

    // Submission order: (A=1, LOW), (B=2, HIGH), (C=3, HIGH)
    launcher.submit(1, JobPriority::Low);
    launcher.submit(2, JobPriority::High);
    launcher.submit(3, JobPriority::High);

    // Dequeue order: B, C, A
    let (first, outcome) = launcher.drive_once().await.expect("first run");
    assert_eq!(first, 2);
    assert_eq!(outcome, JobOutcome::Completed);
    let (second, _) = launcher.drive_once().await.expect("second run");
    assert_eq!(second, 3);
    let (third, _) = launcher.drive_once().await.expect("third run");
    assert_eq!(third, 1);
    assert!(launcher.drive_once().await.is_none());
}

#[tokio::test]
#[serial]
async fn test_no_duplicate_while_running() {
    let dal = reset_and_dal();

    let gate = Arc::new(Semaphore::new(0));
    let mut registry = StepRegistry::new();
    registry
        .register(Arc::new(GateProvider {
            step: Arc::new(GateStep {
                gate: Arc::clone(&gate),
            }),
        }))
        .unwrap();
    let pipeline = Arc::new(CollectionPipeline::new(dal.clone(), &registry));
    let launcher = PriorityJobLauncher::new(pipeline, test_launcher_config());

    assert!(launcher.submit(1, JobPriority::High));

    let driver = launcher.clone();
    let running = tokio::spawn(async move { driver.drive_once().await });

    // Wait until the job is mid-flight.
    while !launcher.is_running(1) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Mid-flight submissions are no-ops.
    assert!(!launcher.submit(1, JobPriority::High));
    assert!(!launcher.submit(1, JobPriority::Low));
    assert_eq!(launcher.queued_len(), 0);

    gate.add_permits(1);
    let result = running.await.expect("driver task");
    assert_eq!(result, Some((1, JobOutcome::Completed)));

    // Once finished, the subject is submittable again.
    assert!(!launcher.is_running(1));
    assert!(launcher.submit(1, JobPriority::Low));
}

#[tokio::test]
#[serial]
async fn test_execution_recorded_in_history() {
    let dal = reset_and_dal();
    let launcher = noop_launcher(dal.clone());

    launcher.submit(5, JobPriority::High);
    let (subject, outcome) = launcher.drive_once().await.expect("run");
    assert_eq!(subject, 5);
    assert_eq!(outcome, JobOutcome::Completed);

    let history = dal.job_execution().list_for_subject(5).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, JobOutcome::Completed);
    assert!(!history[0].run_id.is_empty());
}

async fn seed_subject(dal: &DAL, id: i64) {
    dal.subject()
        .create(NewSubject {
            id,
            github_login: format!("subject-{}", id),
            github_token: Some("token".to_string()),
        })
        .await
        .expect("seed subject");
}

fn seed_completed_run(subject_id: i64, hours_ago: i64) {
    let fixture = get_or_init_fixture();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    let t = (Utc::now() - chrono::Duration::hours(hours_ago)).to_rfc3339();
    guard.execute_sql(&format!(
        "INSERT INTO job_executions \
         (id, subject_id, run_id, outcome, started_at, ended_at, steps_completed, created_at, updated_at) \
         VALUES (randomblob(16), {subject_id}, 'seeded', 'Completed', '{t}', '{t}', 1, '{t}', '{t}')",
    ));
}

#[tokio::test]
#[serial]
async fn test_recovery_submits_overdue_and_arms_timers() {
    let dal = reset_and_dal();
    let launcher = noop_launcher(dal.clone());

    // Subject 10: last run 3h ago with a 2h interval -> overdue.
    // Subject 11: last run 1h ago -> due in 1h.
    // Subject 12: no history -> due immediately.
    for id in [10, 11, 12] {
        seed_subject(&dal, id).await;
    }
    seed_completed_run(10, 3);
    seed_completed_run(11, 1);

    let recovery = ScheduleRecovery::new(
        dal.clone(),
        launcher.clone(),
        Duration::from_secs(2 * 60 * 60),
    );
    let summary = recovery.recover().await.expect("recovery");

    assert_eq!(summary.immediate, 2);
    assert_eq!(summary.scheduled, 1);
    assert!(launcher.is_queued(10));
    assert!(!launcher.is_queued(11));
    assert!(launcher.is_queued(12));
}

#[tokio::test]
#[serial]
async fn test_recovery_skips_inactive_subjects() {
    let dal = reset_and_dal();
    let launcher = noop_launcher(dal.clone());

    seed_subject(&dal, 20).await;
    {
        let fixture = get_or_init_fixture();
        let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
        guard.execute_sql("UPDATE subjects SET active = 0 WHERE id = 20");
    }

    let recovery = ScheduleRecovery::new(
        dal,
        launcher.clone(),
        Duration::from_secs(2 * 60 * 60),
    );
    let summary = recovery.recover().await.expect("recovery");
    assert_eq!(summary.immediate, 0);
    assert_eq!(summary.scheduled, 0);
    assert!(!launcher.is_queued(20));
}
