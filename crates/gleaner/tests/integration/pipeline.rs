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

//! End-to-end pipeline tests over the scripted transport: full collection
//! runs, fact idempotence across re-runs, soft skips, and the skip-limit
//! boundary.

use crate::fixtures::{
    activity_page, commits_page, get_or_init_fixture, graphql_ok, issues_page,
    pull_requests_page, ScriptedTransport,
};
use gleaner::config::StepsConfig;
use gleaner::dal::DAL;
use gleaner::harvest::steps::register_default_steps;
use gleaner::harvest::HarvestClient;
use gleaner::models::harvested_fact::FactKind;
use gleaner::models::job_execution::JobOutcome;
use gleaner::models::outbox_message::OutboxStatus;
use gleaner::models::subject::NewSubject;
use gleaner::step::{CollectionPipeline, StepRegistry};
use serial_test::serial;
use std::sync::Arc;

fn reset_and_dal() -> DAL {
    let fixture = get_or_init_fixture();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.reset_database();
    guard.initialize();
    guard.get_dal()
}

fn build_pipeline(
    dal: DAL,
    transport: Arc<ScriptedTransport>,
    config: StepsConfig,
) -> CollectionPipeline {
    let client = HarvestClient::new(transport, 100, 100);
    let mut registry = StepRegistry::new();
    register_default_steps(&mut registry, dal.clone(), client, config).expect("register steps");
    CollectionPipeline::new(dal, &registry)
}

async fn seed_subject(dal: &DAL, id: i64, token: Option<&str>) {
    dal.subject()
        .create(NewSubject {
            id,
            github_login: "octocat".to_string(),
            github_token: token.map(String::from),
        })
        .await
        .expect("seed subject");
}

/// Scripts one successful collection: 2 repositories, 2 PRs, 1 issue, and
/// 3 commits split across the repositories.
fn script_full_run(transport: &ScriptedTransport) {
    transport.push_activity(graphql_ok(activity_page(
        "octocat",
        &["octocat/alpha", "octocat/beta"],
        false,
        Some("repo-c1"),
    )));
    transport.push_pull_requests(graphql_ok(pull_requests_page(
        &[("pr1", Some("octocat/alpha")), ("pr2", Some("octocat/beta"))],
        false,
        Some("pr-c1"),
    )));
    transport.push_issues(graphql_ok(issues_page(
        &[("is1", Some("octocat/alpha"))],
        false,
        Some("is-c1"),
    )));
    // Commit fetches arrive in discovery order: alpha, then beta.
    transport.push_commits(graphql_ok(commits_page(&["c1", "c2"], false, None)));
    transport.push_commits(graphql_ok(commits_page(&["c3"], false, None)));
}

#[tokio::test]
#[serial]
async fn test_full_collection_run() {
    let dal = reset_and_dal();
    seed_subject(&dal, 1, Some("token")).await;

    let transport = ScriptedTransport::new();
    script_full_run(&transport);
    let pipeline = build_pipeline(dal.clone(), transport, StepsConfig::default());

    let outcome = pipeline.run(1, "run-1").await.expect("pipeline run");
    assert_eq!(outcome, JobOutcome::Completed);

    let facts = dal.harvested_fact();
    assert_eq!(facts.count_of_kind(1, FactKind::ContributedRepo).await.unwrap(), 2);
    assert_eq!(facts.count_of_kind(1, FactKind::PullRequest).await.unwrap(), 2);
    assert_eq!(facts.count_of_kind(1, FactKind::Issue).await.unwrap(), 1);
    assert_eq!(facts.count_of_kind(1, FactKind::Commit).await.unwrap(), 3);

    // Commits landed under the right repositories.
    let commits = facts.list_of_kind(1, FactKind::Commit).await.unwrap();
    let alpha_commits = commits
        .iter()
        .filter(|f| f.source_repository == "octocat/alpha")
        .count();
    assert_eq!(alpha_commits, 2);

    // Metadata finalized with the cursors the fetches reported.
    let metadata = dal.collection_metadata().get(1).await.unwrap().expect("metadata");
    assert!(metadata.last_full_collection_at.is_some());
    assert_eq!(metadata.cursors.repo_cursor.as_deref(), Some("repo-c1"));
    assert_eq!(metadata.cursors.pull_request_cursor.as_deref(), Some("pr-c1"));
    assert_eq!(metadata.cursors.issue_cursor.as_deref(), Some("is-c1"));

    // The completion event is queued, pending.
    let pending = dal.outbox_message().list_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_type, "EvaluationRequested");
    assert!(pending[0].payload.contains("\"subject_id\":1"));
}

#[tokio::test]
#[serial]
async fn test_rerun_over_identical_data_is_idempotent() {
    let dal = reset_and_dal();
    seed_subject(&dal, 1, Some("token")).await;

    let transport = ScriptedTransport::new();
    script_full_run(&transport);
    script_full_run(&transport);
    let pipeline = build_pipeline(dal.clone(), transport, StepsConfig::default());

    assert_eq!(pipeline.run(1, "run-1").await.unwrap(), JobOutcome::Completed);
    let count_after_first = dal.harvested_fact().count_for_subject(1).await.unwrap();

    assert_eq!(pipeline.run(1, "run-2").await.unwrap(), JobOutcome::Completed);
    let count_after_second = dal.harvested_fact().count_for_subject(1).await.unwrap();

    // Identical upstream data produces the same row count.
    assert_eq!(count_after_first, 8);
    assert_eq!(count_after_second, count_after_first);

    // Each successful run queues its own completion event.
    assert_eq!(
        dal.outbox_message().count_with_status(OutboxStatus::Pending).await.unwrap(),
        2
    );
}

#[tokio::test]
#[serial]
async fn test_missing_token_soft_skips_run() {
    let dal = reset_and_dal();
    seed_subject(&dal, 2, None).await;

    // No scripted responses: any network call would fail the run.
    let transport = ScriptedTransport::new();
    let pipeline = build_pipeline(dal.clone(), transport, StepsConfig::default());

    let outcome = pipeline.run(2, "run-1").await.expect("pipeline run");
    assert_eq!(outcome, JobOutcome::Completed);

    assert_eq!(dal.harvested_fact().count_for_subject(2).await.unwrap(), 0);
    assert!(dal.collection_metadata().get(2).await.unwrap().is_none());
    assert_eq!(
        dal.outbox_message().count_with_status(OutboxStatus::Pending).await.unwrap(),
        0
    );

    // The skipped run still completes in the history.
    let history = dal.job_execution().list_for_subject(2).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, JobOutcome::Completed);
}

fn strict_skip_config() -> StepsConfig {
    StepsConfig {
        chunk_size: 10,
        retry_limit: 3,
        skip_limit: 2,
    }
}

/// Pull requests without a repository reference are bad items.
fn script_run_with_bad_pull_requests(transport: &ScriptedTransport, bad: usize) {
    transport.push_activity(graphql_ok(activity_page("octocat", &[], false, None)));
    let mut entries: Vec<(String, Option<&str>)> = (0..8)
        .map(|n| (format!("pr{}", n), Some("octocat/alpha")))
        .collect();
    for n in 0..bad {
        entries.push((format!("bad{}", n), None));
    }
    let borrowed: Vec<(&str, Option<&str>)> =
        entries.iter().map(|(id, repo)| (id.as_str(), *repo)).collect();
    transport.push_pull_requests(graphql_ok(pull_requests_page(&borrowed, false, None)));
    transport.push_issues(graphql_ok(issues_page(&[], false, None)));
    // No repositories discovered, so commit mining has no input.
}

#[tokio::test]
#[serial]
async fn test_skip_limit_boundary_tolerates_exact_budget() {
    let dal = reset_and_dal();
    seed_subject(&dal, 1, Some("token")).await;

    // Exactly skip_limit bad items: the step completes with the good facts.
    let transport = ScriptedTransport::new();
    script_run_with_bad_pull_requests(&transport, 2);
    let pipeline = build_pipeline(dal.clone(), transport, strict_skip_config());

    let outcome = pipeline.run(1, "run-1").await.unwrap();
    assert_eq!(outcome, JobOutcome::Completed);
    assert_eq!(
        dal.harvested_fact().count_of_kind(1, FactKind::PullRequest).await.unwrap(),
        8
    );
}

#[tokio::test]
#[serial]
async fn test_skip_limit_boundary_fails_one_past_budget() {
    let dal = reset_and_dal();
    seed_subject(&dal, 1, Some("token")).await;

    let transport = ScriptedTransport::new();
    script_run_with_bad_pull_requests(&transport, 3);
    let pipeline = build_pipeline(dal.clone(), transport, strict_skip_config());

    let outcome = pipeline.run(1, "run-1").await.unwrap();
    assert_eq!(outcome, JobOutcome::Failed);

    let history = dal.job_execution().list_for_subject(1).await.unwrap();
    assert_eq!(history.len(), 1);
    let details = history[0].error_details.as_deref().unwrap_or_default();
    assert!(details.contains("skip limit"), "details: {}", details);

    // The good items processed before exhaustion are kept; re-running after
    // the upstream is fixed will not duplicate them.
    assert_eq!(
        dal.harvested_fact().count_of_kind(1, FactKind::PullRequest).await.unwrap(),
        8
    );
}

#[tokio::test]
#[serial]
async fn test_first_page_fetch_failure_fails_job() {
    let dal = reset_and_dal();
    seed_subject(&dal, 1, Some("token")).await;

    let transport = ScriptedTransport::new();
    transport.push_activity(graphql_ok(activity_page(
        "octocat",
        &["octocat/alpha"],
        false,
        None,
    )));
    // Pull request fetch has no scripted response -> transport error on the
    // first page -> the mining step fails the job.
    let pipeline = build_pipeline(dal.clone(), transport, StepsConfig::default());

    let outcome = pipeline.run(1, "run-1").await.unwrap();
    assert_eq!(outcome, JobOutcome::Failed);

    let history = dal.job_execution().list_for_subject(1).await.unwrap();
    assert_eq!(history[0].outcome, JobOutcome::Failed);
    // Discovery completed before the failure.
    assert_eq!(history[0].steps_completed, 2);
}
