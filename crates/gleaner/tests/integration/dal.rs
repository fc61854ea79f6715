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

//! DAL-level tests: fact idempotence, outbox state transitions, metadata
//! finalization, execution history.

use crate::fixtures::get_or_init_fixture;
use gleaner::dal::DAL;
use gleaner::models::collection_metadata::CollectionCursors;
use gleaner::models::harvested_fact::{FactKind, NewHarvestedFact};
use gleaner::models::job_execution::{JobOutcome, NewJobExecution};
use gleaner::models::outbox_message::{NewOutboxMessage, OutboxStatus};
use gleaner::models::subject::NewSubject;
use gleaner::outbox::event_types;
use serial_test::serial;

fn reset_and_dal() -> DAL {
    let fixture = get_or_init_fixture();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.reset_database();
    guard.initialize();
    guard.get_dal()
}

fn fact(subject_id: i64, repo: &str, natural_id: &str) -> NewHarvestedFact {
    NewHarvestedFact {
        subject_id,
        source_repository: repo.to_string(),
        natural_id: natural_id.to_string(),
        fact_type: FactKind::Commit,
        title: Some("a commit".to_string()),
        occurred_at: None,
        payload: "{}".to_string(),
    }
}

#[tokio::test]
#[serial]
async fn test_fact_insert_is_idempotent() {
    let dal = reset_and_dal();

    let inserted = dal
        .harvested_fact()
        .insert_if_absent(fact(1, "octocat/hello", "abc123"))
        .await
        .expect("first insert");
    assert!(inserted);

    // Same natural key: no new row.
    let inserted = dal
        .harvested_fact()
        .insert_if_absent(fact(1, "octocat/hello", "abc123"))
        .await
        .expect("duplicate insert");
    assert!(!inserted);

    assert_eq!(dal.harvested_fact().count_for_subject(1).await.unwrap(), 1);

    // Same item id in a different repository is a different fact.
    assert!(dal
        .harvested_fact()
        .insert_if_absent(fact(1, "octocat/other", "abc123"))
        .await
        .unwrap());
    assert_eq!(dal.harvested_fact().count_for_subject(1).await.unwrap(), 2);
}

#[tokio::test]
#[serial]
async fn test_outbox_rows_list_oldest_first() {
    let dal = reset_and_dal();

    for n in 0..3 {
        dal.outbox_message()
            .create(NewOutboxMessage {
                message_id: format!("m{}", n),
                exchange: "gleaner.events".to_string(),
                routing_key: "balance.changed".to_string(),
                event_type: event_types::BALANCE_CHANGED.to_string(),
                payload: "{}".to_string(),
            })
            .await
            .expect("create outbox row");
    }

    let pending = dal.outbox_message().list_pending(10).await.unwrap();
    let ids: Vec<&str> = pending.iter().map(|m| m.message_id.as_str()).collect();
    assert_eq!(ids, vec!["m0", "m1", "m2"]);
    assert!(pending.iter().all(|m| m.status == OutboxStatus::Pending));

    // Bounded batch.
    let pending = dal.outbox_message().list_pending(2).await.unwrap();
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
#[serial]
async fn test_outbox_status_transitions() {
    let dal = reset_and_dal();

    let row = dal
        .outbox_message()
        .create(NewOutboxMessage {
            message_id: "m1".to_string(),
            exchange: "gleaner.events".to_string(),
            routing_key: "balance.changed".to_string(),
            event_type: event_types::BALANCE_CHANGED.to_string(),
            payload: "{}".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(row.status, OutboxStatus::Pending);
    assert!(row.published_at.is_none());

    dal.outbox_message().mark_published(row.id).await.unwrap();
    let row = dal
        .outbox_message()
        .get_by_message_id("m1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, OutboxStatus::Published);
    assert!(row.published_at.is_some());

    // Published rows are no longer pending.
    assert!(dal.outbox_message().list_pending(10).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn test_finalize_collection_writes_metadata_and_event_together() {
    let dal = reset_and_dal();

    let cursors = CollectionCursors {
        repo_cursor: Some("rc1".to_string()),
        issue_cursor: Some("ic1".to_string()),
        ..CollectionCursors::default()
    };
    let event = NewOutboxMessage {
        message_id: "evt-1".to_string(),
        exchange: "gleaner.events".to_string(),
        routing_key: "evaluation.requested".to_string(),
        event_type: event_types::EVALUATION_REQUESTED.to_string(),
        payload: "{}".to_string(),
    };

    let metadata = dal
        .collection_metadata()
        .finalize_collection(7, cursors, event)
        .await
        .expect("finalize");

    assert_eq!(metadata.subject_id, 7);
    assert!(metadata.last_full_collection_at.is_some());
    assert_eq!(metadata.cursors.repo_cursor.as_deref(), Some("rc1"));

    // The completion event committed with the metadata.
    let event = dal
        .outbox_message()
        .get_by_message_id("evt-1")
        .await
        .unwrap()
        .expect("event row");
    assert_eq!(event.status, OutboxStatus::Pending);

    // A later run never moves timestamps backwards and overwrites cursors.
    let first_full = metadata.last_full_collection_at.unwrap();
    let metadata = dal
        .collection_metadata()
        .finalize_collection(
            7,
            CollectionCursors {
                repo_cursor: Some("rc2".to_string()),
                ..CollectionCursors::default()
            },
            NewOutboxMessage {
                message_id: "evt-2".to_string(),
                exchange: "gleaner.events".to_string(),
                routing_key: "evaluation.requested".to_string(),
                event_type: event_types::EVALUATION_REQUESTED.to_string(),
                payload: "{}".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(metadata.last_full_collection_at.unwrap() >= first_full);
    assert_eq!(metadata.cursors.repo_cursor.as_deref(), Some("rc2"));
    assert_eq!(metadata.cursors.issue_cursor, None);
}

#[tokio::test]
#[serial]
async fn test_job_execution_lifecycle_and_history() {
    let dal = reset_and_dal();

    let record = dal
        .job_execution()
        .create(NewJobExecution {
            subject_id: 3,
            run_id: "run-a".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(record.outcome, JobOutcome::Running);
    assert!(record.ended_at.is_none());

    // No completed run yet.
    assert!(dal.job_execution().last_completed_end(3).await.unwrap().is_none());

    dal.job_execution().mark_completed(record.id, 6).await.unwrap();
    let record = dal.job_execution().get_by_id(record.id).await.unwrap();
    assert_eq!(record.outcome, JobOutcome::Completed);
    assert_eq!(record.steps_completed, 6);
    assert!(record.ended_at.is_some());

    let last = dal
        .job_execution()
        .last_completed_end(3)
        .await
        .unwrap()
        .expect("completed end");
    assert_eq!(last, record.ended_at.unwrap());

    // Failed runs keep their error details and do not move last_completed_end.
    let failed = dal
        .job_execution()
        .create(NewJobExecution {
            subject_id: 3,
            run_id: "run-b".to_string(),
        })
        .await
        .unwrap();
    dal.job_execution()
        .mark_failed(failed.id, "step failed: boom", 2)
        .await
        .unwrap();

    let history = dal.job_execution().list_for_subject(3).await.unwrap();
    assert_eq!(history.len(), 2);
    let failed = dal.job_execution().get_by_id(failed.id).await.unwrap();
    assert_eq!(failed.outcome, JobOutcome::Failed);
    assert_eq!(failed.error_details.as_deref(), Some("step failed: boom"));
    assert_eq!(
        dal.job_execution().last_completed_end(3).await.unwrap().unwrap(),
        last
    );
}

#[tokio::test]
#[serial]
async fn test_subject_listing() {
    let dal = reset_and_dal();

    dal.subject()
        .create(NewSubject {
            id: 1,
            github_login: "octocat".to_string(),
            github_token: Some("token".to_string()),
        })
        .await
        .unwrap();
    dal.subject()
        .create(NewSubject {
            id: 2,
            github_login: "hubber".to_string(),
            github_token: None,
        })
        .await
        .unwrap();

    let active = dal.subject().list_active().await.unwrap();
    assert_eq!(active.len(), 2);
    assert_eq!(active[0].id, 1);

    let subject = dal.subject().get(1).await.unwrap().unwrap();
    assert_eq!(subject.github_login, "octocat");
    assert!(dal.subject().get(99).await.unwrap().is_none());
}
