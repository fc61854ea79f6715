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

//! Consumer tests: idempotent consumption under duplicate delivery,
//! dead-lettering of poison messages, the evaluation event cascade, and
//! trigger ingestion.

use crate::fixtures::get_or_init_fixture;
use gleaner::config::{LauncherConfig, TriggerConfig};
use gleaner::consumer::{
    BalanceChangedHandler, Delivery, EvaluationCompletedHandler, EvaluationRequestedHandler,
    IdempotentConsumer, InMemoryTriggerSource, TriggerIngestor, Verdict,
};
use gleaner::dal::DAL;
use gleaner::launcher::PriorityJobLauncher;
use gleaner::models::outbox_message::OutboxStatus;
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

fn count_rows(table: &str) -> i64 {
    let fixture = get_or_init_fixture();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.count_rows(table)
}

fn consumer_with_default_handlers(dal: DAL) -> IdempotentConsumer {
    let mut consumer = IdempotentConsumer::new(dal);
    consumer.register_handler(Arc::new(EvaluationRequestedHandler));
    consumer.register_handler(Arc::new(EvaluationCompletedHandler));
    consumer.register_handler(Arc::new(BalanceChangedHandler));
    consumer
}

fn balance_delivery(message_id: &str) -> Delivery {
    Delivery {
        message_id: message_id.to_string(),
        event_type: "BalanceChanged".to_string(),
        payload: "{\"subject_id\":1,\"delta\":50,\"reason\":\"weekly grant\"}".to_string(),
    }
}

#[tokio::test]
#[serial]
async fn test_duplicate_delivery_applies_side_effect_exactly_once() {
    let dal = reset_and_dal();
    let consumer = consumer_with_default_handlers(dal.clone());

    // First delivery applies the side effect.
    assert_eq!(consumer.process(balance_delivery("m1")).await, Verdict::Ack);
    assert_eq!(count_rows("balance_ledger"), 1);
    assert_eq!(dal.processed_message().count().await.unwrap(), 1);

    // Second delivery of the same message id acknowledges without
    // re-applying.
    assert_eq!(consumer.process(balance_delivery("m1")).await, Verdict::Ack);
    assert_eq!(count_rows("balance_ledger"), 1);
    assert_eq!(dal.processed_message().count().await.unwrap(), 1);

    // A different message id is its own side effect.
    assert_eq!(consumer.process(balance_delivery("m2")).await, Verdict::Ack);
    assert_eq!(count_rows("balance_ledger"), 2);
}

#[tokio::test]
#[serial]
async fn test_unknown_event_type_dead_letters() {
    let dal = reset_and_dal();
    let consumer = consumer_with_default_handlers(dal.clone());

    let verdict = consumer
        .process(Delivery {
            message_id: "m1".to_string(),
            event_type: "NobodyKnowsThisType".to_string(),
            payload: "{}".to_string(),
        })
        .await;
    assert_eq!(verdict, Verdict::DeadLetter);
    assert_eq!(dal.processed_message().count().await.unwrap(), 0);
}

#[tokio::test]
#[serial]
async fn test_poison_payload_dead_letters_without_ledger_entry() {
    let dal = reset_and_dal();
    let consumer = consumer_with_default_handlers(dal.clone());

    let verdict = consumer
        .process(Delivery {
            message_id: "m1".to_string(),
            event_type: "BalanceChanged".to_string(),
            payload: "this is not json".to_string(),
        })
        .await;
    assert_eq!(verdict, Verdict::DeadLetter);

    // The failed transaction recorded nothing: neither side effect nor
    // ledger entry.
    assert_eq!(count_rows("balance_ledger"), 0);
    assert_eq!(dal.processed_message().count().await.unwrap(), 0);

    // A later, corrected delivery with a NEW message id applies normally.
    assert_eq!(consumer.process(balance_delivery("m2")).await, Verdict::Ack);
    assert_eq!(count_rows("balance_ledger"), 1);
}

#[tokio::test]
#[serial]
async fn test_evaluation_request_cascades_completion_event() {
    let dal = reset_and_dal();
    let consumer = consumer_with_default_handlers(dal.clone());

    let verdict = consumer
        .process(Delivery {
            message_id: "m1".to_string(),
            event_type: "EvaluationRequested".to_string(),
            payload: "{\"subject_id\":1,\"run_id\":\"run-1\"}".to_string(),
        })
        .await;
    assert_eq!(verdict, Verdict::Ack);
    assert_eq!(count_rows("evaluations"), 1);

    // The follow-up event committed with the evaluation, pending publication.
    let pending = dal.outbox_message().list_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_type, "EvaluationCompleted");
    assert_eq!(pending[0].status, OutboxStatus::Pending);

    // Consuming the completion event notifies the subject.
    let verdict = consumer
        .process(Delivery {
            message_id: pending[0].message_id.clone(),
            event_type: pending[0].event_type.clone(),
            payload: pending[0].payload.clone(),
        })
        .await;
    assert_eq!(verdict, Verdict::Ack);
    assert_eq!(count_rows("notifications"), 1);
}

fn test_launcher(dal: DAL) -> PriorityJobLauncher {
    let registry = StepRegistry::new();
    let pipeline = Arc::new(CollectionPipeline::new(dal, &registry));
    PriorityJobLauncher::new(
        pipeline,
        LauncherConfig {
            poll_interval_ms: 10,
            worker_slots: 1,
            success_interval_secs: 3600,
            failure_interval_secs: 3600,
        },
    )
}

fn test_ingestor(
    source: Arc<InMemoryTriggerSource>,
    launcher: PriorityJobLauncher,
) -> TriggerIngestor {
    TriggerIngestor::new(source, launcher, TriggerConfig::default())
}

#[tokio::test]
#[serial]
async fn test_triggers_forwarded_high_priority_and_acked() {
    let dal = reset_and_dal();
    let launcher = test_launcher(dal);
    let source = Arc::new(InMemoryTriggerSource::new());
    let ingestor = test_ingestor(Arc::clone(&source), launcher.clone());

    source.append_user_trigger(101);
    source.append_user_trigger(102);

    let handled = ingestor.poll_once().await.expect("poll");
    assert_eq!(handled, 2);
    assert!(launcher.is_queued(101));
    assert!(launcher.is_queued(102));
    assert!(source.unacknowledged_ids().is_empty());
}

#[tokio::test]
#[serial]
async fn test_malformed_trigger_skipped_and_acked() {
    let dal = reset_and_dal();
    let launcher = test_launcher(dal);
    let source = Arc::new(InMemoryTriggerSource::new());
    let ingestor = test_ingestor(Arc::clone(&source), launcher.clone());

    // Non-numeric userId and a missing userId: both skipped, both acked.
    let mut bad = std::collections::HashMap::new();
    bad.insert("userId".to_string(), "not-a-number".to_string());
    source.append(bad);
    source.append(std::collections::HashMap::new());
    source.append_user_trigger(103);

    let handled = ingestor.poll_once().await.expect("poll");
    assert_eq!(handled, 3);
    assert_eq!(launcher.queued_len(), 1);
    assert!(launcher.is_queued(103));
    assert!(source.unacknowledged_ids().is_empty());
}

#[tokio::test]
#[serial]
async fn test_duplicate_triggers_absorbed_by_submit_dedup() {
    let dal = reset_and_dal();
    let launcher = test_launcher(dal);
    let source = Arc::new(InMemoryTriggerSource::new());
    let ingestor = test_ingestor(Arc::clone(&source), launcher.clone());

    source.append_user_trigger(104);
    source.append_user_trigger(104);

    let handled = ingestor.poll_once().await.expect("poll");
    assert_eq!(handled, 2);
    assert_eq!(launcher.queued_len(), 1);
    // Both entries acknowledged even though one submission was a no-op.
    assert!(source.unacknowledged_ids().is_empty());
}

#[tokio::test]
#[serial]
async fn test_pending_entries_recovered_on_startup() {
    let dal = reset_and_dal();
    let launcher = test_launcher(dal);
    let source = Arc::new(InMemoryTriggerSource::new());

    // A previous consumer read this entry but crashed before acknowledging.
    let mut fields = std::collections::HashMap::new();
    fields.insert("userId".to_string(), "105".to_string());
    source.seed_unacknowledged(fields);

    let ingestor = test_ingestor(Arc::clone(&source), launcher.clone());
    let recovered = ingestor.recover_pending().await.expect("recover");

    assert_eq!(recovered, 1);
    assert!(launcher.is_queued(105));
    assert!(source.unacknowledged_ids().is_empty());
}
