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

//! Outbox publisher tests: eventual delivery, per-row failure isolation,
//! non-retry of failed rows, and batch bounding.

use crate::fixtures::get_or_init_fixture;
use gleaner::config::OutboxConfig;
use gleaner::dal::DAL;
use gleaner::models::outbox_message::{NewOutboxMessage, OutboxStatus};
use gleaner::outbox::{event_types, Broker, InMemoryBroker, OutboxPublisher};
use serial_test::serial;
use std::sync::Arc;

fn reset_and_dal() -> DAL {
    let fixture = get_or_init_fixture();
    let mut guard = fixture.lock().unwrap_or_else(|e| e.into_inner());
    guard.reset_database();
    guard.initialize();
    guard.get_dal()
}

fn outbox_config(batch_size: i64) -> OutboxConfig {
    OutboxConfig {
        publish_interval_secs: 1,
        batch_size,
    }
}

async fn queue_event(dal: &DAL, message_id: &str, event_type: &str) {
    dal.outbox_message()
        .create(NewOutboxMessage {
            message_id: message_id.to_string(),
            exchange: "gleaner.events".to_string(),
            routing_key: "unused-stored-key".to_string(),
            event_type: event_type.to_string(),
            payload: format!("{{\"message\":\"{}\"}}", message_id),
        })
        .await
        .expect("queue event");
}

#[tokio::test]
#[serial]
async fn test_pending_row_published_on_broker_accept() {
    let dal = reset_and_dal();
    let broker = Arc::new(InMemoryBroker::new());
    let publisher = OutboxPublisher::new(dal.clone(), (Arc::clone(&broker) as Arc<dyn Broker>), outbox_config(100));

    queue_event(&dal, "m1", event_types::BALANCE_CHANGED).await;

    let (published, failed) = publisher.publish_pending().await.expect("tick");
    assert_eq!((published, failed), (1, 0));

    let row = dal.outbox_message().get_by_message_id("m1").await.unwrap().unwrap();
    assert_eq!(row.status, OutboxStatus::Published);
    assert!(row.published_at.is_some());

    let sent = broker.published();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message_id, "m1");
    // Destination comes from the allow-list, not the stored row.
    assert_eq!(sent[0].routing_key, "balance.changed");
    assert_eq!(sent[0].payload, b"{\"message\":\"m1\"}".to_vec());
}

#[tokio::test]
#[serial]
async fn test_broker_rejection_marks_failed_and_is_not_retried() {
    let dal = reset_and_dal();
    let broker = Arc::new(InMemoryBroker::new());
    broker.reject_routing_key("balance.changed");
    let publisher = OutboxPublisher::new(dal.clone(), (Arc::clone(&broker) as Arc<dyn Broker>), outbox_config(100));

    queue_event(&dal, "m1", event_types::BALANCE_CHANGED).await;

    let (published, failed) = publisher.publish_pending().await.expect("tick");
    assert_eq!((published, failed), (0, 1));
    let row = dal.outbox_message().get_by_message_id("m1").await.unwrap().unwrap();
    assert_eq!(row.status, OutboxStatus::Failed);

    // A subsequent tick does not pick the failed row back up.
    let (published, failed) = publisher.publish_pending().await.expect("second tick");
    assert_eq!((published, failed), (0, 0));
    assert!(broker.published().is_empty());
}

#[tokio::test]
#[serial]
async fn test_one_bad_row_never_blocks_the_batch() {
    let dal = reset_and_dal();
    let broker = Arc::new(InMemoryBroker::new());
    broker.reject_routing_key("evaluation.completed");
    let publisher = OutboxPublisher::new(dal.clone(), (Arc::clone(&broker) as Arc<dyn Broker>), outbox_config(100));

    queue_event(&dal, "m1", event_types::EVALUATION_COMPLETED).await;
    queue_event(&dal, "m2", event_types::BALANCE_CHANGED).await;

    let (published, failed) = publisher.publish_pending().await.expect("tick");
    assert_eq!((published, failed), (1, 1));

    let m1 = dal.outbox_message().get_by_message_id("m1").await.unwrap().unwrap();
    let m2 = dal.outbox_message().get_by_message_id("m2").await.unwrap().unwrap();
    assert_eq!(m1.status, OutboxStatus::Failed);
    assert_eq!(m2.status, OutboxStatus::Published);
}

#[tokio::test]
#[serial]
async fn test_unmapped_event_type_fails_loudly() {
    let dal = reset_and_dal();
    let broker = Arc::new(InMemoryBroker::new());
    let publisher = OutboxPublisher::new(dal.clone(), (Arc::clone(&broker) as Arc<dyn Broker>), outbox_config(100));

    queue_event(&dal, "m1", "NobodyKnowsThisType").await;

    let (published, failed) = publisher.publish_pending().await.expect("tick");
    assert_eq!((published, failed), (0, 1));
    let row = dal.outbox_message().get_by_message_id("m1").await.unwrap().unwrap();
    assert_eq!(row.status, OutboxStatus::Failed);
    // Nothing reached the broker.
    assert!(broker.published().is_empty());
}

#[tokio::test]
#[serial]
async fn test_batch_is_bounded_and_oldest_first() {
    let dal = reset_and_dal();
    let broker = Arc::new(InMemoryBroker::new());
    let publisher = OutboxPublisher::new(dal.clone(), (Arc::clone(&broker) as Arc<dyn Broker>), outbox_config(3));

    for n in 0..5 {
        queue_event(&dal, &format!("m{}", n), event_types::BALANCE_CHANGED).await;
    }

    let (published, _) = publisher.publish_pending().await.expect("first tick");
    assert_eq!(published, 3);
    let ids: Vec<String> = broker.published().iter().map(|m| m.message_id.clone()).collect();
    assert_eq!(ids, vec!["m0", "m1", "m2"]);

    let (published, _) = publisher.publish_pending().await.expect("second tick");
    assert_eq!(published, 2);
    assert_eq!(
        dal.outbox_message().count_with_status(OutboxStatus::Pending).await.unwrap(),
        0
    );
}
