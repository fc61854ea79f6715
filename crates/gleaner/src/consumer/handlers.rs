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

//! Default event handlers.
//!
//! Each handler applies its side effect as plain Diesel writes on the
//! consumer's transaction connection. The evaluation handler also raises the
//! follow-up `EvaluationCompleted` event by inserting the outbox row in the
//! same transaction - a consumer-side state change is a producer like any
//! other.

use super::idempotent::{Delivery, EventHandler};
use crate::database::schema::{balance_ledger, evaluations, harvested_facts, notifications, outbox_messages};
use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use crate::error::SideEffectError;
use crate::models::outbox_message::OutboxStatus;
use crate::outbox::routing::{self, event_types};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Deserialize;

fn parse_payload<'a, T: Deserialize<'a>>(delivery: &'a Delivery) -> Result<T, SideEffectError> {
    serde_json::from_str(&delivery.payload).map_err(|e| {
        SideEffectError::Handler(format!(
            "unparseable {} payload (message {}): {}",
            delivery.event_type, delivery.message_id, e
        ))
    })
}

#[derive(Debug, Insertable)]
#[diesel(table_name = evaluations)]
struct NewEvaluationRow {
    id: Vec<u8>,
    subject_id: i64,
    facts_considered: i64,
    evaluated_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = notifications)]
struct NewNotificationRow {
    id: Vec<u8>,
    subject_id: i64,
    kind: String,
    body: String,
    created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = balance_ledger)]
struct NewBalanceRow {
    id: Vec<u8>,
    subject_id: i64,
    delta: i64,
    reason: String,
    created_at: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = outbox_messages)]
struct NewOutboxRow {
    id: Vec<u8>,
    message_id: String,
    exchange: String,
    routing_key: String,
    event_type: String,
    payload: String,
    status: String,
    created_at: String,
}

/// Handles `EvaluationRequested`: evaluates the subject's harvested facts
/// and raises `EvaluationCompleted`.
///
/// Scoring formulas are out of scope; the evaluation here records the fact
/// count the downstream scorer consumes.
pub struct EvaluationRequestedHandler;

#[derive(Debug, Deserialize)]
struct EvaluationRequestedPayload {
    subject_id: i64,
    run_id: String,
}

impl EventHandler for EvaluationRequestedHandler {
    fn event_type(&self) -> &'static str {
        event_types::EVALUATION_REQUESTED
    }

    fn apply(
        &self,
        conn: &mut SqliteConnection,
        delivery: &Delivery,
    ) -> Result<(), SideEffectError> {
        let payload: EvaluationRequestedPayload = parse_payload(delivery)?;
        let now = UniversalTimestamp::now().to_rfc3339();

        let facts_considered: i64 = harvested_facts::table
            .filter(harvested_facts::subject_id.eq(payload.subject_id))
            .count()
            .get_result(conn)?;

        diesel::insert_into(evaluations::table)
            .values(&NewEvaluationRow {
                id: UniversalUuid::new_v4().as_bytes().to_vec(),
                subject_id: payload.subject_id,
                facts_considered,
                evaluated_at: now.clone(),
            })
            .execute(conn)?;

        // Raise the follow-up event in the same transaction.
        let destination = routing::destination_for(event_types::EVALUATION_COMPLETED)
            .ok_or_else(|| {
                SideEffectError::Handler("no destination for EvaluationCompleted".to_string())
            })?;
        let completed_payload = serde_json::json!({
            "subject_id": payload.subject_id,
            "run_id": payload.run_id,
            "facts_considered": facts_considered,
        })
        .to_string();
        diesel::insert_into(outbox_messages::table)
            .values(&NewOutboxRow {
                id: UniversalUuid::new_v4().as_bytes().to_vec(),
                message_id: UniversalUuid::new_v4().to_string(),
                exchange: destination.exchange.to_string(),
                routing_key: destination.routing_key.to_string(),
                event_type: event_types::EVALUATION_COMPLETED.to_string(),
                payload: completed_payload,
                status: OutboxStatus::Pending.as_str().to_string(),
                created_at: now,
            })
            .execute(conn)?;

        Ok(())
    }
}

/// Handles `EvaluationCompleted`: notifies the subject.
pub struct EvaluationCompletedHandler;

#[derive(Debug, Deserialize)]
struct EvaluationCompletedPayload {
    subject_id: i64,
    #[serde(default)]
    facts_considered: i64,
}

impl EventHandler for EvaluationCompletedHandler {
    fn event_type(&self) -> &'static str {
        event_types::EVALUATION_COMPLETED
    }

    fn apply(
        &self,
        conn: &mut SqliteConnection,
        delivery: &Delivery,
    ) -> Result<(), SideEffectError> {
        let payload: EvaluationCompletedPayload = parse_payload(delivery)?;
        let now = UniversalTimestamp::now().to_rfc3339();

        diesel::insert_into(notifications::table)
            .values(&NewNotificationRow {
                id: UniversalUuid::new_v4().as_bytes().to_vec(),
                subject_id: payload.subject_id,
                kind: "evaluation_completed".to_string(),
                body: format!(
                    "Your activity evaluation finished ({} facts considered)",
                    payload.facts_considered
                ),
                created_at: now,
            })
            .execute(conn)?;
        Ok(())
    }
}

/// Handles `BalanceChanged`: records the grant in the balance ledger.
pub struct BalanceChangedHandler;

#[derive(Debug, Deserialize)]
struct BalanceChangedPayload {
    subject_id: i64,
    delta: i64,
    reason: String,
}

impl EventHandler for BalanceChangedHandler {
    fn event_type(&self) -> &'static str {
        event_types::BALANCE_CHANGED
    }

    fn apply(
        &self,
        conn: &mut SqliteConnection,
        delivery: &Delivery,
    ) -> Result<(), SideEffectError> {
        let payload: BalanceChangedPayload = parse_payload(delivery)?;
        let now = UniversalTimestamp::now().to_rfc3339();

        diesel::insert_into(balance_ledger::table)
            .values(&NewBalanceRow {
                id: UniversalUuid::new_v4().as_bytes().to_vec(),
                subject_id: payload.subject_id,
                delta: payload.delta,
                reason: payload.reason,
                created_at: now,
            })
            .execute(conn)?;
        Ok(())
    }
}
