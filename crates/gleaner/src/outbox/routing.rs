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

//! Event routing: the explicit allow-list mapping event types to broker
//! destinations.
//!
//! An event type missing from this table is a programming error, surfaced
//! loudly by the publisher rather than silently dropped. Adding an event
//! type is a compile-visible edit to one match.

/// Known event type names.
pub mod event_types {
    /// Collection finished; downstream evaluation requested
    pub const EVALUATION_REQUESTED: &str = "EvaluationRequested";
    /// An evaluation produced its result
    pub const EVALUATION_COMPLETED: &str = "EvaluationCompleted";
    /// A subject's balance changed (e.g. points granted)
    pub const BALANCE_CHANGED: &str = "BalanceChanged";
}

/// A broker destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub exchange: &'static str,
    pub routing_key: &'static str,
}

/// Maps an event type to its destination.
pub fn destination_for(event_type: &str) -> Option<Destination> {
    match event_type {
        event_types::EVALUATION_REQUESTED => Some(Destination {
            exchange: "gleaner.events",
            routing_key: "evaluation.requested",
        }),
        event_types::EVALUATION_COMPLETED => Some(Destination {
            exchange: "gleaner.events",
            routing_key: "evaluation.completed",
        }),
        event_types::BALANCE_CHANGED => Some(Destination {
            exchange: "gleaner.events",
            routing_key: "balance.changed",
        }),
        _ => None,
    }
}
