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

//! Event consumption: the idempotent consumer, default handlers, and
//! trigger-stream ingestion.

pub mod handlers;
pub mod idempotent;
pub mod trigger;

pub use handlers::{BalanceChangedHandler, EvaluationCompletedHandler, EvaluationRequestedHandler};
pub use idempotent::{Delivery, EventHandler, IdempotentConsumer, Verdict};
pub use trigger::{InMemoryTriggerSource, TriggerEntry, TriggerIngestor, TriggerSource};

#[cfg(feature = "kafka")]
pub use trigger::KafkaTriggerSource;
