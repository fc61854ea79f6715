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

//! Processed message model: the idempotency ledger.
//!
//! Existence of a row for a `message_id` means the corresponding consumer
//! side effect has already been applied exactly once. Rows are inserted
//! atomically with the side effect they guard, in one local transaction.

use crate::database::universal_types::UniversalTimestamp;
use serde::{Deserialize, Serialize};

/// A ledger entry (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedMessage {
    pub message_id: String,
    pub event_type: String,
    pub processed_at: UniversalTimestamp,
}
