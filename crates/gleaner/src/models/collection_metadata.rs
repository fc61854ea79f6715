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

//! Collection metadata model: per-subject bookkeeping for the harvester.
//!
//! One row per subject, created lazily on first collection and updated at the
//! end of each successful run. Timestamps are monotonically non-decreasing;
//! cursor values are opaque tokens from the external API.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use serde::{Deserialize, Serialize};

/// Per-subject collection state (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub id: UniversalUuid,
    pub subject_id: i64,
    pub last_full_collection_at: Option<UniversalTimestamp>,
    pub last_incremental_at: Option<UniversalTimestamp>,
    pub cursors: CollectionCursors,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

/// The last pagination cursor seen per fact type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCursors {
    pub repo_cursor: Option<String>,
    pub commit_cursor: Option<String>,
    pub issue_cursor: Option<String>,
    pub pull_request_cursor: Option<String>,
}
