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

//! Harvested fact model: one immutable row per upstream activity item.
//!
//! Facts are keyed by `(subject_id, source_repository, natural_id)`; the
//! UNIQUE constraint on that triple is what makes collection runs idempotent
//! at the fact level. Rows are appended by the pipeline's writer stages and
//! never mutated.

use crate::database::universal_types::{UniversalTimestamp, UniversalUuid};
use serde::{Deserialize, Serialize};

/// The kind of upstream activity a fact records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FactKind {
    Commit,
    Issue,
    PullRequest,
    ContributedRepo,
}

impl FactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FactKind::Commit => "Commit",
            FactKind::Issue => "Issue",
            FactKind::PullRequest => "PullRequest",
            FactKind::ContributedRepo => "ContributedRepo",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Commit" => Some(FactKind::Commit),
            "Issue" => Some(FactKind::Issue),
            "PullRequest" => Some(FactKind::PullRequest),
            "ContributedRepo" => Some(FactKind::ContributedRepo),
            _ => None,
        }
    }
}

impl std::fmt::Display for FactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A harvested activity fact (domain type).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestedFact {
    pub id: UniversalUuid,
    pub subject_id: i64,
    /// `owner/name` of the repository the item belongs to
    pub source_repository: String,
    /// Stable upstream identifier (commit oid, issue/PR node id, repo name)
    pub natural_id: String,
    pub fact_type: FactKind,
    pub title: Option<String>,
    pub occurred_at: Option<UniversalTimestamp>,
    /// Raw upstream item, serialized JSON
    pub payload: String,
    pub collected_at: UniversalTimestamp,
}

/// Structure for creating new facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHarvestedFact {
    pub subject_id: i64,
    pub source_repository: String,
    pub natural_id: String,
    pub fact_type: FactKind,
    pub title: Option<String>,
    pub occurred_at: Option<UniversalTimestamp>,
    pub payload: String,
}
