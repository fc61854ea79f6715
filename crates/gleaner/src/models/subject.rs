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

//! Subject model: a registered user whose GitHub activity is harvested.

use crate::database::universal_types::UniversalTimestamp;
use serde::{Deserialize, Serialize};

/// A registered subject (domain type).
///
/// `github_token` is optional: a subject without a token (or with a revoked
/// one) is soft-skipped by the harvesting client rather than failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
    /// External subject identifier
    pub id: i64,
    /// GitHub login used in GraphQL queries
    pub github_login: String,
    /// API token presented to the external API
    pub github_token: Option<String>,
    /// Inactive subjects are excluded from schedule recovery
    pub active: bool,
    pub created_at: UniversalTimestamp,
    pub updated_at: UniversalTimestamp,
}

/// Structure for registering new subjects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubject {
    pub id: i64,
    pub github_login: String,
    pub github_token: Option<String>,
}
