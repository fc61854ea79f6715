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

//! Execution context shared across the steps of one job run.
//!
//! A keyed JSON map plus the job parameters. Earlier steps seed values
//! (login, token, discovered repositories) that later steps consume.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;

/// Context key set by credential resolution when the subject cannot be
/// collected this run (missing/blank token). Later steps check it and no-op.
pub const KEY_COLLECTION_SKIPPED: &str = "collection_skipped";

/// Context key holding the subject's GitHub login.
pub const KEY_GITHUB_LOGIN: &str = "github_login";

/// Context key holding the subject's API token.
pub const KEY_GITHUB_TOKEN: &str = "github_token";

/// Context key holding the `owner/name` list produced by repository discovery.
pub const KEY_DISCOVERED_REPOS: &str = "discovered_repos";

/// Per-run execution context.
#[derive(Debug, Clone)]
pub struct StepContext {
    subject_id: i64,
    run_id: String,
    data: HashMap<String, serde_json::Value>,
}

impl StepContext {
    /// Creates a context for one job run.
    pub fn new(subject_id: i64, run_id: impl Into<String>) -> Self {
        Self {
            subject_id,
            run_id: run_id.into(),
            data: HashMap::new(),
        }
    }

    pub fn subject_id(&self) -> i64 {
        self.subject_id
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Inserts a value under the given key, replacing any previous value.
    ///
    /// Serialization of the plain data types stored here does not fail; a
    /// value that cannot be serialized is a programming error.
    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        let encoded = serde_json::to_value(value)
            .expect("context values must be JSON-serializable");
        self.data.insert(key.into(), encoded);
    }

    /// Reads a typed value, returning `None` when the key is absent or the
    /// stored value does not decode as `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// True when an earlier step marked this run as a soft skip.
    pub fn is_skipped(&self) -> bool {
        self.get::<bool>(KEY_COLLECTION_SKIPPED).unwrap_or(false)
    }

    pub fn data(&self) -> &HashMap<String, serde_json::Value> {
        &self.data
    }
}
