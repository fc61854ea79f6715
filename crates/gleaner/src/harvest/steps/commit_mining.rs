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

//! Commit mining (chunked over discovered repositories).
//!
//! Each item is one repository: its default-branch history is fetched (with
//! salvage) and written as `Commit` facts. A repository that vanished or
//! turned inaccessible is bad data; a network failure is transient and
//! retries the chunk. Fact writes are idempotent, so a retried chunk
//! re-fetching an already-written repository is harmless.

use super::pull_request_mining::parse_occurred_at;
use super::retry_policy_from;
use crate::config::StepsConfig;
use crate::dal::DAL;
use crate::error::{ItemError, StepError};
use crate::harvest::client::HarvestClient;
use crate::models::harvested_fact::{FactKind, NewHarvestedFact};
use crate::step::context::{KEY_DISCOVERED_REPOS, KEY_GITHUB_TOKEN};
use crate::step::{ChunkWorker, ChunkedStep, Step, StepContext, StepProvider};
use crate::error::HarvestError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const STEP_NAME: &str = "commit_mining";

struct CommitMiningWorker {
    dal: DAL,
    client: HarvestClient,
}

#[async_trait]
impl ChunkWorker for CommitMiningWorker {
    type Item = String;

    fn name(&self) -> &str {
        STEP_NAME
    }

    async fn read(&self, ctx: &mut StepContext) -> Result<Vec<String>, StepError> {
        let repos: Vec<String> = ctx.get(KEY_DISCOVERED_REPOS).unwrap_or_default();
        if repos.is_empty() {
            debug!("No repositories to mine commits from for subject {}", ctx.subject_id());
        }
        Ok(repos)
    }

    async fn process(&self, repo: &String, ctx: &StepContext) -> Result<(), ItemError> {
        let token: String = ctx
            .get(KEY_GITHUB_TOKEN)
            .ok_or_else(|| ItemError::Fatal("github token missing from context".to_string()))?;

        let commits = self
            .client
            .fetch_repository_commits(repo, &token)
            .await
            .map_err(|e| match e {
                HarvestError::Transport(message) => ItemError::Transient(message),
                HarvestError::Malformed(message) => ItemError::BadItem(message),
            })?;

        for commit in &commits.items {
            let occurred_at = parse_occurred_at(commit.committed_date.as_deref(), &commit.oid)?;
            let payload = serde_json::to_string(commit)
                .map_err(|e| ItemError::BadItem(format!("unserializable commit: {}", e)))?;

            self.dal
                .harvested_fact()
                .insert_if_absent(NewHarvestedFact {
                    subject_id: ctx.subject_id(),
                    source_repository: repo.clone(),
                    natural_id: commit.oid.clone(),
                    fact_type: FactKind::Commit,
                    title: commit.message_headline.clone(),
                    occurred_at,
                    payload,
                })
                .await?;
        }

        debug!("Mined {} commits from {}", commits.items.len(), repo);
        Ok(())
    }
}

/// Provider for the commit mining step.
pub struct CommitMiningProvider {
    dal: DAL,
    client: HarvestClient,
    config: StepsConfig,
}

impl CommitMiningProvider {
    pub fn new(dal: DAL, client: HarvestClient, config: StepsConfig) -> Self {
        Self {
            dal,
            client,
            config,
        }
    }
}

impl StepProvider for CommitMiningProvider {
    fn order(&self) -> i32 {
        50
    }

    fn name(&self) -> &str {
        STEP_NAME
    }

    fn build_step(&self) -> Arc<dyn Step> {
        Arc::new(ChunkedStep::new(
            CommitMiningWorker {
                dal: self.dal.clone(),
                client: self.client.clone(),
            },
            self.config.chunk_size,
            retry_policy_from(&self.config),
            self.config.skip_limit,
        ))
    }
}
