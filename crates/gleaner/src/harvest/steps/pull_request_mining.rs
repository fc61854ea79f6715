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

//! Pull request mining (chunked).
//!
//! Reads the subject's pull requests (salvaged pagination) once, then writes
//! one `PullRequest` fact per item under the chunk fault policy. Items
//! without a repository reference or with an unparseable timestamp are bad
//! data, counted against the skip budget.

use super::{retry_policy_from, KEY_PULL_REQUEST_CURSOR};
use crate::config::StepsConfig;
use crate::dal::DAL;
use crate::database::universal_types::UniversalTimestamp;
use crate::error::{ItemError, StepError};
use crate::harvest::client::HarvestClient;
use crate::harvest::types::PullRequestNode;
use crate::models::harvested_fact::{FactKind, NewHarvestedFact};
use crate::step::{ChunkWorker, ChunkedStep, Step, StepContext, StepProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const STEP_NAME: &str = "pull_request_mining";

struct PullRequestMiningWorker {
    dal: DAL,
    client: HarvestClient,
}

#[async_trait]
impl ChunkWorker for PullRequestMiningWorker {
    type Item = PullRequestNode;

    fn name(&self) -> &str {
        STEP_NAME
    }

    async fn read(&self, ctx: &mut StepContext) -> Result<Vec<PullRequestNode>, StepError> {
        let (login, token) = super::repository_discovery::credentials(ctx)?;
        let paged = self
            .client
            .fetch_user_pull_requests(&login, &token)
            .await
            .map_err(|e| StepError::Fatal(format!("pull request fetch failed: {}", e)))?;

        ctx.insert(KEY_PULL_REQUEST_CURSOR, paged.last_cursor.clone());
        debug!(
            "Fetched {} pull requests for subject {}",
            paged.items.len(),
            ctx.subject_id()
        );
        Ok(paged.items)
    }

    async fn process(&self, item: &PullRequestNode, ctx: &StepContext) -> Result<(), ItemError> {
        let repository = item
            .repository
            .as_ref()
            .map(|r| r.name_with_owner.clone())
            .ok_or_else(|| {
                ItemError::BadItem(format!("pull request {} has no repository", item.id))
            })?;
        let occurred_at = parse_occurred_at(item.created_at.as_deref(), &item.id)?;
        let payload = serde_json::to_string(item)
            .map_err(|e| ItemError::BadItem(format!("unserializable pull request: {}", e)))?;

        self.dal
            .harvested_fact()
            .insert_if_absent(NewHarvestedFact {
                subject_id: ctx.subject_id(),
                source_repository: repository,
                natural_id: item.id.clone(),
                fact_type: FactKind::PullRequest,
                title: item.title.clone(),
                occurred_at,
                payload,
            })
            .await?;
        Ok(())
    }
}

/// Parses an upstream timestamp, treating an unparseable value as bad data.
pub(crate) fn parse_occurred_at(
    raw: Option<&str>,
    natural_id: &str,
) -> Result<Option<UniversalTimestamp>, ItemError> {
    match raw {
        None => Ok(None),
        Some(s) => UniversalTimestamp::from_rfc3339(s).map(Some).map_err(|e| {
            ItemError::BadItem(format!("item {} has invalid timestamp '{}': {}", natural_id, s, e))
        }),
    }
}

/// Provider for the pull request mining step.
pub struct PullRequestMiningProvider {
    dal: DAL,
    client: HarvestClient,
    config: StepsConfig,
}

impl PullRequestMiningProvider {
    pub fn new(dal: DAL, client: HarvestClient, config: StepsConfig) -> Self {
        Self {
            dal,
            client,
            config,
        }
    }
}

impl StepProvider for PullRequestMiningProvider {
    fn order(&self) -> i32 {
        30
    }

    fn name(&self) -> &str {
        STEP_NAME
    }

    fn build_step(&self) -> Arc<dyn Step> {
        Arc::new(ChunkedStep::new(
            PullRequestMiningWorker {
                dal: self.dal.clone(),
                client: self.client.clone(),
            },
            self.config.chunk_size,
            retry_policy_from(&self.config),
            self.config.skip_limit,
        ))
    }
}
