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

//! Issue mining (chunked). Same shape as pull request mining.

use super::pull_request_mining::parse_occurred_at;
use super::{retry_policy_from, KEY_ISSUE_CURSOR};
use crate::config::StepsConfig;
use crate::dal::DAL;
use crate::error::{ItemError, StepError};
use crate::harvest::client::HarvestClient;
use crate::harvest::types::IssueNode;
use crate::models::harvested_fact::{FactKind, NewHarvestedFact};
use crate::step::{ChunkWorker, ChunkedStep, Step, StepContext, StepProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

const STEP_NAME: &str = "issue_mining";

struct IssueMiningWorker {
    dal: DAL,
    client: HarvestClient,
}

#[async_trait]
impl ChunkWorker for IssueMiningWorker {
    type Item = IssueNode;

    fn name(&self) -> &str {
        STEP_NAME
    }

    async fn read(&self, ctx: &mut StepContext) -> Result<Vec<IssueNode>, StepError> {
        let (login, token) = super::repository_discovery::credentials(ctx)?;
        let paged = self
            .client
            .fetch_user_issues(&login, &token)
            .await
            .map_err(|e| StepError::Fatal(format!("issue fetch failed: {}", e)))?;

        ctx.insert(KEY_ISSUE_CURSOR, paged.last_cursor.clone());
        debug!(
            "Fetched {} issues for subject {}",
            paged.items.len(),
            ctx.subject_id()
        );
        Ok(paged.items)
    }

    async fn process(&self, item: &IssueNode, ctx: &StepContext) -> Result<(), ItemError> {
        let repository = item
            .repository
            .as_ref()
            .map(|r| r.name_with_owner.clone())
            .ok_or_else(|| ItemError::BadItem(format!("issue {} has no repository", item.id)))?;
        let occurred_at = parse_occurred_at(item.created_at.as_deref(), &item.id)?;
        let payload = serde_json::to_string(item)
            .map_err(|e| ItemError::BadItem(format!("unserializable issue: {}", e)))?;

        self.dal
            .harvested_fact()
            .insert_if_absent(NewHarvestedFact {
                subject_id: ctx.subject_id(),
                source_repository: repository,
                natural_id: item.id.clone(),
                fact_type: FactKind::Issue,
                title: item.title.clone(),
                occurred_at,
                payload,
            })
            .await?;
        Ok(())
    }
}

/// Provider for the issue mining step.
pub struct IssueMiningProvider {
    dal: DAL,
    client: HarvestClient,
    config: StepsConfig,
}

impl IssueMiningProvider {
    pub fn new(dal: DAL, client: HarvestClient, config: StepsConfig) -> Self {
        Self {
            dal,
            client,
            config,
        }
    }
}

impl StepProvider for IssueMiningProvider {
    fn order(&self) -> i32 {
        40
    }

    fn name(&self) -> &str {
        STEP_NAME
    }

    fn build_step(&self) -> Arc<dyn Step> {
        Arc::new(ChunkedStep::new(
            IssueMiningWorker {
                dal: self.dal.clone(),
                client: self.client.clone(),
            },
            self.config.chunk_size,
            retry_policy_from(&self.config),
            self.config.skip_limit,
        ))
    }
}
