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

//! Repository discovery tasklet.
//!
//! Fetches the subject's merged activity (profile + all contributed
//! repository pages), persists one `ContributedRepo` fact per repository,
//! and seeds the context for the mining steps. The client's `None` sentinel
//! (invalid token, nothing salvageable) soft-skips the rest of the run.

use super::KEY_REPO_CURSOR;
use crate::dal::DAL;
use crate::error::StepError;
use crate::harvest::client::HarvestClient;
use crate::models::harvested_fact::{FactKind, NewHarvestedFact};
use crate::step::context::{
    KEY_COLLECTION_SKIPPED, KEY_DISCOVERED_REPOS, KEY_GITHUB_LOGIN, KEY_GITHUB_TOKEN,
};
use crate::step::{Step, StepContext, StepProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

const STEP_NAME: &str = "repository_discovery";

struct RepositoryDiscoveryStep {
    dal: DAL,
    client: HarvestClient,
}

#[async_trait]
impl Step for RepositoryDiscoveryStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    async fn execute(&self, ctx: &mut StepContext) -> Result<(), StepError> {
        if ctx.is_skipped() {
            return Ok(());
        }

        let (login, token) = credentials(ctx)?;

        let Some(activity) = self.client.fetch_all(&login, &token).await else {
            warn!(
                "No activity fetchable for subject {}; skipping collection this run",
                ctx.subject_id()
            );
            ctx.insert(KEY_COLLECTION_SKIPPED, true);
            return Ok(());
        };

        let mut inserted = 0;
        for repo in &activity.repositories {
            let payload = serde_json::to_string(repo).map_err(|e| {
                StepError::Fatal(format!("repository payload serialization failed: {}", e))
            })?;
            let new = self
                .dal
                .harvested_fact()
                .insert_if_absent(NewHarvestedFact {
                    subject_id: ctx.subject_id(),
                    source_repository: repo.name_with_owner.clone(),
                    natural_id: repo.name_with_owner.clone(),
                    fact_type: FactKind::ContributedRepo,
                    title: repo.description.clone(),
                    occurred_at: None,
                    payload,
                })
                .await?;
            if new {
                inserted += 1;
            }
        }

        let names: Vec<String> = activity
            .repositories
            .iter()
            .map(|r| r.name_with_owner.clone())
            .collect();
        info!(
            "Discovered {} repositories for subject {} ({} new)",
            names.len(),
            ctx.subject_id(),
            inserted
        );
        ctx.insert(KEY_DISCOVERED_REPOS, names);
        ctx.insert(KEY_REPO_CURSOR, activity.repo_cursor);
        Ok(())
    }
}

/// Reads the login/token pair resolved by the credentials step.
pub(crate) fn credentials(ctx: &StepContext) -> Result<(String, String), StepError> {
    let login: String = ctx
        .get(KEY_GITHUB_LOGIN)
        .ok_or_else(|| StepError::Fatal("github login missing from context".to_string()))?;
    let token: String = ctx
        .get(KEY_GITHUB_TOKEN)
        .ok_or_else(|| StepError::Fatal("github token missing from context".to_string()))?;
    Ok((login, token))
}

/// Provider for the repository discovery step.
pub struct RepositoryDiscoveryProvider {
    dal: DAL,
    client: HarvestClient,
}

impl RepositoryDiscoveryProvider {
    pub fn new(dal: DAL, client: HarvestClient) -> Self {
        Self { dal, client }
    }
}

impl StepProvider for RepositoryDiscoveryProvider {
    fn order(&self) -> i32 {
        20
    }

    fn name(&self) -> &str {
        STEP_NAME
    }

    fn build_step(&self) -> Arc<dyn Step> {
        Arc::new(RepositoryDiscoveryStep {
            dal: self.dal.clone(),
            client: self.client.clone(),
        })
    }
}
