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

//! Credential resolution tasklet.
//!
//! Loads the subject's login and token into the context. A missing subject
//! or blank token soft-skips the run: invalid credentials are an expected,
//! user-recoverable condition, not a job failure.

use crate::dal::DAL;
use crate::error::StepError;
use crate::step::context::{KEY_COLLECTION_SKIPPED, KEY_GITHUB_LOGIN, KEY_GITHUB_TOKEN};
use crate::step::{Step, StepContext, StepProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

const STEP_NAME: &str = "resolve_credentials";

struct ResolveCredentialsStep {
    dal: DAL,
}

#[async_trait]
impl Step for ResolveCredentialsStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    async fn execute(&self, ctx: &mut StepContext) -> Result<(), StepError> {
        let subject = self.dal.subject().get(ctx.subject_id()).await?;

        let Some(subject) = subject else {
            warn!(
                "Subject {} not found; skipping collection this run",
                ctx.subject_id()
            );
            ctx.insert(KEY_COLLECTION_SKIPPED, true);
            return Ok(());
        };

        match subject.github_token.filter(|t| !t.trim().is_empty()) {
            Some(token) => {
                debug!("Resolved credentials for subject {}", subject.id);
                ctx.insert(KEY_GITHUB_LOGIN, subject.github_login);
                ctx.insert(KEY_GITHUB_TOKEN, token);
            }
            None => {
                warn!(
                    "Subject {} has no usable token; skipping collection this run",
                    subject.id
                );
                ctx.insert(KEY_COLLECTION_SKIPPED, true);
            }
        }
        Ok(())
    }
}

/// Provider for the credential resolution step.
pub struct ResolveCredentialsProvider {
    dal: DAL,
}

impl ResolveCredentialsProvider {
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }
}

impl StepProvider for ResolveCredentialsProvider {
    fn order(&self) -> i32 {
        10
    }

    fn name(&self) -> &str {
        STEP_NAME
    }

    fn build_step(&self) -> Arc<dyn Step> {
        Arc::new(ResolveCredentialsStep {
            dal: self.dal.clone(),
        })
    }
}
