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

//! The concrete collection pipeline.
//!
//! Step order:
//! 1. `resolve_credentials` - loads the subject's login and token
//! 2. `repository_discovery` - contributed repositories, seeds the context
//! 3. `pull_request_mining` - chunked over fetched pull requests
//! 4. `issue_mining` - chunked over fetched issues
//! 5. `commit_mining` - chunked over discovered repositories
//! 6. `finalize_metadata` - bumps bookkeeping and queues the completion event
//!
//! [`register_default_steps`] wires all six into a registry.

pub mod commit_mining;
pub mod finalize_metadata;
pub mod issue_mining;
pub mod pull_request_mining;
pub mod repository_discovery;
pub mod resolve_credentials;

pub use commit_mining::CommitMiningProvider;
pub use finalize_metadata::FinalizeMetadataProvider;
pub use issue_mining::IssueMiningProvider;
pub use pull_request_mining::PullRequestMiningProvider;
pub use repository_discovery::RepositoryDiscoveryProvider;
pub use resolve_credentials::ResolveCredentialsProvider;

use super::client::HarvestClient;
use crate::config::StepsConfig;
use crate::dal::DAL;
use crate::error::RegistrationError;
use crate::retry::RetryPolicy;
use crate::step::StepRegistry;
use std::sync::Arc;

/// Context keys for the cursors recorded by mining steps.
pub const KEY_REPO_CURSOR: &str = "repo_cursor";
pub const KEY_COMMIT_CURSOR: &str = "commit_cursor";
pub const KEY_ISSUE_CURSOR: &str = "issue_cursor";
pub const KEY_PULL_REQUEST_CURSOR: &str = "pull_request_cursor";

pub(crate) fn retry_policy_from(config: &StepsConfig) -> RetryPolicy {
    RetryPolicy {
        max_attempts: config.retry_limit,
        ..RetryPolicy::default()
    }
}

/// Registers the full collection pipeline.
pub fn register_default_steps(
    registry: &mut StepRegistry,
    dal: DAL,
    client: HarvestClient,
    config: StepsConfig,
) -> Result<(), RegistrationError> {
    registry.register(Arc::new(ResolveCredentialsProvider::new(dal.clone())))?;
    registry.register(Arc::new(RepositoryDiscoveryProvider::new(
        dal.clone(),
        client.clone(),
    )))?;
    registry.register(Arc::new(PullRequestMiningProvider::new(
        dal.clone(),
        client.clone(),
        config.clone(),
    )))?;
    registry.register(Arc::new(IssueMiningProvider::new(
        dal.clone(),
        client.clone(),
        config.clone(),
    )))?;
    registry.register(Arc::new(CommitMiningProvider::new(
        dal.clone(),
        client,
        config,
    )))?;
    registry.register(Arc::new(FinalizeMetadataProvider::new(dal)))?;
    Ok(())
}
