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

//! GraphQL transport abstraction.
//!
//! The client's pagination and salvage logic is independent of how a page
//! request reaches the API. The HTTP implementation is the production path;
//! tests drive the client with scripted in-memory transports.

use super::types::GraphQlResponse;
use crate::config::HarvestConfig;
use crate::error::HarvestError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Executes one GraphQL request.
#[async_trait]
pub trait GraphQlTransport: Send + Sync {
    async fn execute(
        &self,
        query: &str,
        variables: serde_json::Value,
        token: &str,
    ) -> Result<GraphQlResponse, HarvestError>;
}

#[derive(Debug, Deserialize)]
struct GraphQlBody {
    data: Option<serde_json::Value>,
    errors: Option<Vec<serde_json::Value>>,
}

/// HTTP transport over `reqwest`.
pub struct HttpGraphQlTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpGraphQlTransport {
    pub fn new(config: &HarvestConfig) -> Result<Self, HarvestError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent("gleaner-harvester")
            .build()?;
        Ok(Self {
            client,
            url: config.graphql_url.clone(),
        })
    }
}

#[async_trait]
impl GraphQlTransport for HttpGraphQlTransport {
    async fn execute(
        &self,
        query: &str,
        variables: serde_json::Value,
        token: &str,
    ) -> Result<GraphQlResponse, HarvestError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(token)
            .json(&serde_json::json!({
                "query": query,
                "variables": variables,
            }))
            .send()
            .await?;

        let rate_limit_remaining = response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<i64>().ok());

        let status = response.status();
        if !status.is_success() {
            return Err(HarvestError::Transport(format!(
                "GraphQL endpoint returned {}",
                status
            )));
        }

        let body: GraphQlBody = response
            .json()
            .await
            .map_err(|e| HarvestError::Malformed(format!("invalid GraphQL body: {}", e)))?;

        debug!("GraphQL query executed (rate limit remaining: {:?})", rate_limit_remaining);

        Ok(GraphQlResponse {
            data: body.data,
            errors: body.errors,
            rate_limit_remaining,
        })
    }
}
