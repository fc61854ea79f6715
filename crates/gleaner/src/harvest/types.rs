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

//! GraphQL response shapes for the external API.
//!
//! Field names mirror the upstream camelCase schema; absent nodes decode to
//! `None` so a partially-errored response stays representable instead of
//! failing deserialization outright.

use serde::{Deserialize, Serialize};

/// The raw GraphQL envelope plus transport-level metadata.
#[derive(Debug, Clone)]
pub struct GraphQlResponse {
    pub data: Option<serde_json::Value>,
    pub errors: Option<Vec<serde_json::Value>>,
    /// From the `x-ratelimit-remaining` header, when the API reports it
    pub rate_limit_remaining: Option<i64>,
}

impl GraphQlResponse {
    pub fn has_errors(&self) -> bool {
        self.errors.as_ref().map(|e| !e.is_empty()).unwrap_or(false)
    }
}

/// Cursor-pagination metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// A generic paginated connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection<T> {
    #[serde(default = "default_total_count")]
    pub total_count: i64,
    pub page_info: Option<PageInfo>,
    pub nodes: Option<Vec<T>>,
}

fn default_total_count() -> i64 {
    0
}

/// Items accumulated across pages plus the last cursor seen.
#[derive(Debug, Clone, Default)]
pub struct PagedItems<T> {
    pub items: Vec<T>,
    pub last_cursor: Option<String>,
}

// ============================================================================
// User activity (profile + contributed repositories)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct UserActivityData {
    pub user: Option<UserNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNode {
    pub login: String,
    pub name: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub followers: Option<CountNode>,
    pub following: Option<CountNode>,
    pub repositories: Option<Connection<RepositoryNode>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountNode {
    pub total_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryNode {
    pub name: String,
    pub name_with_owner: String,
    pub owner: OwnerNode,
    pub description: Option<String>,
    #[serde(default)]
    pub is_fork: bool,
    #[serde(default)]
    pub is_private: bool,
    pub primary_language: Option<LanguageNode>,
    #[serde(default)]
    pub stargazer_count: i64,
    #[serde(default)]
    pub fork_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerNode {
    pub login: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageNode {
    pub name: String,
}

/// The merged result of a full user-activity fetch: the first page's scalar
/// profile fields plus the concatenation of all repository pages.
#[derive(Debug, Clone)]
pub struct AggregatedActivity {
    pub profile: UserNode,
    pub repositories: Vec<RepositoryNode>,
    pub repo_cursor: Option<String>,
}

// ============================================================================
// Repository commits
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryCommitsData {
    pub repository: Option<RepositoryCommitsNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryCommitsNode {
    pub default_branch_ref: Option<RefNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefNode {
    pub target: Option<CommitHistoryTarget>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitHistoryTarget {
    pub history: Connection<CommitNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitNode {
    pub oid: String,
    pub message_headline: Option<String>,
    pub committed_date: Option<String>,
    #[serde(default)]
    pub additions: i64,
    #[serde(default)]
    pub deletions: i64,
}

// ============================================================================
// User issues and pull requests
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct UserIssuesData {
    pub user: Option<IssuesUserNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuesUserNode {
    pub issues: Connection<IssueNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueNode {
    pub id: String,
    pub title: Option<String>,
    pub state: Option<String>,
    pub created_at: Option<String>,
    pub repository: Option<RepoRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserPullRequestsData {
    pub user: Option<PullRequestsUserNode>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestsUserNode {
    pub pull_requests: Connection<PullRequestNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestNode {
    pub id: String,
    pub title: Option<String>,
    pub state: Option<String>,
    pub created_at: Option<String>,
    #[serde(default)]
    pub merged: bool,
    pub repository: Option<RepoRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoRef {
    pub name_with_owner: String,
}
