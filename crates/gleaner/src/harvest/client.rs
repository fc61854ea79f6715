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

//! Cursor-paginating harvesting client with partial-result salvage.
//!
//! The page loop breaks (rather than fails) on a malformed response or an
//! absent node after the first page: partial data beats no data for a
//! harvesting job that will run again later. A failure on the *first* page
//! means there is nothing to salvage and surfaces as the method's error (or
//! the `None` sentinel for [`HarvestClient::fetch_all`]).
//!
//! An invalid or blank token is an expected steady-state condition, not a
//! bug: `fetch_all` returns `None` before any network call and the run is
//! soft-skipped.

use super::transport::GraphQlTransport;
use super::types::*;
use crate::error::HarvestError;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

const USER_ACTIVITY_QUERY: &str = r#"
query UserActivity($login: String!, $pageSize: Int!, $cursor: String) {
  user(login: $login) {
    login
    name
    bio
    company
    followers { totalCount }
    following { totalCount }
    repositories(first: $pageSize, after: $cursor, ownerAffiliations: [OWNER, COLLABORATOR]) {
      totalCount
      pageInfo { hasNextPage endCursor }
      nodes {
        name
        nameWithOwner
        owner { login }
        description
        isFork
        isPrivate
        primaryLanguage { name }
        stargazerCount
        forkCount
      }
    }
  }
}
"#;

const REPOSITORY_COMMITS_QUERY: &str = r#"
query RepositoryCommits($owner: String!, $name: String!, $pageSize: Int!, $cursor: String) {
  repository(owner: $owner, name: $name) {
    defaultBranchRef {
      target {
        ... on Commit {
          history(first: $pageSize, after: $cursor) {
            totalCount
            pageInfo { hasNextPage endCursor }
            nodes {
              oid
              messageHeadline
              committedDate
              additions
              deletions
            }
          }
        }
      }
    }
  }
}
"#;

const USER_ISSUES_QUERY: &str = r#"
query UserIssues($login: String!, $pageSize: Int!, $cursor: String) {
  user(login: $login) {
    issues(first: $pageSize, after: $cursor, orderBy: {field: CREATED_AT, direction: DESC}) {
      totalCount
      pageInfo { hasNextPage endCursor }
      nodes {
        id
        title
        state
        createdAt
        repository { nameWithOwner }
      }
    }
  }
}
"#;

const USER_PULL_REQUESTS_QUERY: &str = r#"
query UserPullRequests($login: String!, $pageSize: Int!, $cursor: String) {
  user(login: $login) {
    pullRequests(first: $pageSize, after: $cursor, orderBy: {field: CREATED_AT, direction: DESC}) {
      totalCount
      pageInfo { hasNextPage endCursor }
      nodes {
        id
        title
        state
        createdAt
        merged
        repository { nameWithOwner }
      }
    }
  }
}
"#;

/// The harvesting client.
///
/// Stateless beyond its transport; cloneable and shareable across steps.
#[derive(Clone)]
pub struct HarvestClient {
    transport: Arc<dyn GraphQlTransport>,
    page_size: u32,
    rate_limit_floor: i64,
}

impl HarvestClient {
    pub fn new(transport: Arc<dyn GraphQlTransport>, page_size: u32, rate_limit_floor: i64) -> Self {
        Self {
            transport,
            page_size,
            rate_limit_floor,
        }
    }

    /// Fetches one page and decodes its `data` node.
    ///
    /// A response with errors and no data is malformed; partial errors with
    /// data present are logged and the data is used.
    async fn fetch_page<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
        token: &str,
    ) -> Result<T, HarvestError> {
        let response = self.transport.execute(query, variables, token).await?;

        if let Some(remaining) = response.rate_limit_remaining {
            if remaining < self.rate_limit_floor {
                warn!(
                    "API rate limit low: {} remaining (floor {})",
                    remaining, self.rate_limit_floor
                );
            }
        }

        if response.has_errors() {
            if response.data.is_none() {
                return Err(HarvestError::Malformed(format!(
                    "GraphQL errors with no data: {:?}",
                    response.errors
                )));
            }
            warn!(
                "Partial GraphQL errors (data available, continuing): {:?}",
                response.errors
            );
        }

        let data = response
            .data
            .ok_or_else(|| HarvestError::Malformed("GraphQL response has no data".to_string()))?;
        serde_json::from_value(data)
            .map_err(|e| HarvestError::Malformed(format!("unexpected data shape: {}", e)))
    }

    /// Fetches the subject's full activity: profile scalars plus all
    /// contributed repository pages merged into one result.
    ///
    /// Returns `None` when the token is blank (soft skip, no network call)
    /// or when not even the first page could be fetched. A mid-stream
    /// failure salvages the pages aggregated so far.
    pub async fn fetch_all(&self, login: &str, token: &str) -> Option<AggregatedActivity> {
        if token.trim().is_empty() {
            warn!("Token for subject '{}' is blank; skipping this run", login);
            return None;
        }

        let mut profile: Option<UserNode> = None;
        let mut repositories: Vec<RepositoryNode> = Vec::new();
        let mut repo_cursor: Option<String> = None;
        let mut cursor: Option<String> = None;

        loop {
            let variables = serde_json::json!({
                "login": login,
                "pageSize": self.page_size,
                "cursor": cursor,
            });

            let page: UserActivityData = match self
                .fetch_page(USER_ACTIVITY_QUERY, variables, token)
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    if profile.is_none() {
                        warn!("Activity fetch failed for '{}' on first page: {}", login, e);
                        return None;
                    }
                    warn!(
                        "Activity fetch for '{}' failed mid-stream, salvaging {} repositories: {}",
                        login,
                        repositories.len(),
                        e
                    );
                    break;
                }
            };

            let user = match page.user {
                Some(user) => user,
                None => {
                    if profile.is_none() {
                        warn!("User node absent for '{}'", login);
                        return None;
                    }
                    warn!(
                        "User node absent mid-stream for '{}', salvaging {} repositories",
                        login,
                        repositories.len()
                    );
                    break;
                }
            };

            let connection = user.repositories.clone();
            if profile.is_none() {
                // Profile-level scalars do not change page to page; keep the
                // first page's copy.
                profile = Some(user);
            }

            let Some(connection) = connection else { break };
            if let Some(nodes) = connection.nodes {
                repositories.extend(nodes);
            }

            match connection.page_info {
                Some(info) => {
                    if let Some(end) = info.end_cursor.clone() {
                        repo_cursor = Some(end);
                    }
                    if info.has_next_page && info.end_cursor.is_some() {
                        cursor = info.end_cursor;
                    } else {
                        break;
                    }
                }
                None => break,
            }
        }

        let profile = profile?;
        debug!(
            "Fetched activity for '{}': {} repositories",
            login,
            repositories.len()
        );
        Some(AggregatedActivity {
            profile,
            repositories,
            repo_cursor,
        })
    }

    /// Fetches all commits on the default branch of `owner/name`.
    ///
    /// An absent repository node is malformed (deleted or inaccessible
    /// repository); an absent default branch is an empty repository and
    /// yields an empty result.
    pub async fn fetch_repository_commits(
        &self,
        name_with_owner: &str,
        token: &str,
    ) -> Result<PagedItems<CommitNode>, HarvestError> {
        let (owner, name) = name_with_owner.split_once('/').ok_or_else(|| {
            HarvestError::Malformed(format!("not an owner/name repository: '{}'", name_with_owner))
        })?;

        let mut out: PagedItems<CommitNode> = PagedItems::default();
        let mut cursor: Option<String> = None;
        let mut first_page = true;

        loop {
            let variables = serde_json::json!({
                "owner": owner,
                "name": name,
                "pageSize": self.page_size,
                "cursor": cursor,
            });

            let page: Result<RepositoryCommitsData, HarvestError> = self
                .fetch_page(REPOSITORY_COMMITS_QUERY, variables, token)
                .await;

            let history = match page {
                Ok(data) => match data.repository {
                    Some(repo) => match repo.default_branch_ref.and_then(|r| r.target) {
                        Some(target) => target.history,
                        // Empty repository: no commits to mine.
                        None => return Ok(out),
                    },
                    None => {
                        let err = HarvestError::Malformed(format!(
                            "repository node absent for '{}'",
                            name_with_owner
                        ));
                        if first_page {
                            return Err(err);
                        }
                        warn!("Salvaging {} commits for '{}': {}", out.items.len(), name_with_owner, err);
                        return Ok(out);
                    }
                },
                Err(e) => {
                    if first_page {
                        return Err(e);
                    }
                    warn!("Salvaging {} commits for '{}': {}", out.items.len(), name_with_owner, e);
                    return Ok(out);
                }
            };

            if let Some(nodes) = history.nodes {
                out.items.extend(nodes);
            }

            match history.page_info {
                Some(info) => {
                    if let Some(end) = info.end_cursor.clone() {
                        out.last_cursor = Some(end);
                    }
                    if info.has_next_page && info.end_cursor.is_some() {
                        cursor = info.end_cursor;
                    } else {
                        break;
                    }
                }
                None => break,
            }
            first_page = false;
        }

        Ok(out)
    }

    /// Fetches all issues authored by the subject.
    pub async fn fetch_user_issues(
        &self,
        login: &str,
        token: &str,
    ) -> Result<PagedItems<IssueNode>, HarvestError> {
        let mut out: PagedItems<IssueNode> = PagedItems::default();
        let mut cursor: Option<String> = None;
        let mut first_page = true;

        loop {
            let variables = serde_json::json!({
                "login": login,
                "pageSize": self.page_size,
                "cursor": cursor,
            });

            let page: Result<UserIssuesData, HarvestError> =
                self.fetch_page(USER_ISSUES_QUERY, variables, token).await;

            let connection = match page {
                Ok(data) => match data.user {
                    Some(user) => user.issues,
                    None => {
                        let err =
                            HarvestError::Malformed(format!("user node absent for '{}'", login));
                        if first_page {
                            return Err(err);
                        }
                        warn!("Salvaging {} issues for '{}': {}", out.items.len(), login, err);
                        return Ok(out);
                    }
                },
                Err(e) => {
                    if first_page {
                        return Err(e);
                    }
                    warn!("Salvaging {} issues for '{}': {}", out.items.len(), login, e);
                    return Ok(out);
                }
            };

            if let Some(nodes) = connection.nodes {
                out.items.extend(nodes);
            }

            match connection.page_info {
                Some(info) => {
                    if let Some(end) = info.end_cursor.clone() {
                        out.last_cursor = Some(end);
                    }
                    if info.has_next_page && info.end_cursor.is_some() {
                        cursor = info.end_cursor;
                    } else {
                        break;
                    }
                }
                None => break,
            }
            first_page = false;
        }

        Ok(out)
    }

    /// Fetches all pull requests authored by the subject.
    pub async fn fetch_user_pull_requests(
        &self,
        login: &str,
        token: &str,
    ) -> Result<PagedItems<PullRequestNode>, HarvestError> {
        let mut out: PagedItems<PullRequestNode> = PagedItems::default();
        let mut cursor: Option<String> = None;
        let mut first_page = true;

        loop {
            let variables = serde_json::json!({
                "login": login,
                "pageSize": self.page_size,
                "cursor": cursor,
            });

            let page: Result<UserPullRequestsData, HarvestError> = self
                .fetch_page(USER_PULL_REQUESTS_QUERY, variables, token)
                .await;

            let connection = match page {
                Ok(data) => match data.user {
                    Some(user) => user.pull_requests,
                    None => {
                        let err =
                            HarvestError::Malformed(format!("user node absent for '{}'", login));
                        if first_page {
                            return Err(err);
                        }
                        warn!(
                            "Salvaging {} pull requests for '{}': {}",
                            out.items.len(),
                            login,
                            err
                        );
                        return Ok(out);
                    }
                },
                Err(e) => {
                    if first_page {
                        return Err(e);
                    }
                    warn!(
                        "Salvaging {} pull requests for '{}': {}",
                        out.items.len(),
                        login,
                        e
                    );
                    return Ok(out);
                }
            };

            if let Some(nodes) = connection.nodes {
                out.items.extend(nodes);
            }

            match connection.page_info {
                Some(info) => {
                    if let Some(end) = info.end_cursor.clone() {
                        out.last_cursor = Some(end);
                    }
                    if info.has_next_page && info.end_cursor.is_some() {
                        cursor = info.end_cursor;
                    } else {
                        break;
                    }
                }
                None => break,
            }
            first_page = false;
        }

        Ok(out)
    }
}
