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

//! Shared test fixture: one in-memory SQLite database per test process,
//! reset between tests, plus a scripted GraphQL transport for driving the
//! harvesting pipeline without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use diesel::deserialize::QueryableByName;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use gleaner::dal::DAL;
use gleaner::database::Database;
use gleaner::error::HarvestError;
use gleaner::harvest::{GraphQlResponse, GraphQlTransport};
use once_cell::sync::OnceCell;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();
static FIXTURE: OnceCell<Arc<Mutex<TestFixture>>> = OnceCell::new();

/// Shared-cache in-memory database; lives as long as the fixture holds a
/// connection open.
pub const TEST_DB_URL: &str = "file:gleaner_test?mode=memory&cache=shared";

/// Gets or initializes the test fixture singleton.
pub fn get_or_init_fixture() -> Arc<Mutex<TestFixture>> {
    FIXTURE
        .get_or_init(|| {
            let db = Database::new(TEST_DB_URL, 5);
            // Keep one raw connection open so the shared in-memory database
            // survives pool churn.
            let conn = SqliteConnection::establish(TEST_DB_URL)
                .expect("Failed to connect to SQLite test database");
            Arc::new(Mutex::new(TestFixture::new(db, conn)))
        })
        .clone()
}

/// The shared test fixture.
pub struct TestFixture {
    initialized: bool,
    db: Database,
    conn: SqliteConnection,
}

#[derive(QueryableByName)]
struct TableName {
    #[diesel(sql_type = diesel::sql_types::Text)]
    name: String,
}

#[derive(QueryableByName)]
struct TableCount {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    count: i64,
}

impl TestFixture {
    pub fn new(db: Database, conn: SqliteConnection) -> Self {
        INIT.call_once(|| {
            gleaner::init_logging(None);
        });

        TestFixture {
            initialized: false,
            db,
            conn,
        }
    }

    /// Get a DAL instance using the fixture database.
    pub fn get_dal(&self) -> DAL {
        DAL::new(self.db.clone())
    }

    /// Get a clone of the database instance.
    pub fn get_database(&self) -> Database {
        self.db.clone()
    }

    /// Runs migrations.
    pub fn initialize(&mut self) {
        gleaner::database::run_migrations(&mut self.conn).expect("Failed to run migrations");
        self.initialized = true;
    }

    /// Clears all user tables and re-runs migrations.
    pub fn reset_database(&mut self) {
        let tables: Vec<TableName> = diesel::sql_query(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '__diesel_schema_migrations'",
        )
        .load(&mut self.conn)
        .unwrap_or_default();

        for table in tables {
            let _ = diesel::sql_query(format!("DELETE FROM {}", table.name)).execute(&mut self.conn);
        }

        gleaner::database::run_migrations(&mut self.conn).expect("Failed to run migrations");
    }

    /// Counts rows in a table, bypassing the DAL.
    pub fn count_rows(&mut self, table: &str) -> i64 {
        diesel::sql_query(format!("SELECT COUNT(*) as count FROM {}", table))
            .get_result::<TableCount>(&mut self.conn)
            .map(|c| c.count)
            .unwrap_or(0)
    }

    /// Executes raw SQL, for seeding rows the DAL would not write (e.g.
    /// history with back-dated timestamps).
    pub fn execute_sql(&mut self, sql: &str) {
        diesel::sql_query(sql)
            .execute(&mut self.conn)
            .unwrap_or_else(|e| panic!("SQL failed ({}): {}", sql, e));
    }
}

// ============================================================================
// Scripted GraphQL transport
// ============================================================================

/// Routes requests to per-query-name response queues, so a test can script
/// the discovery, mining, and commit fetches independently of call order.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<&'static str, VecDeque<Result<GraphQlResponse, HarvestError>>>>,
}

fn route_of(query: &str) -> &'static str {
    if query.contains("UserActivity") {
        "activity"
    } else if query.contains("UserPullRequests") {
        "pull_requests"
    } else if query.contains("UserIssues") {
        "issues"
    } else if query.contains("RepositoryCommits") {
        "commits"
    } else {
        "other"
    }
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, route: &'static str, response: Result<GraphQlResponse, HarvestError>) {
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(route)
            .or_default()
            .push_back(response);
    }

    pub fn push_activity(&self, response: Result<GraphQlResponse, HarvestError>) {
        self.push("activity", response);
    }

    pub fn push_pull_requests(&self, response: Result<GraphQlResponse, HarvestError>) {
        self.push("pull_requests", response);
    }

    pub fn push_issues(&self, response: Result<GraphQlResponse, HarvestError>) {
        self.push("issues", response);
    }

    pub fn push_commits(&self, response: Result<GraphQlResponse, HarvestError>) {
        self.push("commits", response);
    }
}

#[async_trait]
impl GraphQlTransport for ScriptedTransport {
    async fn execute(
        &self,
        query: &str,
        _variables: serde_json::Value,
        _token: &str,
    ) -> Result<GraphQlResponse, HarvestError> {
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get_mut(route_of(query))
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| {
                Err(HarvestError::Transport(format!(
                    "no scripted response for {}",
                    route_of(query)
                )))
            })
    }
}

// ============================================================================
// Response builders
// ============================================================================

pub fn graphql_ok(data: serde_json::Value) -> Result<GraphQlResponse, HarvestError> {
    Ok(GraphQlResponse {
        data: Some(data),
        errors: None,
        rate_limit_remaining: Some(5000),
    })
}

pub fn graphql_error() -> Result<GraphQlResponse, HarvestError> {
    Ok(GraphQlResponse {
        data: None,
        errors: Some(vec![serde_json::json!({"message": "Something went wrong"})]),
        rate_limit_remaining: Some(5000),
    })
}

/// One page of user activity with the given `owner/name` repositories.
pub fn activity_page(login: &str, repos: &[&str], has_next: bool, cursor: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "user": {
            "login": login,
            "name": "Test Subject",
            "bio": null,
            "company": null,
            "followers": {"totalCount": 10},
            "following": {"totalCount": 5},
            "repositories": {
                "totalCount": repos.len(),
                "pageInfo": {"hasNextPage": has_next, "endCursor": cursor},
                "nodes": repos.iter().map(|name| serde_json::json!({
                    "name": name.split('/').nth(1).unwrap_or(name),
                    "nameWithOwner": name,
                    "owner": {"login": name.split('/').next().unwrap_or(name)},
                    "description": "a repository",
                    "isFork": false,
                    "isPrivate": false,
                    "primaryLanguage": {"name": "Rust"},
                    "stargazerCount": 1,
                    "forkCount": 0,
                })).collect::<Vec<_>>(),
            }
        }
    })
}

/// One page of pull requests. Entries are `(id, repo)` pairs; a `None` repo
/// produces a bad item (missing repository reference).
pub fn pull_requests_page(
    entries: &[(&str, Option<&str>)],
    has_next: bool,
    cursor: Option<&str>,
) -> serde_json::Value {
    serde_json::json!({
        "user": {
            "pullRequests": {
                "totalCount": entries.len(),
                "pageInfo": {"hasNextPage": has_next, "endCursor": cursor},
                "nodes": entries.iter().map(|(id, repo)| serde_json::json!({
                    "id": id,
                    "title": "a pull request",
                    "state": "MERGED",
                    "createdAt": "2025-06-01T10:00:00Z",
                    "merged": true,
                    "repository": repo.map(|r| serde_json::json!({"nameWithOwner": r})),
                })).collect::<Vec<_>>(),
            }
        }
    })
}

/// One page of issues. Entries are `(id, repo)` pairs.
pub fn issues_page(
    entries: &[(&str, Option<&str>)],
    has_next: bool,
    cursor: Option<&str>,
) -> serde_json::Value {
    serde_json::json!({
        "user": {
            "issues": {
                "totalCount": entries.len(),
                "pageInfo": {"hasNextPage": has_next, "endCursor": cursor},
                "nodes": entries.iter().map(|(id, repo)| serde_json::json!({
                    "id": id,
                    "title": "an issue",
                    "state": "OPEN",
                    "createdAt": "2025-06-02T10:00:00Z",
                    "repository": repo.map(|r| serde_json::json!({"nameWithOwner": r})),
                })).collect::<Vec<_>>(),
            }
        }
    })
}

/// One page of commits for a repository's default branch.
pub fn commits_page(oids: &[&str], has_next: bool, cursor: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "repository": {
            "defaultBranchRef": {
                "target": {
                    "history": {
                        "totalCount": oids.len(),
                        "pageInfo": {"hasNextPage": has_next, "endCursor": cursor},
                        "nodes": oids.iter().map(|oid| serde_json::json!({
                            "oid": oid,
                            "messageHeadline": "a commit",
                            "committedDate": "2025-06-03T10:00:00Z",
                            "additions": 5,
                            "deletions": 2,
                        })).collect::<Vec<_>>(),
                    }
                }
            }
        }
    })
}
