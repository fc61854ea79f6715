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

//! Database connection management for the SQLite backing store.
//!
//! This module provides an async connection pool implementation using
//! `deadpool-diesel` for managing database connections efficiently. It handles
//! connection pooling, connection lifecycle, and provides a thread-safe way to
//! access database connections.
//!
//! # Features
//!
//! - Connection pooling with automatic cleanup
//! - File path, `sqlite://` URL, or `:memory:` configuration
//! - WAL mode and busy-timeout pragmas applied before migrations
//!
//! # Example
//!
//! ```rust,ignore
//! use gleaner::database::Database;
//!
//! let db = Database::new("gleaner.db", 5);
//! db.run_migrations().await?;
//! ```

use deadpool_diesel::sqlite::{Manager, Pool, Runtime};
use tracing::info;

/// A pool of SQLite database connections.
///
/// # Thread Safety
///
/// The `Database` struct is `Clone` and can be safely shared between tasks.
/// Each clone references the same underlying connection pool.
#[derive(Clone)]
pub struct Database {
    pool: Pool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Database(...)")
    }
}

impl Database {
    /// Creates a new database connection pool.
    ///
    /// Accepts a plain file path, a `sqlite://`-prefixed URL, a `file:` URI
    /// (including `?mode=memory&cache=shared`), or `:memory:`.
    ///
    /// # Panics
    ///
    /// Panics if the connection pool cannot be created.
    pub fn new(connection_string: &str, max_size: u32) -> Self {
        let connection_url = Self::build_sqlite_url(connection_string);
        let manager = Manager::new(connection_url, Runtime::Tokio1);
        // SQLite has limited concurrent write support even with WAL mode.
        // A shared-cache in-memory database additionally requires a single
        // connection to avoid "database is locked" errors, so the pool is
        // capped at the configured size but clamped to at least 1.
        let pool = Pool::builder(manager)
            .max_size(max_size.max(1) as usize)
            .build()
            .expect("Failed to create SQLite connection pool");

        info!("SQLite connection pool initialized (size: {})", max_size.max(1));

        Self { pool }
    }

    /// Returns a clone of the connection pool.
    pub fn pool(&self) -> Pool {
        self.pool.clone()
    }

    /// Gets a pooled connection.
    pub async fn get_connection(
        &self,
    ) -> Result<deadpool::managed::Object<Manager>, deadpool::managed::PoolError<deadpool_diesel::Error>>
    {
        self.pool.get().await
    }

    /// Builds a SQLite connection URL from a connection string.
    fn build_sqlite_url(connection_string: &str) -> String {
        // Strip sqlite:// prefix if present
        if let Some(path) = connection_string.strip_prefix("sqlite://") {
            path.to_string()
        } else {
            connection_string.to_string()
        }
    }

    /// Runs pending database migrations.
    ///
    /// Sets WAL mode and a busy timeout before migrating so that concurrent
    /// readers do not fail immediately on locks.
    pub async fn run_migrations(&self) -> Result<(), String> {
        let conn = self.pool.get().await.map_err(|e| e.to_string())?;
        conn.interact(|conn| {
            use diesel::prelude::*;

            // WAL mode allows concurrent reads during writes
            diesel::sql_query("PRAGMA journal_mode=WAL;")
                .execute(conn)
                .map_err(|e| format!("Failed to set WAL mode: {}", e))?;
            // busy_timeout makes SQLite wait instead of immediately failing on locks
            diesel::sql_query("PRAGMA busy_timeout=30000;")
                .execute(conn)
                .map_err(|e| format!("Failed to set busy_timeout: {}", e))?;

            crate::database::run_migrations(conn)
        })
        .await
        .map_err(|e| format!("Failed to run migrations: {}", e))??;

        Ok(())
    }
}
