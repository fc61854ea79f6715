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

//! Database layer: connection pooling, schema, and universal type wrappers.

pub mod connection;
pub mod schema;
pub mod universal_types;

pub use connection::Database;
pub use universal_types::{UniversalTimestamp, UniversalUuid};

use diesel::sqlite::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

/// Embedded SQLite migrations, applied at startup and by test fixtures.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Runs all pending migrations on the given connection.
///
/// Exposed for test fixtures that hold a raw connection; the pooled path is
/// [`Database::run_migrations`].
pub fn run_migrations(conn: &mut SqliteConnection) -> Result<(), String> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(|e| format!("Failed to run migrations: {}", e))
}
