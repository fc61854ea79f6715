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

//! Diesel schema definitions for the SQLite backing store.
//!
//! UUIDs are `Binary` (BLOB), timestamps are `Text` (RFC3339).

diesel::table! {
    subjects (id) {
        id -> BigInt,
        github_login -> Text,
        github_token -> Nullable<Text>,
        active -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    job_executions (id) {
        id -> Binary,
        subject_id -> BigInt,
        run_id -> Text,
        outcome -> Text,
        started_at -> Text,
        ended_at -> Nullable<Text>,
        error_details -> Nullable<Text>,
        steps_completed -> Integer,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    harvested_facts (id) {
        id -> Binary,
        subject_id -> BigInt,
        source_repository -> Text,
        natural_id -> Text,
        fact_type -> Text,
        title -> Nullable<Text>,
        occurred_at -> Nullable<Text>,
        payload -> Text,
        collected_at -> Text,
    }
}

diesel::table! {
    collection_metadata (id) {
        id -> Binary,
        subject_id -> BigInt,
        last_full_collection_at -> Nullable<Text>,
        last_incremental_at -> Nullable<Text>,
        repo_cursor -> Nullable<Text>,
        commit_cursor -> Nullable<Text>,
        issue_cursor -> Nullable<Text>,
        pull_request_cursor -> Nullable<Text>,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    outbox_messages (id) {
        id -> Binary,
        message_id -> Text,
        exchange -> Text,
        routing_key -> Text,
        event_type -> Text,
        payload -> Text,
        status -> Text,
        created_at -> Text,
        published_at -> Nullable<Text>,
    }
}

diesel::table! {
    processed_messages (message_id) {
        message_id -> Text,
        event_type -> Text,
        processed_at -> Text,
    }
}

diesel::table! {
    notifications (id) {
        id -> Binary,
        subject_id -> BigInt,
        kind -> Text,
        body -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    evaluations (id) {
        id -> Binary,
        subject_id -> BigInt,
        facts_considered -> BigInt,
        evaluated_at -> Text,
    }
}

diesel::table! {
    balance_ledger (id) {
        id -> Binary,
        subject_id -> BigInt,
        delta -> BigInt,
        reason -> Text,
        created_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    subjects,
    job_executions,
    harvested_facts,
    collection_metadata,
    outbox_messages,
    processed_messages,
    notifications,
    evaluations,
    balance_ledger,
);
