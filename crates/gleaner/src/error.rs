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

//! Error types for the Gleaner subsystems.
//!
//! Each subsystem has its own `thiserror` enum; errors compose upward through
//! `#[from]` conversions. The taxonomy follows the fault model: transient
//! failures are retried by the step layer, item-level bad data is skipped and
//! counted, everything else fails the enclosing unit of work.

use thiserror::Error;

/// Errors raised by the data access layer.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A Diesel operation failed
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    /// The connection pool could not provide a connection, or the interact
    /// closure panicked
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// A stored value could not be decoded into its domain type
    #[error("Corrupt row: {message}")]
    CorruptRow { message: String },
}

/// Errors raised while registering step providers.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// Two providers declared the same step name
    #[error("Duplicate step name: {0}")]
    DuplicateStepName(String),
}

/// Item-level errors surfaced by chunked step workers.
///
/// The chunk driver maps these onto its fault policy: `BadItem` counts
/// against the skip limit, `Transient` triggers a chunk retry, `Fatal`
/// fails the step immediately.
#[derive(Error, Debug)]
pub enum ItemError {
    /// One malformed upstream record; skip it and continue
    #[error("bad item: {0}")]
    BadItem(String),

    /// A retryable condition (network blip, lock contention)
    #[error("transient failure: {0}")]
    Transient(String),

    /// A non-retryable failure
    #[error("{0}")]
    Fatal(String),
}

impl From<ValidationError> for ItemError {
    fn from(e: ValidationError) -> Self {
        // Storage errors are lock/pool shaped more often than not; let the
        // chunk retry budget decide whether they clear.
        ItemError::Transient(e.to_string())
    }
}

/// Errors raised by step execution and pipeline composition.
#[derive(Error, Debug)]
pub enum StepError {
    /// Retry budget exhausted for a chunk
    #[error("retry limit exhausted after {attempts} attempts: {message}")]
    RetryLimitExhausted { attempts: u32, message: String },

    /// Skip budget exhausted within a step
    #[error("skip limit exceeded: {skipped} items skipped (limit {limit})")]
    SkipLimitExceeded { skipped: u32, limit: u32 },

    /// A non-retryable step failure
    #[error("step failed: {0}")]
    Fatal(String),

    /// A storage failure outside a chunk boundary
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors raised by the harvesting client and its transport.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// The HTTP layer failed (connect, timeout, non-2xx)
    #[error("transport error: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for HarvestError {
    fn from(e: reqwest::Error) -> Self {
        HarvestError::Transport(e.to_string())
    }
}

/// Errors raised by the priority job launcher.
#[derive(Error, Debug)]
pub enum LauncherError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("pipeline failed for subject {subject_id}: {message}")]
    PipelineFailed { subject_id: i64, message: String },
}

/// Errors raised by the outbox publisher.
#[derive(Error, Debug)]
pub enum PublisherError {
    /// The broker rejected or failed to accept a publish
    #[error("broker error: {0}")]
    Broker(String),

    /// An event type with no destination mapping reached the publisher.
    /// This is a programming error: event types are an explicit allow-list.
    #[error("no destination mapped for event type '{0}'")]
    UnmappedEventType(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Errors inside an idempotent side-effect transaction.
///
/// Separate from [`ValidationError`] because handler failures are not
/// storage corruption: the consumer dead-letters on either, but logs them
/// apart.
#[derive(Error, Debug)]
pub enum SideEffectError {
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// The handler rejected the delivery (unparseable payload, missing
    /// referent). Retrying cannot succeed; the delivery is poison.
    #[error("handler error: {0}")]
    Handler(String),
}

/// Errors raised by the idempotent consumer and trigger ingestion.
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// The side-effect handler failed; the delivery is dead-lettered
    #[error("handler error: {0}")]
    Handler(String),

    /// No handler is registered for the delivery's event type
    #[error("no handler for event type '{0}'")]
    UnknownEventType(String),

    /// The trigger/stream source failed
    #[error("source error: {0}")]
    Source(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
