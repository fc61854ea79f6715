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

//! Priority request queue.
//!
//! Requests are ordered by `(priority, requested_at)`: HIGH strictly precedes
//! LOW, FIFO within a class. The queue also owns the "already queued" half of
//! the launcher's dedup contract: a subject can hold at most one queued
//! request regardless of priority.

use crate::database::universal_types::UniversalTimestamp;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Priority class of a collection request.
///
/// The numeric order is shared with external trigger payload metadata:
/// HIGH = 1, LOW = 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobPriority {
    High,
    Low,
}

impl JobPriority {
    /// Numeric order; lower dequeues first.
    pub fn order(&self) -> u8 {
        match self {
            JobPriority::High => 1,
            JobPriority::Low => 10,
        }
    }
}

impl std::fmt::Display for JobPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPriority::High => write!(f, "HIGH"),
            JobPriority::Low => write!(f, "LOW"),
        }
    }
}

/// One queued collection request. Ephemeral: requests live only in the
/// in-memory queue, never in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRequest {
    pub subject_id: i64,
    pub priority: JobPriority,
    pub requested_at: UniversalTimestamp,
}

/// Heap entry. The sequence number breaks timestamp ties so FIFO order within
/// a priority class holds even for same-instant submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueuedRequest {
    request: CollectionRequest,
    seq: u64,
}

impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the smallest
        // (priority, requested_at, seq) triple is popped first.
        let this = (
            self.request.priority.order(),
            self.request.requested_at,
            self.seq,
        );
        let that = (
            other.request.priority.order(),
            other.request.requested_at,
            other.seq,
        );
        that.cmp(&this)
    }
}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue with per-subject deduplication.
#[derive(Debug, Default)]
pub struct RequestQueue {
    heap: BinaryHeap<QueuedRequest>,
    queued_subjects: HashSet<i64>,
    next_seq: u64,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a request unless the subject is already queued.
    ///
    /// Returns `true` when the request was accepted.
    pub fn push(&mut self, subject_id: i64, priority: JobPriority) -> bool {
        if !self.queued_subjects.insert(subject_id) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedRequest {
            request: CollectionRequest {
                subject_id,
                priority,
                requested_at: UniversalTimestamp::now(),
            },
            seq,
        });
        true
    }

    /// Pops the highest-priority, oldest-queued request.
    pub fn pop(&mut self) -> Option<CollectionRequest> {
        let entry = self.heap.pop()?;
        self.queued_subjects.remove(&entry.request.subject_id);
        Some(entry.request)
    }

    /// True when the subject has a queued request.
    pub fn contains(&self, subject_id: i64) -> bool {
        self.queued_subjects.contains(&subject_id)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
