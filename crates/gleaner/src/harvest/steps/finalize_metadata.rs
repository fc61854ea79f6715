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

//! Metadata finalization tasklet.
//!
//! Closes a successful run: bumps the subject's collection timestamps and
//! cursors, and writes the `EvaluationRequested` outbox event in the same
//! transaction. Soft-skipped runs finalize nothing.

use super::{KEY_COMMIT_CURSOR, KEY_ISSUE_CURSOR, KEY_PULL_REQUEST_CURSOR, KEY_REPO_CURSOR};
use crate::dal::DAL;
use crate::error::StepError;
use crate::models::collection_metadata::CollectionCursors;
use crate::models::outbox_message::NewOutboxMessage;
use crate::outbox::routing::{self, event_types};
use crate::step::{Step, StepContext, StepProvider};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

const STEP_NAME: &str = "finalize_metadata";

struct FinalizeMetadataStep {
    dal: DAL,
}

#[async_trait]
impl Step for FinalizeMetadataStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    async fn execute(&self, ctx: &mut StepContext) -> Result<(), StepError> {
        if ctx.is_skipped() {
            debug!(
                "Run for subject {} was soft-skipped; leaving metadata untouched",
                ctx.subject_id()
            );
            return Ok(());
        }

        let cursors = CollectionCursors {
            repo_cursor: ctx.get(KEY_REPO_CURSOR).flatten(),
            commit_cursor: ctx.get(KEY_COMMIT_CURSOR).flatten(),
            issue_cursor: ctx.get(KEY_ISSUE_CURSOR).flatten(),
            pull_request_cursor: ctx.get(KEY_PULL_REQUEST_CURSOR).flatten(),
        };

        let destination = routing::destination_for(event_types::EVALUATION_REQUESTED)
            .ok_or_else(|| {
                StepError::Fatal("no destination for EvaluationRequested".to_string())
            })?;
        let payload = serde_json::json!({
            "subject_id": ctx.subject_id(),
            "run_id": ctx.run_id(),
        })
        .to_string();
        let event = NewOutboxMessage::for_event(
            event_types::EVALUATION_REQUESTED,
            destination.exchange,
            destination.routing_key,
            payload,
        );

        self.dal
            .collection_metadata()
            .finalize_collection(ctx.subject_id(), cursors, event)
            .await?;

        info!(
            "Finalized collection for subject {} (run_id: {})",
            ctx.subject_id(),
            ctx.run_id()
        );
        Ok(())
    }
}

/// Provider for the metadata finalization step.
pub struct FinalizeMetadataProvider {
    dal: DAL,
}

impl FinalizeMetadataProvider {
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }
}

impl StepProvider for FinalizeMetadataProvider {
    fn order(&self) -> i32 {
        60
    }

    fn name(&self) -> &str {
        STEP_NAME
    }

    fn build_step(&self) -> Arc<dyn Step> {
        Arc::new(FinalizeMetadataStep {
            dal: self.dal.clone(),
        })
    }
}
