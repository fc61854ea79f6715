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

//! # Step Registry
//!
//! Collects step providers registered explicitly at startup and composes
//! them into the ordered step sequence of the collection job. Registration
//! is a plain call, not discovery: the composed pipeline is a value a test
//! can construct and inspect.

use super::context::StepContext;
use super::Step;
use crate::error::{RegistrationError, StepError};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// A provider of one pipeline step.
///
/// Providers expose an order and a name up front so the registry can sort
/// and validate the pipeline before any step is built.
pub trait StepProvider: Send + Sync {
    /// Position in the pipeline; lower orders run first.
    fn order(&self) -> i32;

    /// Unique step name.
    fn name(&self) -> &str;

    /// Builds the executable step.
    fn build_step(&self) -> Arc<dyn Step>;
}

/// Registry of step providers.
pub struct StepRegistry {
    providers: Vec<Arc<dyn StepProvider>>,
}

impl StepRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Registers a provider.
    ///
    /// Duplicate step names are rejected: two steps with one name would make
    /// logs and skip accounting ambiguous.
    pub fn register(&mut self, provider: Arc<dyn StepProvider>) -> Result<(), RegistrationError> {
        if self.providers.iter().any(|p| p.name() == provider.name()) {
            return Err(RegistrationError::DuplicateStepName(
                provider.name().to_string(),
            ));
        }
        debug!(
            "Registered step provider: {} (order {})",
            provider.name(),
            provider.order()
        );
        self.providers.push(provider);
        Ok(())
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Composes the ordered step sequence.
    ///
    /// Providers are sorted ascending by order (ties broken by name so
    /// composition is deterministic). An empty registry yields a single
    /// placeholder step: the job schema stays valid in partial deployments,
    /// and the placeholder logs loudly that no real work is registered.
    pub fn compose(&self) -> Vec<Arc<dyn Step>> {
        if self.providers.is_empty() {
            return vec![Arc::new(PlaceholderStep)];
        }

        let mut ordered: Vec<&Arc<dyn StepProvider>> = self.providers.iter().collect();
        ordered.sort_by(|a, b| a.order().cmp(&b.order()).then(a.name().cmp(b.name())));
        ordered.iter().map(|p| p.build_step()).collect()
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Stand-in step used when no providers are registered.
struct PlaceholderStep;

#[async_trait]
impl Step for PlaceholderStep {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn execute(&self, _ctx: &mut StepContext) -> Result<(), StepError> {
        warn!("No step providers registered; collection job is a no-op");
        Ok(())
    }
}
