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

//! Service runner: wires the subsystems together and manages their
//! lifecycle.
//!
//! Startup order matters: migrations run first, schedule recovery runs
//! before the launcher's driver loop starts accepting work (so recovered
//! submissions land in an already-consistent queue), and all loops share one
//! shutdown watch channel.

use crate::config::GleanerConfig;
use crate::consumer::{
    BalanceChangedHandler, EvaluationCompletedHandler, EvaluationRequestedHandler,
    IdempotentConsumer, TriggerIngestor, TriggerSource,
};
use crate::dal::DAL;
use crate::database::Database;
use crate::harvest::steps::register_default_steps;
use crate::harvest::{GraphQlTransport, HarvestClient};
use crate::launcher::{PriorityJobLauncher, ScheduleRecovery};
use crate::outbox::{Broker, OutboxPublisher};
use crate::step::{CollectionPipeline, StepRegistry};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// The assembled service.
pub struct GleanerRunner {
    config: GleanerConfig,
    dal: DAL,
    launcher: PriorityJobLauncher,
    publisher: Arc<OutboxPublisher>,
    ingestor: Arc<TriggerIngestor>,
    consumer: Arc<IdempotentConsumer>,
    shutdown_tx: watch::Sender<bool>,
}

impl GleanerRunner {
    /// Builds the service: opens the database, runs migrations, composes the
    /// pipeline, and wires launcher, publisher, and ingestion.
    pub async fn new(
        config: GleanerConfig,
        transport: Arc<dyn GraphQlTransport>,
        broker: Arc<dyn Broker>,
        trigger_source: Arc<dyn TriggerSource>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let database = Database::new(&config.database.url, config.database.max_connections);
        database
            .run_migrations()
            .await
            .map_err(|e| anyhow::anyhow!("migration failure: {}", e))?;
        let dal = DAL::new(database);

        let client = HarvestClient::new(
            transport,
            config.harvest.page_size,
            config.harvest.rate_limit_floor,
        );

        let mut registry = StepRegistry::new();
        register_default_steps(&mut registry, dal.clone(), client, config.steps.clone())?;
        let pipeline = Arc::new(CollectionPipeline::new(dal.clone(), &registry));

        let launcher = PriorityJobLauncher::new(pipeline, config.launcher.clone());
        let publisher = Arc::new(OutboxPublisher::new(
            dal.clone(),
            broker,
            config.outbox.clone(),
        ));
        let ingestor = Arc::new(TriggerIngestor::new(
            trigger_source,
            launcher.clone(),
            config.trigger.clone(),
        ));

        let mut consumer = IdempotentConsumer::new(dal.clone());
        consumer.register_handler(Arc::new(EvaluationRequestedHandler));
        consumer.register_handler(Arc::new(EvaluationCompletedHandler));
        consumer.register_handler(Arc::new(BalanceChangedHandler));

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            dal,
            launcher,
            publisher,
            ingestor,
            consumer: Arc::new(consumer),
            shutdown_tx,
        })
    }

    pub fn dal(&self) -> &DAL {
        &self.dal
    }

    pub fn launcher(&self) -> PriorityJobLauncher {
        self.launcher.clone()
    }

    pub fn consumer(&self) -> Arc<IdempotentConsumer> {
        Arc::clone(&self.consumer)
    }

    /// Signals every subsystem loop to stop.
    pub fn trigger_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Recovers schedules, starts all subsystem loops, and blocks until
    /// shutdown is triggered and the loops have drained.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Starting gleaner");

        let recovery = ScheduleRecovery::new(
            self.dal.clone(),
            self.launcher.clone(),
            self.config.recovery.interval(),
        );
        recovery
            .recover()
            .await
            .map_err(|e| anyhow::anyhow!("schedule recovery failed: {}", e))?;

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(
            self.launcher.clone().run(self.shutdown_tx.subscribe()),
        ));
        tasks.push(tokio::spawn(
            Arc::clone(&self.publisher).run(self.shutdown_tx.subscribe()),
        ));
        tasks.push(tokio::spawn(
            Arc::clone(&self.ingestor).run(self.shutdown_tx.subscribe()),
        ));

        for task in tasks {
            let _ = task.await;
        }
        info!("Gleaner stopped");
        Ok(())
    }
}
