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

//! `gleanerd` - the harvesting service daemon.

use clap::Parser;
use gleaner::config::GleanerConfig;
use gleaner::harvest::HttpGraphQlTransport;
use gleaner::runner::GleanerRunner;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "gleanerd", about = "GitHub activity harvesting service", version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "GLEANER_CONFIG")]
    config: Option<PathBuf>,

    /// Database path/URL override
    #[arg(long, env = "GLEANER_DATABASE_URL")]
    database_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    gleaner::init_logging(Some(if cli.verbose { "debug" } else { "info" }));

    let mut config = match &cli.config {
        Some(path) => GleanerConfig::from_toml_path(path)?,
        None => GleanerConfig::default(),
    };
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }

    let transport = Arc::new(HttpGraphQlTransport::new(&config.harvest)?);

    #[cfg(feature = "kafka")]
    let (broker, trigger_source) = {
        use gleaner::consumer::KafkaTriggerSource;
        use gleaner::outbox::KafkaBroker;
        let broker: Arc<dyn gleaner::outbox::Broker> =
            Arc::new(KafkaBroker::new(&config.broker)?);
        let source: Arc<dyn gleaner::consumer::TriggerSource> =
            Arc::new(KafkaTriggerSource::new(&config.broker, &config.trigger)?);
        (broker, source)
    };

    #[cfg(not(feature = "kafka"))]
    let (broker, trigger_source) = {
        tracing::warn!("Built without the 'kafka' feature; using in-process broker and trigger stream");
        let broker: Arc<dyn gleaner::outbox::Broker> =
            Arc::new(gleaner::outbox::InMemoryBroker::new());
        let source: Arc<dyn gleaner::consumer::TriggerSource> =
            Arc::new(gleaner::consumer::InMemoryTriggerSource::new());
        (broker, source)
    };

    let runner = Arc::new(GleanerRunner::new(config, transport, broker, trigger_source).await?);

    let shutdown_runner = Arc::clone(&runner);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down");
            shutdown_runner.trigger_shutdown();
        }
    });

    runner.run().await
}
