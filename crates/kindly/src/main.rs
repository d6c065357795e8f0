// SPDX-FileCopyrightText: 2026 Kindly Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Kindly - maintenance commands for the companion memory pipeline.
//!
//! The conversational surface lives in the host application; this binary
//! covers the operator side: batch indexing, reindexing, compression,
//! context inspection, and health checks.

mod doctor;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use kindly_agent::{build_indexer, install_signal_handler, register_metrics};
use kindly_config::KindlyConfig;
use kindly_context::RetrievalOrchestrator;
use kindly_core::{EmbeddingAdapter, KindlyError, ProviderAdapter, UserId};
use kindly_memory::{BatchReport, MessageIndexer};
use kindly_openai::OpenAiProvider;
use kindly_storage::SqliteStorage;
use tracing::info;

/// Kindly - memory maintenance for a supportive companion.
#[derive(Parser, Debug)]
#[command(name = "kindly", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Index logged messages past each user's watermark.
    Index {
        /// Only index this user.
        #[arg(long)]
        user: Option<UserId>,
        /// Keep running, re-scanning every SECS seconds until interrupted.
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
    /// Reset a user's watermark and index their whole history again.
    Reindex {
        #[arg(long)]
        user: UserId,
    },
    /// Compress a user's snippet backlog into summaries.
    Compress {
        #[arg(long)]
        user: UserId,
    },
    /// Print the context block assembled for a query.
    Context {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        query: String,
    },
    /// Check configuration, database, and provider health.
    Doctor,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match kindly_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            kindly_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.agent.log_level);
    register_metrics();

    let result = match cli.command {
        Commands::Index { user, watch } => run_index(&config, user, watch).await,
        Commands::Reindex { user } => run_reindex(&config, user).await,
        Commands::Compress { user } => run_compress(&config, user).await,
        Commands::Context { user, query } => run_context(&config, user, &query).await,
        Commands::Doctor => doctor::run_doctor(&config).await,
    };

    if let Err(e) = result {
        eprintln!("kindly: {e}");
        std::process::exit(1);
    }
}

/// Storage plus the provider doubling as the embedding capability.
struct Pipeline {
    storage: SqliteStorage,
    provider: Arc<dyn ProviderAdapter>,
    embedder: Arc<dyn EmbeddingAdapter>,
}

impl Pipeline {
    async fn open(config: &KindlyConfig) -> Result<Self, KindlyError> {
        let storage = SqliteStorage::open(config.storage.clone()).await?;
        let openai = Arc::new(OpenAiProvider::new(&config.provider)?);
        Ok(Self {
            storage,
            provider: openai.clone(),
            embedder: openai,
        })
    }

    fn indexer(&self, config: &KindlyConfig) -> Arc<MessageIndexer> {
        build_indexer(
            config,
            self.storage.database().clone(),
            self.provider.clone(),
            self.embedder.clone(),
        )
    }
}

async fn run_index(
    config: &KindlyConfig,
    user: Option<UserId>,
    watch: Option<u64>,
) -> Result<(), KindlyError> {
    let pipeline = Pipeline::open(config).await?;
    let indexer = pipeline.indexer(config);

    let Some(secs) = watch else {
        return index_once(&indexer, user).await;
    };

    let cancel = install_signal_handler();
    let interval = Duration::from_secs(secs.max(1));
    info!(interval_secs = interval.as_secs(), "watching for unindexed messages");
    loop {
        index_once(&indexer, user).await?;
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    pipeline.storage.database().checkpoint().await
}

async fn index_once(indexer: &MessageIndexer, user: Option<UserId>) -> Result<(), KindlyError> {
    let reports = match user {
        Some(user_id) => vec![(user_id, indexer.run_batch(user_id).await?)],
        None => indexer.run_pending().await?,
    };
    for (user_id, report) in &reports {
        print_report(*user_id, report);
    }
    Ok(())
}

async fn run_reindex(config: &KindlyConfig, user_id: UserId) -> Result<(), KindlyError> {
    let pipeline = Pipeline::open(config).await?;
    let report = pipeline.indexer(config).reindex(user_id).await?;
    print_report(user_id, &report);
    Ok(())
}

async fn run_compress(config: &KindlyConfig, user_id: UserId) -> Result<(), KindlyError> {
    let pipeline = Pipeline::open(config).await?;
    let written = pipeline.indexer(config).compressor().drain(user_id).await?;
    println!("user {user_id}: {written} summary(ies) written");
    Ok(())
}

async fn run_context(config: &KindlyConfig, user_id: UserId, query: &str) -> Result<(), KindlyError> {
    let pipeline = Pipeline::open(config).await?;
    let indexer = pipeline.indexer(config);
    let orchestrator = RetrievalOrchestrator::from_config(
        indexer.store().clone(),
        pipeline.provider.clone(),
        config.retrieval.clone(),
    )?;

    let block = orchestrator.retrieve_context(user_id, query).await;
    eprintln!(
        "query type {}, {} item(s), {} chars",
        block.query_type,
        block.item_count(),
        block.render().chars().count()
    );
    println!("{}", block.render());
    Ok(())
}

fn print_report(user_id: UserId, report: &BatchReport) {
    let mut line = format!(
        "user {user_id}: {} message(s) processed, watermark {}",
        report.processed, report.watermark
    );
    if let Some(id) = report.stopped_at {
        line.push_str(&format!(", stopped at message {id}"));
    }
    if let Some(id) = report.summary_id {
        line.push_str(&format!(", summary {id} written"));
    }
    println!("{line}");
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kindly={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
