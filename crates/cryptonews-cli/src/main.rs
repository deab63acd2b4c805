mod db;
mod ingest;
mod scheduler;
mod search;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use cryptonews_core::{AppConfig, LogFormat};
use cryptonews_llm::{LanguageModel, LmStudioClient};
use cryptonews_pipeline::{ItemStore, PgItemStore, WorkerPool};
use tracing_subscriber::EnvFilter;

use crate::db::DbCommands;
use crate::search::SearchArgs;

#[derive(Debug, Parser)]
#[command(name = "cryptonews-cli")]
#[command(about = "Crypto news ingestion, enrichment and semantic search")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ingestion commands
    Ingest {
        #[command(subcommand)]
        command: IngestCommands,
    },
    /// Run ingestion on a fixed interval until Ctrl-C
    Scheduler,
    /// Semantic search over stored items
    Search(SearchArgs),
    /// Database schema commands
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum IngestCommands {
    /// Run a one-off ingestion of every configured source
    Run {
        /// ISO8601 start time (defaults to now)
        #[arg(long, value_parser = ingest::parse_since)]
        since: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = cryptonews_core::load_app_config()?;
    init_tracing(&config)?;

    let pool = cryptonews_db::connect_pool(&config).await?;

    match cli.command {
        Commands::Ingest {
            command: IngestCommands::Run { since },
        } => ingest::run_ingest(&pool, &config, since).await,
        Commands::Scheduler => scheduler::run_scheduler(&pool, &config).await,
        Commands::Search(args) => search::run_search(&pool, &config, args).await,
        Commands::Db { command } => db::run_db(&pool, command).await,
    }
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.as_str()))?;
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
    Ok(())
}

/// Build the enabled sources, the model client and the Postgres store, then
/// start a worker pool sized by `WORKER_CONCURRENCY`.
///
/// # Errors
///
/// Returns an error if a source or the model client cannot be constructed.
pub(crate) async fn start_worker_pool(
    pool: &sqlx::PgPool,
    config: &AppConfig,
) -> anyhow::Result<Arc<WorkerPool>> {
    let sources = cryptonews_sources::build_sources(config)?;
    if sources.is_empty() {
        tracing::warn!("no sources enabled; check the ENABLE_* settings");
    }

    let model: Arc<dyn LanguageModel> = Arc::new(LmStudioClient::from_config(config)?);
    let store: Arc<dyn ItemStore> = Arc::new(PgItemStore::new(pool.clone()));
    let workers = Arc::new(WorkerPool::new(
        sources,
        model,
        store,
        Duration::from_secs(config.fetch_interval_seconds),
    ));
    workers.start(config.worker_concurrency).await;
    Ok(workers)
}
