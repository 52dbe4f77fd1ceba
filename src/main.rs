use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::db::{init_db, Database};
use crate::errors::AppError;
use crate::ingest::IngestJob;
use crate::notifications::TelegramSink;
use crate::orchestrator::Orchestrator;

mod config;
mod db;
mod domain;
mod errors;
mod ingest;
mod notifications;
mod orchestrator;
mod scraper;

#[cfg(test)]
mod tests;

const DEFAULT_CONFIG: &str = "listing_watch.toml";

/// Scrape property listings and send new ones to Telegram.
#[derive(Debug, Parser)]
#[command(name = "listing_watch", version, about)]
struct Cli {
    /// TOML config file [default: listing_watch.toml]
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database path (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Sources scraped in parallel
    #[arg(long)]
    workers: Option<usize>,

    /// Max notifications sent per run
    #[arg(long)]
    batch_limit: Option<usize>,

    /// Debug logging when RUST_LOG is unset
    #[arg(short, long)]
    verbose: bool,

    /// Print the chat id of the bot's latest conversation and exit
    #[arg(long)]
    discover_chat_id: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        error!(error = %e, "❌ Startup failed");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<(), AppError> {
    // 1️⃣ Config: file, then CLI overrides
    let required = cli.config.is_some();
    let path = cli.config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let mut config = AppConfig::load(&path, required)?;
    if let Some(db) = cli.db {
        config.database_path = db;
    }
    if let Some(workers) = cli.workers {
        config.ingest.workers = workers;
    }
    if let Some(limit) = cli.batch_limit {
        config.notify.batch_limit = limit;
    }
    config.validate()?;

    let timeout = Duration::from_secs(config.http.timeout_secs);
    let sink = TelegramSink::new(&config.telegram.api_base, config.telegram.resolve_token()?, timeout)?;

    if cli.discover_chat_id {
        match sink.discover_chat_id()? {
            Some(id) => println!("CHAT_ID={id}"),
            None => println!("NO_MESSAGES"),
        }
        return Ok(());
    }

    // 2️⃣ Store
    let db = Database::new(&config.database_path);
    init_db(&db)?;
    info!(db_path = %config.database_path.display(), "Database ready");

    // 3️⃣ One adapter per enabled source
    let chat_id = config.telegram.resolve_chat_id()?;
    let jobs: Vec<IngestJob> = config
        .enabled_sources()
        .filter_map(|source| match scraper::build_adapter(source, &config.http) {
            Ok(adapter) => Some(IngestJob {
                source: source.clone(),
                adapter,
            }),
            Err(e) => {
                warn!(site = %source.site, ad_type = %source.ad_type, error = %e, "Skipping source");
                None
            }
        })
        .collect();

    // 4️⃣ Ingest -> Notify
    let summary = Orchestrator::new(&config, &db, &sink, chat_id).run(&jobs);
    for outcome in summary.ingest.outcomes.iter().filter(|o| o.is_failed()) {
        warn!(site = %outcome.site, ad_type = %outcome.ad_type, status = ?outcome.status, "Source failed this run");
    }
    info!(
        run_id = ?summary.run_id,
        state = ?summary.states.last(),
        notify_error = ?summary.notify_error,
        sources_failed = summary.ingest.failed(),
        inserted = summary.ingest.inserted(),
        notified = summary.notify.as_ref().map_or(0, |n| n.delivered),
        "Done"
    );
    Ok(())
}
