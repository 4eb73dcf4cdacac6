// src/main.rs
use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use nrss::backfill::{load_priority_ids, merge_ids};
use nrss::config::{load_config, log_level_from_env};
use nrss::utils::setup_logging;
use nrss::{App, CacheMissMode};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nrss", about = "NRK podcast feed cache and backfill worker")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Consume fetch and queue events until interrupted
    Worker,
    /// Add series to the backfill queue
    Enqueue {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Enqueue the priority list, then the given ids or the whole NRK podcast catalog
    Backfill {
        #[arg(long)]
        priority_file: Option<PathBuf>,
        /// Also enqueue series that already have a snapshot
        #[arg(long)]
        include_existing: bool,
        /// Only enqueue the priority list
        #[arg(long)]
        priority_only: bool,
        ids: Vec<String>,
    },
    /// Show the active claim and queued series
    Status,
    /// Clear a stuck claim and kick lock
    Unblock,
    /// Read a series, scheduling a fetch on miss
    Get { id: String },
    /// Fetch a series inline and print it
    Fetch { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // Logging first so the configuration dump and its warnings are not lost.
    dotenv::dotenv().ok();
    setup_logging(&log_level_from_env()).context("initializing logging")?;
    let config = load_config().context("loading configuration")?;
    info!("🚀 nrss starting");

    let app = App::connect(&config).await.context("connecting services")?;
    let result = run(&app, cli.command).await;
    if let Err(e) = app.shutdown().await {
        warn!("Store disconnect failed: {}", e);
    }
    result
}

async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Worker => {
            let worker = app.worker.clone();
            tokio::select! {
                res = worker.run() => res?,
                _ = tokio::signal::ctrl_c() => info!("🛑 Shutdown requested"),
            }
        }
        Command::Enqueue { ids } => {
            for id in merge_ids([ids]) {
                let result = app.feed.enqueue_series(&id).await?;
                println!("{}: {}", id, serde_json::to_string(&result)?);
            }
        }
        Command::Backfill {
            priority_file,
            include_existing,
            priority_only,
            ids,
        } => {
            let priority = match priority_file {
                Some(path) => load_priority_ids(&path)?,
                None => Vec::new(),
            };
            let backfill = app.backfill().include_existing(include_existing);
            let all = backfill.select_ids(priority, ids, priority_only).await?;
            if all.is_empty() {
                warn!("Nothing to backfill");
                return Ok(());
            }
            info!("Backfilling {} series", all.len());
            let report = backfill.run(&all).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Status => {
            let status = app.admin.queue_status().await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Command::Unblock => {
            let result = app.admin.unblock().await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Get { id } => match app.feed.request_series(&id).await? {
            nrss::SeriesLookup::Ready(series) => println!("{}", serde_json::to_string_pretty(&series)?),
            nrss::SeriesLookup::Pending { progress, position } => {
                let pending = serde_json::json!({ "pending": true, "progress": progress, "position": position });
                println!("{}", serde_json::to_string_pretty(&pending)?);
            }
        },
        Command::Fetch { id } => match app.cache.get_series(&id, CacheMissMode::Fetch).await? {
            Some(series) => println!("{}", serde_json::to_string_pretty(&series)?),
            None => {
                error!("No usable data for {}", id);
                anyhow::bail!("series {} not available", id);
            }
        },
    }
    Ok(())
}
