//! Timetable Mirror CLI
//!
//! Local execution entry point.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use timetable_mirror::{
    error::{AppError, Result},
    models::{Config, ResourceKind},
    pipeline,
    storage::{LocalStorage, ScheduleStore},
    utils::http::{DocumentFetcher, HttpFetcher},
};

/// Timetable Mirror - Optivum timetable watcher
#[derive(Parser, Debug)]
#[command(
    name = "timetable-mirror",
    version,
    about = "Mirrors an HTML school timetable and reports changes"
)]
struct Cli {
    /// Path to storage directory containing config.toml and mirrored entities
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the site continuously until Ctrl-C
    Watch,

    /// Fetch every division, teacher and room once
    Sync,

    /// Print a mirrored entity as JSON
    Show {
        /// division, teacher or room
        kind: ResourceKind,

        /// Resource index as used in the page URL
        index: i64,
    },

    /// Validate configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    log::debug!("Loaded configuration from {}", config_path.display());

    let storage = Arc::new(LocalStorage::new(&cli.storage_dir));

    match cli.command {
        Command::Watch => {
            let fetcher: Arc<dyn DocumentFetcher> = Arc::new(HttpFetcher::new(&config.scraper)?);
            pipeline::run_watch(&config, fetcher, storage).await?;
        }

        Command::Sync => {
            config.validate()?;
            let fetcher: Arc<dyn DocumentFetcher> = Arc::new(HttpFetcher::new(&config.scraper)?);
            let outcomes = pipeline::run_sync(&config, fetcher, storage).await;

            let failures: usize = outcomes.iter().map(|o| o.failures).sum();
            if failures > 0 {
                log::warn!("Sync finished with {} failure(s)", failures);
            } else {
                log::info!("Sync complete!");
            }
        }

        Command::Show { kind, index } => match storage.load(kind, index).await? {
            Some(entity) => println!("{}", serde_json::to_string_pretty(&entity)?),
            None => {
                return Err(AppError::store(format!(
                    "{} is not mirrored in {}",
                    kind.store_key(index),
                    cli.storage_dir.display()
                )));
            }
        },

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK ({})", config.scraper.base_url);
        }
    }

    Ok(())
}
