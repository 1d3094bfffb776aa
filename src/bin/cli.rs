//! Meme scraper CLI
//!
//! Local execution entry point. One `run` is one batch: every configured
//! source is paged, normalized, optionally enriched, and merged into the
//! dataset file.

use std::fs::File;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use meme_scraper::{
    error::Result,
    models::{Config, SortMode, SourceId, Timeframe},
    pipeline,
    storage::ParquetStorage,
};

/// Meme scraper - Reddit listing ingestion into a Parquet dataset
#[derive(Parser, Debug)]
#[command(name = "meme-scraper", version, about = "Reddit meme listing scraper")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch one batch and merge it into the dataset
    Run(RunArgs),

    /// Validate the configuration file
    Validate,

    /// Show what the dataset currently holds
    Info,
}

/// Per-run overrides of the `[run]`, `[enrichment]` and `[dataset]` settings.
#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Source to fetch (repeatable; replaces the configured list)
    #[arg(short, long = "source", value_parser = SourceId::parse)]
    sources: Vec<SourceId>,

    #[arg(long, value_enum)]
    sort: Option<SortMode>,

    /// Posts per page (1-100)
    #[arg(long)]
    page_size: Option<u32>,

    /// Pages fetched per source
    #[arg(long)]
    max_pages: Option<usize>,

    /// Time window for the `top` sort
    #[arg(long, value_enum)]
    timeframe: Option<Timeframe>,

    /// Extract text from images
    #[arg(long)]
    enrich: bool,

    /// Dataset file to merge into
    #[arg(long)]
    dataset: Option<PathBuf>,
}

impl RunArgs {
    fn apply(self, config: &mut Config) {
        if !self.sources.is_empty() {
            config.run.source_ids = self.sources;
        }
        if let Some(sort) = self.sort {
            config.run.sort_mode = sort;
        }
        if let Some(page_size) = self.page_size {
            config.run.page_size = page_size;
        }
        if let Some(max_pages) = self.max_pages {
            config.run.max_pages = max_pages;
        }
        if let Some(timeframe) = self.timeframe {
            config.run.timeframe = timeframe;
        }
        if self.enrich {
            config.enrichment.enabled = true;
        }
        if let Some(dataset) = self.dataset {
            config.dataset.path = dataset;
        }
    }
}

/// Initialize logging based on verbosity flag. HTTP internals stay at warn.
fn init_logging(verbose: bool, log_file: Option<&PathBuf>) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder
        .format_timestamp_secs()
        .filter_module("reqwest", log::LevelFilter::Warn)
        .filter_module("hyper", log::LevelFilter::Warn)
        .filter_module("hyper_util", log::LevelFilter::Warn);

    if let Some(path) = log_file {
        let file = File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_ref())?;

    let mut config = Config::load_or_default(&cli.config)?;
    log::debug!("Configuration source: {}", cli.config.display());

    match cli.command {
        Command::Run(args) => {
            args.apply(&mut config);
            config.validate()?;

            let summary = pipeline::run_from_config(&config).await?;
            if summary.sources_skipped > 0 {
                log::warn!(
                    "{} of {} sources were skipped",
                    summary.sources_skipped,
                    summary.sources_attempted
                );
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!(
                "✓ Config OK ({} sources, dataset at {})",
                config.unique_sources().len(),
                config.dataset.path.display()
            );
        }

        Command::Info => {
            let storage = ParquetStorage::new(&config.dataset.path);
            let info = pipeline::inspect_dataset(&storage).await?;

            log::info!("Dataset: {}", info.path.display());
            if !info.exists {
                log::info!("No dataset written yet.");
                return Ok(());
            }
            log::info!("Rows: {}", info.rows);
            log::info!("Rows with image text: {}", info.with_text);
            if let Some(newest) = info.newest_post {
                log::info!("Newest post: {}", newest.to_rfc3339());
            }
            for (source, rows) in &info.rows_per_source {
                log::info!("    r/{}: {}", source, rows);
            }
            log::info!("Columns: {}", info.columns.join(", "));
        }
    }

    Ok(())
}
