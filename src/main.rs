use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use eventscrape::harness::{HarnessOptions, run_harness};
use eventscrape::pipeline::{
    ScrapeOptions, StoreSpec, SyncOptions, ValidateOptions, scrape_sources, sync_sources,
    validate_configs,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "eventscrape", about = "Config-driven event listing scraper")]
struct Cli {
    #[arg(long, default_value = "configs/sources")]
    config_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = StoreKind::File)]
    store: StoreKind,

    #[arg(long, default_value = "data/state/events.json")]
    store_path: PathBuf,

    #[arg(long, default_value = "events")]
    table: String,

    #[arg(long, default_value_t = 30)]
    store_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StoreKind {
    File,
    Rest,
    Memory,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scrape sources and write new events to the store.
    Sync {
        #[arg(long)]
        source: Option<String>,
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Scrape sources and print the records as JSON without writing.
    Scrape {
        #[arg(long)]
        source: Option<String>,
    },
    Validate {
        #[arg(long)]
        source_file: Option<PathBuf>,
    },
    Harness,
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let store = match cli.store {
        StoreKind::File => StoreSpec::File(cli.store_path.clone()),
        StoreKind::Rest => StoreSpec::Rest {
            timeout_secs: cli.store_timeout_secs,
        },
        StoreKind::Memory => StoreSpec::Memory,
    };

    match cli.command {
        Commands::Sync { source, dry_run } => {
            let reports = sync_sources(&SyncOptions {
                config_dir: cli.config_dir,
                source,
                store,
                table: cli.table,
                dry_run,
            })?;

            for report in &reports {
                if report.failed {
                    warn!(source = %report.source_key, "source failed; nothing written");
                    continue;
                }
                info!(
                    source = %report.source_key,
                    pages = report.pages_fetched,
                    parsed = report.records_parsed,
                    inserted = report.inserted,
                    skipped = report.skipped,
                    errors = report.errors,
                    "source sync summary"
                );
            }
            info!(
                inserted = reports.iter().map(|r| r.inserted).sum::<usize>(),
                skipped = reports.iter().map(|r| r.skipped).sum::<usize>(),
                errors = reports.iter().map(|r| r.errors).sum::<usize>(),
                "sync finished"
            );
        }
        Commands::Scrape { source } => {
            let scraped = scrape_sources(&ScrapeOptions {
                config_dir: cli.config_dir,
                source,
            })?;
            let records: Vec<_> = scraped.into_iter().flat_map(|(_, records)| records).collect();
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Commands::Validate { source_file } => {
            let messages = validate_configs(&ValidateOptions {
                config_dir: Some(cli.config_dir),
                source_file,
            })?;
            for line in messages {
                println!("{line}");
            }
        }
        Commands::Harness => {
            let report = run_harness(&HarnessOptions {
                config_dir: cli.config_dir,
                store_path: cli.store_path,
            })?;

            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}
