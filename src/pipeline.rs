use crate::config::{LoadedSource, load_source_file, load_sources_from_dir};
use crate::fetch::fetch_source_documents;
use crate::model::{EventRecord, SourceRunReport};
use crate::parser::parse_source_events;
use crate::store::{EventStore, JsonFileStore, MemoryStore, RestStore};
use crate::writer::DuplicateCheckedWriter;
use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone)]
pub enum StoreSpec {
    Rest { timeout_secs: u64 },
    File(PathBuf),
    Memory,
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub config_dir: PathBuf,
    pub source: Option<String>,
    pub store: StoreSpec,
    pub table: String,
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub config_dir: PathBuf,
    pub source: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidateOptions {
    pub config_dir: Option<PathBuf>,
    pub source_file: Option<PathBuf>,
}

pub fn open_store(spec: &StoreSpec) -> Result<Box<dyn EventStore>> {
    Ok(match spec {
        StoreSpec::Rest { timeout_secs } => Box::new(
            RestStore::from_env(Duration::from_secs(*timeout_secs))
                .context("failed to create rest store client")?,
        ),
        StoreSpec::File(path) => Box::new(
            JsonFileStore::open(path)
                .with_context(|| format!("failed to open store file {}", path.display()))?,
        ),
        StoreSpec::Memory => Box::new(MemoryStore::new()),
    })
}

pub fn sync_sources(options: &SyncOptions) -> Result<Vec<SourceRunReport>> {
    let sources = select_sources(&options.config_dir, options.source.as_deref())?;

    let mut store = if options.dry_run {
        info!("dry run enabled; records will not be written");
        None
    } else {
        match open_store(&options.store) {
            Ok(store) => Some(store),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "store unavailable; no records will be written");
                None
            }
        }
    };

    let mut reports = Vec::new();
    for source in sources {
        info!(source = %source.config.source.key, "sync start");
        let mut report = SourceRunReport {
            source_key: source.config.source.key.clone(),
            ..SourceRunReport::default()
        };

        let records = match scrape_source(&source, &mut report) {
            Ok(records) => records,
            Err(err) => {
                error!(source = %source.config.source.key, error = %format!("{err:#}"), "scrape failed");
                report.failed = true;
                reports.push(report);
                continue;
            }
        };

        if let Some(store) = store.as_deref_mut() {
            let mut writer = DuplicateCheckedWriter::new(store, &options.table);
            let summary = writer.write_all(&records);
            report.absorb(&summary);
        }

        info!(
            source = %report.source_key,
            parsed = report.records_parsed,
            rejected = report.rejected,
            inserted = report.inserted,
            skipped = report.skipped,
            errors = report.errors,
            "sync complete"
        );
        reports.push(report);
    }

    Ok(reports)
}

pub fn scrape_sources(options: &ScrapeOptions) -> Result<Vec<(String, Vec<EventRecord>)>> {
    let sources = select_sources(&options.config_dir, options.source.as_deref())?;

    let mut scraped = Vec::new();
    for source in sources {
        let mut report = SourceRunReport::default();
        let records = scrape_source(&source, &mut report)
            .with_context(|| format!("scrape failed for source {}", source.config.source.key))?;
        scraped.push((source.config.source.key.clone(), records));
    }
    Ok(scraped)
}

pub fn validate_configs(options: &ValidateOptions) -> Result<Vec<String>> {
    let mut messages = Vec::new();

    if let Some(file) = &options.source_file {
        let source = load_source_file(file)?;
        messages.push(format!(
            "OK: {} ({})",
            source.config.source.key,
            file.display()
        ));
        return Ok(messages);
    }

    if let Some(dir) = &options.config_dir {
        let sources = load_sources_from_dir(dir)?;
        for source in sources {
            messages.push(format!(
                "OK: {} ({})",
                source.config.source.key,
                source.path.display()
            ));
        }
        return Ok(messages);
    }

    bail!("either --config-dir or --source-file must be provided");
}

fn select_sources(config_dir: &std::path::Path, filter: Option<&str>) -> Result<Vec<LoadedSource>> {
    let mut sources = load_sources_from_dir(config_dir)?;
    if let Some(filter) = filter {
        sources.retain(|s| s.config.source.key == filter);
    }
    sources.retain(|s| {
        if !s.config.source.enabled {
            info!(source = %s.config.source.key, "source disabled; skipping");
        }
        s.config.source.enabled
    });
    if sources.is_empty() {
        bail!("no matching source configurations found");
    }
    Ok(sources)
}

fn scrape_source(source: &LoadedSource, report: &mut SourceRunReport) -> Result<Vec<EventRecord>> {
    let docs = fetch_source_documents(source)
        .with_context(|| format!("fetch failed for source {}", source.config.source.key))?;
    report.pages_fetched = docs.len();

    let parsed = parse_source_events(source, &docs)
        .with_context(|| format!("parse failed for source {}", source.config.source.key))?;
    report.containers = parsed.containers;
    report.records_parsed = parsed.records.len();
    report.rejected = parsed.rejected;

    if parsed.records.is_empty() {
        warn!(source = %source.config.source.key, "no events extracted");
    }
    Ok(parsed.records)
}
