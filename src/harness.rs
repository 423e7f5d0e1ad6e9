use crate::pipeline::{StoreSpec, SyncOptions, sync_sources};
use crate::store::JsonFileStore;
use crate::writer::DEFAULT_TABLE;
use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct HarnessOptions {
    pub config_dir: PathBuf,
    pub store_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct HarnessReport {
    pub first_run_sources: usize,
    pub first_run_parsed: usize,
    pub first_run_inserted: usize,
    pub first_run_skipped: usize,
    pub second_run_inserted: usize,
    pub second_run_skipped: usize,
    pub errors: usize,
    pub stored_rows: usize,
}

pub fn run_harness(options: &HarnessOptions) -> Result<HarnessReport> {
    if options.store_path.exists() {
        std::fs::remove_file(&options.store_path)?;
    }

    let sync = SyncOptions {
        config_dir: options.config_dir.clone(),
        source: None,
        store: StoreSpec::File(options.store_path.clone()),
        table: DEFAULT_TABLE.to_string(),
        dry_run: false,
    };

    let first = sync_sources(&sync)?;
    let second = sync_sources(&sync)?;
    let store = JsonFileStore::open(&options.store_path)?;

    Ok(HarnessReport {
        first_run_sources: first.len(),
        first_run_parsed: first.iter().map(|r| r.records_parsed).sum(),
        first_run_inserted: first.iter().map(|r| r.inserted).sum(),
        first_run_skipped: first.iter().map(|r| r.skipped).sum(),
        second_run_inserted: second.iter().map(|r| r.inserted).sum(),
        second_run_skipped: second.iter().map(|r| r.skipped).sum(),
        errors: first.iter().chain(&second).map(|r| r.errors).sum(),
        stored_rows: store.row_count(DEFAULT_TABLE),
    })
}
