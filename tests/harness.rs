use anyhow::Result;
use eventscrape::harness::{HarnessOptions, run_harness};
use eventscrape::model::{Category, SourceRunReport};
use eventscrape::pipeline::{ScrapeOptions, StoreSpec, SyncOptions, scrape_sources, sync_sources};
use eventscrape::store::load_store_file;
use eventscrape::writer::DEFAULT_TABLE;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

#[test]
fn sync_inserts_once_and_skips_on_rerun() -> Result<()> {
    let env = setup_fixture_env()?;
    let options = env.sync_options(StoreSpec::File(env.store_path.clone()), false);

    let first = sync_sources(&options)?;
    assert_eq!(first.len(), 2);
    let campus = report(&first, "berkeley-campus");
    assert_eq!(campus.containers, 4);
    assert_eq!(campus.inserted, 3);
    assert_eq!(campus.rejected, 1);
    let greek = report(&first, "greek-theatre");
    assert_eq!(greek.inserted, 2);
    assert_eq!(greek.rejected, 1);

    let second = sync_sources(&options)?;
    assert_eq!(second.iter().map(|r| r.inserted).sum::<usize>(), 0);
    assert_eq!(second.iter().map(|r| r.skipped).sum::<usize>(), 5);
    assert_eq!(second.iter().map(|r| r.errors).sum::<usize>(), 0);

    let stored = load_store_file(&env.store_path)?;
    assert_eq!(stored.tables[DEFAULT_TABLE].len(), 5);

    Ok(())
}

#[test]
fn stored_rows_carry_normalized_fields() -> Result<()> {
    let env = setup_fixture_env()?;
    sync_sources(&env.sync_options(StoreSpec::File(env.store_path.clone()), false))?;

    let stored = load_store_file(&env.store_path)?;
    let rows = &stored.tables[DEFAULT_TABLE];
    let by_title = |title: &str| -> &Value {
        rows.iter()
            .find(|row| row["title"] == title)
            .unwrap_or_else(|| panic!("row for {title} must exist"))
    };

    let fair = by_title("Spring Career Fair");
    assert_eq!(fair["category"], "work");
    assert_eq!(fair["start_time"], "2026-04-10 10:00:00");
    assert_eq!(fair["location"], "Martin Luther King Jr. Student Union");
    assert_eq!(fair["club_name"], "Career Engagement");
    assert_eq!(
        fair["source_url"],
        "https://events.berkeley.edu/events/spring-career-fair"
    );

    let game = by_title("Cal Bears Basketball vs Stanford");
    assert_eq!(game["category"], "sports");
    assert_eq!(game["start_time"], "2026-04-12 19:00:00");
    assert_eq!(game["location"], "UC Berkeley");

    let studio = by_title("Open Studio Hours");
    assert!(studio["start_time"].is_null());
    assert_eq!(studio["source_url"], "https://events.berkeley.edu/events/");

    let show = by_title("Khruangbin");
    assert_eq!(show["category"], "arts");
    assert_eq!(show["start_time"], "2026-05-03 19:30:00");
    assert_eq!(show["location"], "The Greek Theatre, Berkeley");
    assert_eq!(
        show["image_url"],
        "https://thegreekberkeley.com/wp-content/uploads/khruangbin.jpg"
    );
    assert!(show["id"].is_u64());

    Ok(())
}

#[test]
fn dry_run_writes_nothing() -> Result<()> {
    let env = setup_fixture_env()?;

    let reports = sync_sources(&env.sync_options(StoreSpec::File(env.store_path.clone()), true))?;

    assert_eq!(reports.iter().map(|r| r.records_parsed).sum::<usize>(), 5);
    assert_eq!(reports.iter().map(|r| r.inserted).sum::<usize>(), 0);
    assert!(!env.store_path.exists());

    Ok(())
}

#[test]
fn unavailable_store_leaves_run_without_effect() -> Result<()> {
    let env = setup_fixture_env()?;

    // a directory cannot be opened as a store file
    let reports = sync_sources(&env.sync_options(StoreSpec::File(env.config_dir.clone()), false))?;

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.inserted == 0 && r.skipped == 0));
    assert_eq!(reports.iter().map(|r| r.records_parsed).sum::<usize>(), 5);

    Ok(())
}

#[test]
fn failing_source_does_not_stop_the_others() -> Result<()> {
    let env = setup_fixture_env()?;
    fs::write(
        env.config_dir.join("broken.toml"),
        r#"
        [source]
        key = "broken"
        name = "Broken Listing"

        [fetch]
        mode = "file"
        file_path = "../data/missing.html"

        [locate]
        selectors = ["div.event"]

        [extract]
        title_selectors = ["h2"]
        "#,
    )?;

    let reports = sync_sources(&env.sync_options(StoreSpec::Memory, false))?;

    assert_eq!(reports.len(), 3);
    assert!(report(&reports, "broken").failed);
    assert_eq!(report(&reports, "greek-theatre").inserted, 2);
    assert_eq!(report(&reports, "berkeley-campus").inserted, 3);

    Ok(())
}

#[test]
fn scrape_returns_records_per_source() -> Result<()> {
    let env = setup_fixture_env()?;

    let scraped = scrape_sources(&ScrapeOptions {
        config_dir: env.config_dir.clone(),
        source: Some("greek-theatre".to_string()),
    })?;

    assert_eq!(scraped.len(), 1);
    let (key, records) = &scraped[0];
    assert_eq!(key, "greek-theatre");
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.category == Category::Arts));

    Ok(())
}

#[test]
fn harness_reports_stability_metrics() -> Result<()> {
    let env = setup_fixture_env()?;

    let report = run_harness(&HarnessOptions {
        config_dir: env.config_dir,
        store_path: env.store_path,
    })?;

    assert_eq!(report.first_run_sources, 2);
    assert_eq!(report.first_run_inserted, 5);
    assert_eq!(report.second_run_inserted, 0);
    assert_eq!(report.second_run_skipped, 5);
    assert_eq!(report.errors, 0);
    assert_eq!(report.stored_rows, 5);

    Ok(())
}

fn report<'a>(reports: &'a [SourceRunReport], key: &str) -> &'a SourceRunReport {
    reports
        .iter()
        .find(|r| r.source_key == key)
        .unwrap_or_else(|| panic!("report for {key} must exist"))
}

struct FixtureEnv {
    config_dir: PathBuf,
    store_path: PathBuf,
}

impl FixtureEnv {
    fn sync_options(&self, store: StoreSpec, dry_run: bool) -> SyncOptions {
        SyncOptions {
            config_dir: self.config_dir.clone(),
            source: None,
            store,
            table: DEFAULT_TABLE.to_string(),
            dry_run,
        }
    }
}

fn setup_fixture_env() -> Result<FixtureEnv> {
    let temp = tempdir()?;
    let root = temp.keep();

    let fixture_root = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    let config_dir = root.join("sources");
    copy_dir(&fixture_root.join("sources"), &config_dir)?;
    copy_dir(&fixture_root.join("data"), &root.join("data"))?;

    Ok(FixtureEnv {
        config_dir,
        store_path: root.join("state/events.json"),
    })
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&src_path, &dst_path)?;
        } else {
            fs::copy(src_path, dst_path)?;
        }
    }

    Ok(())
}
