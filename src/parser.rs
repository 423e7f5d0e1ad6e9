use crate::config::{LoadedSource, SourceConfig};
use crate::extract::{FieldExtractor, PageContext};
use crate::fetch::FetchedDocument;
use crate::locate::{LocateStrategy, Locator};
use crate::model::EventRecord;
use crate::timestamp::CANONICAL_FORMAT;
use anyhow::Result;
use chrono::Local;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub records: Vec<EventRecord>,
    pub containers: usize,
    pub rejected: usize,
}

impl ParseOutcome {
    fn merge(&mut self, other: ParseOutcome) {
        self.records.extend(other.records);
        self.containers += other.containers;
        self.rejected += other.rejected;
    }
}

pub fn parse_source_events(source: &LoadedSource, docs: &[FetchedDocument]) -> Result<ParseOutcome> {
    let locator = Locator::from_config(&source.config.locate);
    let extractor = FieldExtractor::from_config(&source.config)?;
    let scraped_at = Local::now().format(CANONICAL_FORMAT).to_string();

    let mut outcome = ParseOutcome::default();
    for doc in docs {
        outcome.merge(parse_document(
            &source.config,
            &locator,
            &extractor,
            doc,
            &scraped_at,
        ));
    }

    info!(
        source = %source.config.source.key,
        containers = outcome.containers,
        records = outcome.records.len(),
        rejected = outcome.rejected,
        "parsed documents"
    );
    Ok(outcome)
}

pub fn parse_document(
    config: &SourceConfig,
    locator: &Locator,
    extractor: &FieldExtractor,
    doc: &FetchedDocument,
    scraped_at: &str,
) -> ParseOutcome {
    let html_text = String::from_utf8_lossy(&doc.body);
    let parsed = Html::parse_document(&html_text);

    let page = PageContext {
        page_url: doc.source_url.clone(),
        base_url: document_base_url(&parsed, &doc.source_url, config.listing_url()),
        scraped_at: scraped_at.to_string(),
    };

    let located = locator.locate(&parsed);
    match located.strategy {
        LocateStrategy::Nothing => {
            warn!(source = %config.source.key, url = %doc.source_url, "no event containers found");
            return ParseOutcome::default();
        }
        LocateStrategy::Fallback => {
            info!(
                source = %config.source.key,
                containers = located.containers.len(),
                "no configured selector matched; using permissive fallback"
            );
        }
        LocateStrategy::Selector(index) => {
            debug!(
                source = %config.source.key,
                index,
                containers = located.containers.len(),
                rendered = doc.rendered,
                "containers located"
            );
        }
    }

    let mut outcome = ParseOutcome {
        containers: located.containers.len(),
        ..ParseOutcome::default()
    };

    for container in located.containers {
        match extractor.extract_event(container, &page) {
            Ok(record) => {
                debug!(
                    title = %record.title,
                    start_time = record.start_time.as_deref().unwrap_or("-"),
                    "extracted event"
                );
                outcome.records.push(record);
            }
            Err(rejection) => {
                debug!(
                    source = %config.source.key,
                    missing = %rejection.describe(),
                    "container skipped"
                );
                outcome.rejected += 1;
            }
        }
    }

    outcome
}

fn document_base_url(doc: &Html, source_url: &str, listing_url: Option<&str>) -> Option<Url> {
    let page = Url::parse(source_url)
        .ok()
        .filter(|u| !u.cannot_be_a_base() && u.scheme() != "inline")
        .or_else(|| listing_url.and_then(|u| Url::parse(u).ok()));

    let declared = Selector::parse("base[href]")
        .ok()
        .and_then(|sel| doc.select(&sel).next())
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| match &page {
            Some(page) => page.join(href).ok(),
            None => Url::parse(href).ok(),
        });

    declared.or(page)
}
