use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Work,
    Social,
    Sports,
    Arts,
    #[default]
    Leisure,
}

impl Category {
    /// Canonical iteration order. The categorizer breaks score ties by this order.
    pub const ALL: [Category; 5] = [
        Category::Work,
        Category::Social,
        Category::Sports,
        Category::Arts,
        Category::Leisure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Work => "work",
            Category::Social => "social",
            Category::Sports => "sports",
            Category::Arts => "arts",
            Category::Leisure => "leisure",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventRecord {
    pub title: String,
    pub description: String,
    pub category: Category,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub source_url: String,
    pub image_url: Option<String>,
    pub club_name: Option<String>,
    pub scraped_at: String,
}

impl EventRecord {
    pub fn identity_key(&self) -> IdentityKey {
        IdentityKey {
            title: self.title.clone(),
            start_time: self.start_time.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub title: String,
    pub start_time: Option<String>,
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}",
            self.title,
            self.start_time.as_deref().unwrap_or("unscheduled")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EventField {
    Title,
    Description,
    StartTime,
    SourceUrl,
    ImageUrl,
    Location,
    ClubName,
}

impl EventField {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventField::Title => "title",
            EventField::Description => "description",
            EventField::StartTime => "start_time",
            EventField::SourceUrl => "source_url",
            EventField::ImageUrl => "image_url",
            EventField::Location => "location",
            EventField::ClubName => "club_name",
        }
    }
}

pub type MissingFields = BTreeSet<EventField>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    SkippedDuplicate,
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub inserted: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl WriteSummary {
    pub fn record(&mut self, outcome: &WriteOutcome) {
        match outcome {
            WriteOutcome::Inserted => self.inserted += 1,
            WriteOutcome::SkippedDuplicate => self.skipped += 1,
            WriteOutcome::Failed(_) => self.errors += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceRunReport {
    pub source_key: String,
    pub failed: bool,
    pub pages_fetched: usize,
    pub containers: usize,
    pub records_parsed: usize,
    pub rejected: usize,
    pub inserted: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl SourceRunReport {
    pub fn absorb(&mut self, summary: &WriteSummary) {
        self.inserted += summary.inserted;
        self.skipped += summary.skipped;
        self.errors += summary.errors;
    }
}
