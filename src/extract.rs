use crate::categorize::Categorizer;
use crate::config::{SourceConfig, StartTimePolicy, TitleFallback};
use crate::model::{Category, EventField, EventRecord, MissingFields};
use crate::timestamp::{DEFAULT_HOUR, format_canonical, normalize_timestamp};
use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use scraper::{ElementRef, Selector};
use url::Url;

pub const UNTITLED_SENTINEL: &str = "Untitled Event";

#[derive(Debug, Clone)]
pub struct PageContext {
    pub page_url: String,
    pub base_url: Option<Url>,
    pub scraped_at: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<String>,
    pub source_url: Option<String>,
    pub image_url: Option<String>,
    pub location: Option<String>,
    pub club_name: Option<String>,
}

impl Extraction {
    pub fn missing(&self) -> MissingFields {
        [
            (EventField::Title, self.title.is_none()),
            (EventField::Description, self.description.is_none()),
            (EventField::StartTime, self.start_time.is_none()),
            (EventField::SourceUrl, self.source_url.is_none()),
            (EventField::ImageUrl, self.image_url.is_none()),
            (EventField::Location, self.location.is_none()),
            (EventField::ClubName, self.club_name.is_none()),
        ]
        .into_iter()
        .filter_map(|(field, absent)| absent.then_some(field))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub missing: MissingFields,
}

impl Rejection {
    pub fn describe(&self) -> String {
        self.missing
            .iter()
            .map(EventField::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone)]
pub struct FieldExtractor {
    title: Vec<Selector>,
    title_fallback: TitleFallback,
    heading: Selector,
    min_title_len: usize,
    max_title_len: usize,
    description: Vec<Selector>,
    max_description_len: usize,
    date: Selector,
    date_attr: String,
    date_format: String,
    date_text: Option<Selector>,
    time_text: Option<Selector>,
    link: Selector,
    image: Selector,
    location: Vec<Selector>,
    club: Vec<Selector>,
    policy: StartTimePolicy,
    fixed_category: Option<Category>,
    categorizer: Categorizer,
    default_location: String,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl FieldExtractor {
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let extract = &config.extract;
        Ok(Self {
            title: parse_all(&extract.title_selectors)?,
            title_fallback: extract.title_fallback,
            heading: parse_one("h1, h2, h3, h4")?,
            min_title_len: extract.min_title_len,
            max_title_len: extract.max_title_len,
            description: parse_all(&extract.description_selectors)?,
            max_description_len: extract.max_description_len,
            date: parse_one(&extract.date_selector)?,
            date_attr: extract.date_attr.clone(),
            date_format: extract.date_format.clone(),
            date_text: extract.date_text_selector.as_deref().map(parse_one).transpose()?,
            time_text: extract.time_text_selector.as_deref().map(parse_one).transpose()?,
            link: parse_one(&extract.link_selector)?,
            image: parse_one(&extract.image_selector)?,
            location: parse_all(&extract.location_selectors)?,
            club: parse_all(&extract.club_selectors)?,
            policy: config.event.start_time,
            fixed_category: config.event.category,
            categorizer: Categorizer::new(&config.keywords),
            default_location: config.event.default_location.clone(),
            latitude: config.event.latitude,
            longitude: config.event.longitude,
        })
    }

    pub fn extract(&self, container: ElementRef<'_>, page: &PageContext) -> Extraction {
        Extraction {
            title: self.extract_title(container),
            description: first_text(container, &self.description)
                .map(|d| truncate_chars(&d, self.max_description_len)),
            start_time: self.extract_start_time(container),
            source_url: self.extract_link(container, page.base_url.as_ref()),
            image_url: container
                .select(&self.image)
                .find_map(|el| el.value().attr("src"))
                .and_then(|src| absolutize_url(page.base_url.as_ref(), src)),
            location: first_text(container, &self.location),
            club_name: first_text(container, &self.club),
        }
    }

    pub fn accept(
        &self,
        extraction: Extraction,
        page: &PageContext,
    ) -> std::result::Result<EventRecord, Rejection> {
        let missing = extraction.missing();
        let lacks_start = self.policy == StartTimePolicy::Required
            && missing.contains(&EventField::StartTime);
        let Some(title) = extraction.title.filter(|_| !lacks_start) else {
            return Err(Rejection { missing });
        };
        let description = extraction.description.unwrap_or_default();
        let category = self
            .fixed_category
            .unwrap_or_else(|| self.categorizer.categorize(&title, &description));

        Ok(EventRecord {
            title,
            description,
            category,
            location: extraction
                .location
                .unwrap_or_else(|| self.default_location.clone()),
            latitude: self.latitude,
            longitude: self.longitude,
            start_time: extraction.start_time,
            end_time: None,
            source_url: extraction
                .source_url
                .unwrap_or_else(|| page.page_url.clone()),
            image_url: extraction.image_url,
            club_name: extraction.club_name,
            scraped_at: page.scraped_at.clone(),
        })
    }

    pub fn extract_event(
        &self,
        container: ElementRef<'_>,
        page: &PageContext,
    ) -> std::result::Result<EventRecord, Rejection> {
        self.accept(self.extract(container, page), page)
    }

    fn extract_title(&self, container: ElementRef<'_>) -> Option<String> {
        let raw = first_text(container, &self.title).or_else(|| match self.title_fallback {
            TitleFallback::None => None,
            TitleFallback::FirstLine => first_line(container),
            TitleFallback::Heading => container
                .select(&self.heading)
                .map(element_text)
                .find(|t| !t.is_empty()),
        })?;

        if raw.chars().count() < self.min_title_len || raw == UNTITLED_SENTINEL {
            return None;
        }
        Some(truncate_chars(&raw, self.max_title_len))
    }

    fn extract_start_time(&self, container: ElementRef<'_>) -> Option<String> {
        container
            .select(&self.date)
            .next()
            .and_then(|el| el.value().attr(&self.date_attr))
            .and_then(|content| parse_fixed_format(content, &self.date_format))
            .or_else(|| {
                let date_text = first_text(container, self.date_text.as_slice())?;
                let time_text = first_text(container, self.time_text.as_slice());
                normalize_timestamp(&date_text, time_text.as_deref())
            })
    }

    fn extract_link(&self, container: ElementRef<'_>, base_url: Option<&Url>) -> Option<String> {
        let own = (container.value().name() == "a")
            .then(|| container.value().attr("href"))
            .flatten();
        own.or_else(|| {
            container
                .select(&self.link)
                .find_map(|el| el.value().attr("href"))
        })
        .and_then(|href| absolutize_url(base_url, href))
    }
}

pub fn parse_fixed_format(value: &str, format: &str) -> Option<String> {
    let value = value.trim();
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
        return Some(format_canonical(parsed));
    }
    let date = NaiveDate::parse_from_str(value, format).ok()?;
    Some(format_canonical(date.and_time(NaiveTime::from_hms_opt(DEFAULT_HOUR, 0, 0)?)))
}

pub fn absolutize_url(base_url: Option<&Url>, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(value) {
        return Some(url.to_string());
    }
    base_url?.join(value).ok().map(|u| u.to_string())
}

pub fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(container: ElementRef<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        container
            .select(selector)
            .next()
            .map(element_text)
            .filter(|t| !t.is_empty())
    })
}

fn first_line(container: ElementRef<'_>) -> Option<String> {
    container
        .text()
        .flat_map(str::lines)
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|line| !line.is_empty())
}

fn truncate_chars(value: &str, max: usize) -> String {
    match value.char_indices().nth(max) {
        Some((idx, _)) => value[..idx].trim_end().to_string(),
        None => value.to_string(),
    }
}

fn parse_one(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|err| anyhow!("invalid selector {selector}: {err:?}"))
}

fn parse_all(selectors: &[String]) -> Result<Vec<Selector>> {
    selectors.iter().map(|s| parse_one(s)).collect()
}
