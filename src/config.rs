use crate::categorize::KeywordTable;
use crate::model::Category;
use anyhow::{Context, Result, anyhow, bail};
use scraper::Selector;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub config: SourceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub source: SourceMeta,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub locate: LocateConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub event: EventConfig,
    #[serde(default)]
    pub keywords: KeywordTable,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.source.key.trim().is_empty() {
            bail!("source.key must not be empty");
        }
        if self.source.name.trim().is_empty() {
            bail!("source.name must not be empty");
        }

        match self.fetch.mode {
            FetchMode::Http => {
                let url = self
                    .fetch
                    .url
                    .as_ref()
                    .context("fetch.url is required for http mode")?;
                url::Url::parse(url).with_context(|| format!("fetch.url is not a url: {url}"))?;
            }
            FetchMode::File => {
                if self.fetch.file_path.is_none() {
                    bail!("fetch.file_path is required for file mode");
                }
            }
            FetchMode::Inline => {
                if self.fetch.inline_data.is_none() {
                    bail!("fetch.inline_data is required for inline mode");
                }
            }
        }

        if self.locate.selectors.is_empty() && self.locate.fallback_keywords.is_empty() {
            bail!("locate needs at least one selector or fallback keyword");
        }
        if self.locate.fallback_tags.is_empty() && !self.locate.fallback_keywords.is_empty() {
            bail!("locate.fallback_tags must not be empty when fallback keywords are set");
        }

        if self.extract.title_selectors.is_empty()
            && self.extract.title_fallback == TitleFallback::None
        {
            bail!("extract needs title_selectors or a title_fallback");
        }

        for selector in self
            .locate
            .selectors
            .iter()
            .chain(self.extract.selector_strings())
        {
            Selector::parse(selector).map_err(|err| anyhow!("invalid selector {selector}: {err:?}"))?;
        }

        if self.extract.date_format.trim().is_empty() {
            bail!("extract.date_format must not be empty");
        }
        if self.extract.max_title_len < self.extract.min_title_len {
            bail!("extract.max_title_len must be >= extract.min_title_len");
        }

        Ok(())
    }

    pub fn listing_url(&self) -> Option<&str> {
        self.fetch
            .listing_url
            .as_deref()
            .or(self.fetch.url.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceMeta {
    pub key: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    #[default]
    Http,
    File,
    Inline,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub mode: FetchMode,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub warmup_url: Option<String>,
    #[serde(default)]
    pub listing_url: Option<String>,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub inline_data: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default = "default_referer")]
    pub referer: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub browser: BrowserConfig,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mode: FetchMode::Http,
            url: None,
            warmup_url: None,
            listing_url: None,
            file_path: None,
            inline_data: None,
            headers: BTreeMap::new(),
            user_agent: None,
            referer: default_referer(),
            timeout_secs: default_timeout_secs(),
            browser: BrowserConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub always: bool,
    #[serde(default = "default_browser_command")]
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default = "default_render_budget_ms")]
    pub render_budget_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            always: false,
            command: default_browser_command(),
            args: Vec::new(),
            render_budget_ms: default_render_budget_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocateConfig {
    #[serde(default)]
    pub selectors: Vec<String>,
    #[serde(default = "default_fallback_tags")]
    pub fallback_tags: Vec<String>,
    #[serde(default = "default_fallback_keywords")]
    pub fallback_keywords: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            selectors: Vec::new(),
            fallback_tags: default_fallback_tags(),
            fallback_keywords: default_fallback_keywords(),
            limit: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TitleFallback {
    #[default]
    None,
    FirstLine,
    Heading,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtractConfig {
    #[serde(default)]
    pub title_selectors: Vec<String>,
    #[serde(default)]
    pub title_fallback: TitleFallback,
    #[serde(default = "default_min_title_len")]
    pub min_title_len: usize,
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,
    #[serde(default = "default_description_selectors")]
    pub description_selectors: Vec<String>,
    #[serde(default = "default_max_description_len")]
    pub max_description_len: usize,
    #[serde(default = "default_date_selector")]
    pub date_selector: String,
    #[serde(default = "default_date_attr")]
    pub date_attr: String,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default)]
    pub date_text_selector: Option<String>,
    #[serde(default)]
    pub time_text_selector: Option<String>,
    #[serde(default = "default_link_selector")]
    pub link_selector: String,
    #[serde(default = "default_image_selector")]
    pub image_selector: String,
    #[serde(default)]
    pub location_selectors: Vec<String>,
    #[serde(default)]
    pub club_selectors: Vec<String>,
}

impl ExtractConfig {
    fn selector_strings(&self) -> impl Iterator<Item = &String> {
        self.title_selectors
            .iter()
            .chain(&self.description_selectors)
            .chain(&self.location_selectors)
            .chain(&self.club_selectors)
            .chain(self.date_text_selector.iter())
            .chain(self.time_text_selector.iter())
            .chain([&self.date_selector, &self.link_selector, &self.image_selector])
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            title_selectors: Vec::new(),
            title_fallback: TitleFallback::None,
            min_title_len: default_min_title_len(),
            max_title_len: default_max_title_len(),
            description_selectors: default_description_selectors(),
            max_description_len: default_max_description_len(),
            date_selector: default_date_selector(),
            date_attr: default_date_attr(),
            date_format: default_date_format(),
            date_text_selector: None,
            time_text_selector: None,
            link_selector: default_link_selector(),
            image_selector: default_image_selector(),
            location_selectors: Vec::new(),
            club_selectors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StartTimePolicy {
    #[default]
    Required,
    BestEffort,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventConfig {
    #[serde(default)]
    pub start_time: StartTimePolicy,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default = "default_location")]
    pub default_location: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            start_time: StartTimePolicy::Required,
            category: None,
            default_location: default_location(),
            latitude: None,
            longitude: None,
        }
    }
}

pub fn load_sources_from_dir(config_dir: &Path) -> Result<Vec<LoadedSource>> {
    if !config_dir.exists() {
        bail!("config dir does not exist: {}", config_dir.display());
    }

    let mut loaded = Vec::new();
    for entry in WalkDir::new(config_dir) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("toml") {
            continue;
        }

        loaded.push(load_source_file(path)?);
    }

    loaded.sort_by(|a, b| a.config.source.key.cmp(&b.config.source.key));
    Ok(loaded)
}

pub fn load_source_file(config_path: &Path) -> Result<LoadedSource> {
    let text = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read source config: {}", config_path.display()))?;
    let config = parse_source_config(&text)
        .with_context(|| format!("invalid source config {}", config_path.display()))?;
    Ok(LoadedSource {
        path: config_path.to_path_buf(),
        config,
    })
}

pub fn parse_source_config(text: &str) -> Result<SourceConfig> {
    let config: SourceConfig = toml::from_str(text).context("failed to parse toml")?;
    config.validate()?;
    Ok(config)
}

pub fn resolve_path(base_config_path: &Path, maybe_relative: &Path) -> Result<PathBuf> {
    if maybe_relative.is_absolute() {
        return Ok(maybe_relative.to_path_buf());
    }

    let parent = base_config_path.parent().ok_or_else(|| {
        anyhow!(
            "source config has no parent directory: {}",
            base_config_path.display()
        )
    })?;

    Ok(parent.join(maybe_relative))
}

fn default_true() -> bool {
    true
}

fn default_referer() -> String {
    "https://www.google.com/".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_browser_command() -> String {
    "chromium".to_string()
}

fn default_render_budget_ms() -> u64 {
    10_000
}

fn default_fallback_tags() -> Vec<String> {
    vec!["article".to_string(), "div".to_string()]
}

fn default_fallback_keywords() -> Vec<String> {
    vec![
        "event".to_string(),
        "listing".to_string(),
        "card".to_string(),
    ]
}

fn default_min_title_len() -> usize {
    4
}

fn default_max_title_len() -> usize {
    200
}

fn default_description_selectors() -> Vec<String> {
    vec![
        ".description".to_string(),
        ".event-description".to_string(),
        "p".to_string(),
        ".excerpt".to_string(),
    ]
}

fn default_max_description_len() -> usize {
    500
}

fn default_date_selector() -> String {
    ".date-show".to_string()
}

fn default_date_attr() -> String {
    "content".to_string()
}

fn default_date_format() -> String {
    "%B %d, %Y %I:%M %p".to_string()
}

fn default_link_selector() -> String {
    "a[href]".to_string()
}

fn default_image_selector() -> String {
    "img[src]".to_string()
}

fn default_location() -> String {
    "TBA".to_string()
}
